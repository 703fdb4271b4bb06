//! Rig 发现
//!
//! 只列出 rigs.json 中登记过的 rig；每个 rig 的成员从目录结构推断：
//! `witness/`、`refinery/` 存在即有对应角色，`polecats/*`、`crew/*` 子目录即 worker 名。

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{load_rigs_config_or_default, RigsConfig};
use crate::core::GtError;

/// 单个 rig 的成员信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RigInfo {
    pub name: String,
    pub path: PathBuf,
    pub has_witness: bool,
    pub has_refinery: bool,
    pub polecats: Vec<String>,
    pub crews: Vec<String>,
}

impl RigInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_witness(mut self) -> Self {
        self.has_witness = true;
        self
    }

    pub fn with_refinery(mut self) -> Self {
        self.has_refinery = true;
        self
    }

    pub fn with_polecats<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.polecats = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_crews<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.crews = names.into_iter().map(Into::into).collect();
        self
    }
}

/// 列出 town 中的 rig
pub trait RigDiscovery: Send + Sync {
    fn list_rigs(&self) -> Result<Vec<RigInfo>, GtError>;
}

/// 基于文件系统的发现
#[derive(Debug, Clone)]
pub struct FsRigDiscovery {
    root: PathBuf,
    config: RigsConfig,
}

impl FsRigDiscovery {
    pub fn new(root: impl Into<PathBuf>, config: RigsConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    /// 从 `<root>/mayor/rigs.json` 读取登记信息（缺失时为空）
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let config = load_rigs_config_or_default(&root);
        Self::new(root, config)
    }

    fn inspect(&self, name: &str) -> Result<RigInfo, GtError> {
        let path = self.root.join(name);
        Ok(RigInfo {
            name: name.to_string(),
            has_witness: path.join("witness").is_dir(),
            has_refinery: path.join("refinery").is_dir(),
            polecats: subdirectories(&path.join("polecats"))?,
            crews: subdirectories(&path.join("crew"))?,
            path,
        })
    }
}

impl RigDiscovery for FsRigDiscovery {
    fn list_rigs(&self) -> Result<Vec<RigInfo>, GtError> {
        // BTreeMap 保证按名字排序
        self.config.rigs.keys().map(|name| self.inspect(name)).collect()
    }
}

/// 已知 rig 的固定列表
impl RigDiscovery for Vec<RigInfo> {
    fn list_rigs(&self) -> Result<Vec<RigInfo>, GtError> {
        Ok(self.clone())
    }
}

/// 子目录名（排序，跳过隐藏目录）；目录不存在时为空
fn subdirectories(dir: &Path) -> Result<Vec<String>, GtError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
