//! Town 工作区：根目录查找与 mayor/ 下的配置文件
//!
//! 目录约定：
//! - `<root>/mayor/town.json`：`{"name": "..."}`
//! - `<root>/mayor/rigs.json`：`{"rigs": {"<rig>": {...}}}`
//! - `<root>/<rig>/`：rig 目录，见 [`discovery`]

pub mod discovery;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::GtError;

pub use discovery::{FsRigDiscovery, RigDiscovery, RigInfo};

const MAYOR_DIR: &str = "mayor";
const TOWN_FILE: &str = "town.json";
const RIGS_FILE: &str = "rigs.json";

pub fn town_config_path(root: &Path) -> PathBuf {
    root.join(MAYOR_DIR).join(TOWN_FILE)
}

pub fn rigs_config_path(root: &Path) -> PathBuf {
    root.join(MAYOR_DIR).join(RIGS_FILE)
}

/// 从 `start` 向上查找 town 根目录
///
/// 优先取含 `mayor/town.json` 的祖先目录；都没有时取最近的含 `mayor/` 目录的祖先。
pub fn find_town_root(start: &Path) -> Result<PathBuf, GtError> {
    start
        .ancestors()
        .find(|dir| town_config_path(dir).is_file())
        .or_else(|| start.ancestors().find(|dir| dir.join(MAYOR_DIR).is_dir()))
        .map(Path::to_path_buf)
        .ok_or_else(|| GtError::WorkspaceNotFound(start.to_path_buf()))
}

/// town.json
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TownConfig {
    #[serde(default)]
    pub name: String,
}

impl TownConfig {
    /// 缺少名字时用目录名
    pub fn for_root(root: &Path) -> Self {
        Self {
            name: root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }
}

/// rigs.json 中单个 rig 的登记信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigEntry {
    pub git_url: Option<String>,
    pub added_at: Option<String>,
}

/// rigs.json
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RigsConfig {
    #[serde(default)]
    pub rigs: BTreeMap<String, RigEntry>,
}

pub fn load_town_config(root: &Path) -> Result<TownConfig, GtError> {
    let raw = std::fs::read_to_string(town_config_path(root))?;
    let mut config: TownConfig = serde_json::from_str(&raw)?;
    if config.name.trim().is_empty() {
        config.name = TownConfig::for_root(root).name;
    }
    Ok(config)
}

pub fn load_rigs_config(root: &Path) -> Result<RigsConfig, GtError> {
    let raw = std::fs::read_to_string(rigs_config_path(root))?;
    Ok(serde_json::from_str(&raw)?)
}

/// 读取 town.json，失败时退回目录名
pub fn load_town_config_or_default(root: &Path) -> TownConfig {
    load_town_config(root).unwrap_or_else(|e| {
        tracing::debug!(root = %root.display(), error = %e, "town config unavailable, using directory name");
        TownConfig::for_root(root)
    })
}

/// 读取 rigs.json，失败时视为没有 rig
pub fn load_rigs_config_or_default(root: &Path) -> RigsConfig {
    load_rigs_config(root).unwrap_or_else(|e| {
        tracing::debug!(root = %root.display(), error = %e, "rigs config unavailable, assuming no rigs");
        RigsConfig::default()
    })
}
