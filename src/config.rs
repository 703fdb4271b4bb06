//! 应用配置：从 gt.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `GT__*` 覆盖（双下划线表示嵌套，如 `GT__DAEMON__POLL_INTERVAL_SECS=5`）。
//! 所有段都有默认值，没有配置文件也能运行。

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::GtError;

/// 应用配置根（对应 gt.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub town: TownSection,
    pub daemon: DaemonSection,
    pub store: StoreSection,
    pub sessions: SessionsSection,
}

/// [town] 段
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TownSection {
    /// 显式指定 town 根目录；未设置时从当前目录向上查找
    pub root: Option<PathBuf>,
}

/// [daemon] 段：轮询间隔、批量、回执
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonSection {
    pub poll_interval_secs: u64,
    pub batch_limit: usize,
    /// 处理后是否给请求方回写 LIFECYCLE-ACK 消息
    pub ack_requests: bool,
    /// cycle / restart 中停止与启动之间的等待（毫秒）
    pub restart_delay_ms: u64,
    /// 只处理发给该收件人的消息
    pub inbox: Option<String>,
    /// checkpoint 消费者名
    pub consumer: String,
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            batch_limit: 100,
            ack_requests: false,
            restart_delay_ms: 500,
            inbox: None,
            consumer: "lifecycle-daemon".to_string(),
        }
    }
}

/// [store] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// 数据库路径，相对路径按 town 根目录解析
    pub path: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".beads/beads.db"),
        }
    }
}

impl StoreSection {
    pub fn resolve(&self, town_root: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            town_root.join(&self.path)
        }
    }
}

/// [sessions] 段：tmux 可执行文件与会话内启动命令
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionsSection {
    pub tmux_binary: String,
    pub start_command: Option<String>,
}

impl Default for SessionsSection {
    fn default() -> Self {
        Self {
            tmux_binary: "tmux".to_string(),
            start_command: None,
        }
    }
}

/// 加载配置，环境变量 GT__* 可覆盖
///
/// 1. 按顺序查找 config/gt.toml、gt.toml，找到则作为第一源
/// 2. 若传入 config_path，则追加该文件（必须存在）
/// 3. 最后叠加环境变量 GT__*
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, GtError> {
    let mut builder = config::Config::builder();

    for name in ["config/gt", "gt"] {
        if Path::new(&format!("{name}.toml")).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("GT")
            .separator("__")
            .try_parsing(true),
    );

    Ok(builder.build()?.try_deserialize()?)
}
