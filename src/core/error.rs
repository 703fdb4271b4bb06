//! 错误类型
//!
//! - `StoreError`：消息存储（SQLite / 内存）读写失败
//! - `SessionError`：会话运行时（tmux）查询、启动、停止失败
//! - `GtError`：顶层错误，启动期的致命错误（找不到 town 根目录、配置错误）也在这里

use std::path::PathBuf;

use thiserror::Error;

/// 消息存储错误（单条操作失败，不影响整个轮询循环）
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Duplicate id: {0}")]
    Duplicate(String),
}

/// 会话控制错误
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    /// 运行时返回非零退出码或不可用
    #[error("Session runtime failed: {0}")]
    Runtime(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 顶层错误
#[derive(Error, Debug)]
pub enum GtError {
    /// 启动时找不到 town 根目录：致命，不做任何部分操作
    #[error("not in a Gas Town workspace (searched from {0})")]
    WorkspaceNotFound(PathBuf),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
