//! 会话控制
//!
//! 每个 agent 对应一个按名字寻址的终端会话。守护进程与状态汇总只通过 `SessionController`
//! 查询 / 启动 / 停止会话，不关心运行时内部：
//! - `TmuxSessions`：真实实现，调用 tmux 命令行
//! - `RecordingSessions`：测试替身，记录每次调用并可注入失败

pub mod mock;
pub mod tmux;

use async_trait::async_trait;

use crate::core::SessionError;

pub use mock::{RecordingSessions, SessionCall};
pub use tmux::TmuxSessions;

/// 会话控制接口；每次调用独立且幂等
#[async_trait]
pub trait SessionController: Send + Sync {
    /// 会话是否在运行
    async fn session_exists(&self, name: &str) -> Result<bool, SessionError>;

    /// 启动会话；已在运行时直接返回 Ok
    async fn start_session(&self, name: &str) -> Result<(), SessionError>;

    /// 停止会话；会话不存在时返回 `SessionError::NotFound`
    async fn stop_session(&self, name: &str) -> Result<(), SessionError>;
}
