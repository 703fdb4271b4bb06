//! 生命周期控制
//!
//! - **parser**: 消息 subject → 生命周期请求
//! - **identity**: 请求方身份 → 会话名
//! - **daemon**: 轮询存储并执行会话操作的守护进程

pub mod daemon;
pub mod identity;
pub mod parser;

pub use daemon::{
    DaemonConfig, Execution, LifecycleDaemon, MessageOutcome, Outcome, PollReport, SkipReason,
};
pub use identity::resolve_session;
pub use parser::{parse_lifecycle_request, LifecycleAction, LifecycleRequest};
