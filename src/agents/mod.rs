//! Agent 角色、命名与 hook 解析

pub mod hook;
pub mod role;

pub use hook::{hook_from_handoff, resolve_agent_work, resolve_hook, AgentHookInfo, AgentWork};
pub use role::{AgentRef, Role, DEACON_SESSION, MAYOR_SESSION, SESSION_PREFIX};
