//! Hook（钉住的工作）解析
//!
//! 两个来源：
//! - handoff 记录：角色最新的 handoff 有附件 molecule，或者没有附件但有描述内容，都算"有工作"
//! - agent bead：`hook_bead` 非空即有工作，标题取自被钉住的 bead
//!
//! 只读、无副作用，可并发重复调用；存储错误按"没有工作"处理。

use serde::Serialize;

use super::{AgentRef, Role};
use crate::store::{Bead, MessageStore};

/// 角色的 handoff 状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentHookInfo {
    /// agent 地址（如 `gastown/toast`）
    pub agent: String,
    pub role: Role,
    pub has_work: bool,
    /// 附件 molecule id
    #[serde(skip_serializing_if = "String::is_empty")]
    pub molecule: String,
    /// handoff 标题
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
}

impl AgentHookInfo {
    fn idle(agent: &AgentRef) -> Self {
        Self {
            agent: agent.address(),
            role: agent.role(),
            has_work: false,
            molecule: String::new(),
            title: String::new(),
        }
    }
}

/// 由 handoff 记录得到 hook 状态
pub fn hook_from_handoff(agent: &AgentRef, handoff: Option<&Bead>) -> AgentHookInfo {
    let mut hook = AgentHookInfo::idle(agent);
    let Some(handoff) = handoff else {
        return hook;
    };

    match handoff.attachment() {
        Some(att) if !att.attached_molecule.is_empty() => {
            hook.has_work = true;
            hook.molecule = att.attached_molecule;
            hook.title = handoff.title.clone();
        }
        _ if !handoff.description.is_empty() => {
            // 有内容但没有 molecule：仍然算有工作
            hook.has_work = true;
            hook.title = handoff.title.clone();
        }
        _ => {}
    }
    hook
}

/// 查询角色最新的 handoff 并解析
pub async fn resolve_hook(store: &dyn MessageStore, agent: &AgentRef) -> AgentHookInfo {
    let address = agent.address();
    match store.find_latest_handoff(&address).await {
        Ok(handoff) => hook_from_handoff(agent, handoff.as_ref()),
        Err(e) => {
            tracing::debug!(agent = %address, error = %e, "handoff lookup failed");
            AgentHookInfo::idle(agent)
        }
    }
}

/// 由 agent bead 得到的工作状态
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentWork {
    pub hook_bead: String,
    pub state: String,
    pub has_work: bool,
    pub work_title: String,
}

/// 查询 agent bead；bead 缺失或查询失败时各字段为空
pub async fn resolve_agent_work(store: &dyn MessageStore, agent: &AgentRef) -> AgentWork {
    let bead_id = agent.agent_bead_id();
    let fields = match store.get_agent_bead(&bead_id).await {
        Ok(Some(fields)) => fields,
        Ok(None) => return AgentWork::default(),
        Err(e) => {
            tracing::debug!(agent = %bead_id, error = %e, "agent bead lookup failed");
            return AgentWork::default();
        }
    };

    let mut work = AgentWork {
        has_work: !fields.hook_bead.is_empty(),
        hook_bead: fields.hook_bead,
        state: fields.agent_state,
        work_title: String::new(),
    };
    if work.has_work {
        if let Ok(Some(pinned)) = store.get_bead(&work.hook_bead).await {
            work.work_title = pinned.title;
        }
    }
    work
}
