//! 状态汇总器
//!
//! 所有 agent 的会话查询与 bead 查询并发执行（`join_all` 保持输入顺序，结果按身份归属）。
//! 单个 agent 查询失败只把该 agent 的字段置为零值，不影响其它 agent。

use std::path::Path;
use std::sync::Arc;

use futures_util::future::join_all;

use super::{AgentRuntime, RigStatus, StatusSummary, TownStatus};
use crate::agents::{resolve_agent_work, resolve_hook, AgentRef};
use crate::core::GtError;
use crate::session::SessionController;
use crate::store::MessageStore;
use crate::town::{RigDiscovery, RigInfo, TownConfig};

pub struct StatusAggregator {
    store: Arc<dyn MessageStore>,
    sessions: Arc<dyn SessionController>,
    discovery: Arc<dyn RigDiscovery>,
}

impl StatusAggregator {
    pub fn new(
        store: Arc<dyn MessageStore>,
        sessions: Arc<dyn SessionController>,
        discovery: Arc<dyn RigDiscovery>,
    ) -> Self {
        Self {
            store,
            sessions,
            discovery,
        }
    }

    /// 生成快照；只有 rig 发现失败会返回错误
    pub async fn collect(&self, town: &TownConfig, location: &Path) -> Result<TownStatus, GtError> {
        let discovered = self.discovery.list_rigs()?;

        let globals = [AgentRef::mayor(), AgentRef::deacon()];
        let (agents, rigs) = tokio::join!(
            join_all(globals.iter().map(|a| self.agent_runtime(a))),
            join_all(discovered.iter().map(|r| self.rig_status(r))),
        );

        let summary = StatusSummary::from_rigs(&rigs);
        tracing::debug!(rigs = summary.rig_count, active_hooks = summary.active_hooks, "status collected");

        Ok(TownStatus {
            name: town.name.clone(),
            location: location.display().to_string(),
            agents,
            rigs,
            summary,
        })
    }

    async fn rig_status(&self, rig: &RigInfo) -> RigStatus {
        let members = rig_agents(rig);
        let (agents, hooks) = tokio::join!(
            join_all(members.iter().map(|a| self.agent_runtime(a))),
            join_all(hook_order(&members).map(|a| resolve_hook(self.store.as_ref(), a))),
        );

        RigStatus {
            name: rig.name.clone(),
            polecats: rig.polecats.clone(),
            polecat_count: rig.polecats.len(),
            crews: rig.crews.clone(),
            crew_count: rig.crews.len(),
            has_witness: rig.has_witness,
            has_refinery: rig.has_refinery,
            hooks,
            agents,
        }
    }

    async fn agent_runtime(&self, agent: &AgentRef) -> AgentRuntime {
        let session = agent.session_name();
        let (running, work) = tokio::join!(
            self.is_running(&session),
            resolve_agent_work(self.store.as_ref(), agent),
        );

        AgentRuntime {
            name: agent.name().to_string(),
            address: agent.address(),
            session,
            role: agent.role(),
            running,
            has_work: work.has_work,
            work_title: work.work_title,
            hook_bead: work.hook_bead,
            state: work.state,
        }
    }

    async fn is_running(&self, session: &str) -> bool {
        self.sessions.session_exists(session).await.unwrap_or_else(|e| {
            tracing::debug!(session = %session, error = %e, "session query failed, reporting stopped");
            false
        })
    }
}

/// rig 内 agent，按 witness、refinery、polecat、crew 排列
fn rig_agents(rig: &RigInfo) -> Vec<AgentRef> {
    let mut agents = Vec::with_capacity(2 + rig.polecats.len() + rig.crews.len());
    if rig.has_witness {
        agents.push(AgentRef::witness(&rig.name));
    }
    if rig.has_refinery {
        agents.push(AgentRef::refinery(&rig.name));
    }
    agents.extend(rig.polecats.iter().map(|p| AgentRef::polecat(&rig.name, p)));
    agents.extend(rig.crews.iter().map(|c| AgentRef::crew(&rig.name, c)));
    agents
}

/// hook 列表的顺序：worker 在前，witness / refinery 在后
fn hook_order(members: &[AgentRef]) -> impl Iterator<Item = &AgentRef> {
    let (supervisors, workers): (Vec<_>, Vec<_>) =
        members.iter().partition(|a| !a.role().is_worker());
    workers.into_iter().chain(supervisors)
}
