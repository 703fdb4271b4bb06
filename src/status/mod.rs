//! Town 状态汇总
//!
//! - **aggregator**: 并发查询会话与 bead，合成一份只读快照
//! - **render**: 快照的文本树 / JSON 输出
//!
//! 快照字段与 `gt status --json` 的输出一一对应。

pub mod aggregator;
pub mod render;

use serde::Serialize;

use crate::agents::{AgentHookInfo, Role};

pub use aggregator::StatusAggregator;
pub use render::{render_status, OutputMode, RenderOptions};

/// 整个 town 的快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TownStatus {
    pub name: String,
    pub location: String,
    /// town 级 agent（mayor、deacon）
    pub agents: Vec<AgentRuntime>,
    pub rigs: Vec<RigStatus>,
    pub summary: StatusSummary,
}

/// 单个 agent 的运行状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentRuntime {
    /// 展示名（mayor、witness、polecat 名字）
    pub name: String,
    pub address: String,
    pub session: String,
    pub role: Role,
    pub running: bool,
    pub has_work: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub work_title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub hook_bead: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub state: String,
}

/// 单个 rig 的状态
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RigStatus {
    pub name: String,
    pub polecats: Vec<String>,
    pub polecat_count: usize,
    pub crews: Vec<String>,
    pub crew_count: usize,
    pub has_witness: bool,
    pub has_refinery: bool,
    /// 各角色 handoff 上的 hook
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hooks: Vec<AgentHookInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<AgentRuntime>,
}

/// 汇总计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub rig_count: usize,
    pub polecat_count: usize,
    pub crew_count: usize,
    pub witness_count: usize,
    pub refinery_count: usize,
    /// rig 内有工作的 hook 数
    pub active_hooks: usize,
}

impl StatusSummary {
    pub fn from_rigs(rigs: &[RigStatus]) -> Self {
        rigs.iter().fold(
            Self {
                rig_count: rigs.len(),
                ..Self::default()
            },
            |mut sum, rig| {
                sum.polecat_count += rig.polecat_count;
                sum.crew_count += rig.crew_count;
                sum.witness_count += usize::from(rig.has_witness);
                sum.refinery_count += usize::from(rig.has_refinery);
                sum.active_hooks += rig.hooks.iter().filter(|h| h.has_work).count();
                sum
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hook(has_work: bool) -> AgentHookInfo {
        AgentHookInfo {
            agent: "gastown/toast".to_string(),
            role: Role::Polecat,
            has_work,
            molecule: String::new(),
            title: String::new(),
        }
    }

    #[test]
    fn test_summary_rollup() {
        let rigs = vec![
            RigStatus {
                name: "gastown".to_string(),
                polecat_count: 2,
                crew_count: 1,
                has_witness: true,
                has_refinery: true,
                hooks: vec![hook(true), hook(false), hook(true)],
                ..RigStatus::default()
            },
            RigStatus {
                name: "beads".to_string(),
                polecat_count: 1,
                has_witness: true,
                ..RigStatus::default()
            },
        ];
        let sum = StatusSummary::from_rigs(&rigs);
        assert_eq!(
            sum,
            StatusSummary {
                rig_count: 2,
                polecat_count: 3,
                crew_count: 1,
                witness_count: 2,
                refinery_count: 1,
                active_hooks: 2,
            }
        );
    }

    #[test]
    fn test_rig_json_omits_empty_lists() {
        let rig = RigStatus {
            name: "empty".to_string(),
            ..RigStatus::default()
        };
        let json = serde_json::to_value(&rig).unwrap();
        assert!(json.get("hooks").is_none());
        assert!(json.get("agents").is_none());
        assert_eq!(json["polecats"], serde_json::json!([]));
    }
}
