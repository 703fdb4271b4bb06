//! 快照输出：文本树或 JSON
//!
//! 输出模式作为参数显式传入，不依赖全局状态。颜色只在 `RenderOptions::color` 为真时使用。

use colored::Colorize;

use super::{AgentRuntime, RigStatus, TownStatus};
use crate::agents::{AgentHookInfo, Role};
use crate::core::GtError;

const TREE_BRANCH: &str = "├── ";
const TREE_LAST: &str = "└── ";
const TREE_VERT: &str = "│   ";
const TREE_SPACE: &str = "    ";

/// town 级 agent 的标题截断长度
const GLOBAL_TITLE_WIDTH: usize = 35;
const RIG_TITLE_WIDTH: usize = 30;

/// rig 内角色分组的显示顺序
const ROLE_GROUPS: [Role; 4] = [Role::Witness, Role::Refinery, Role::Crew, Role::Polecat];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    pub mode: OutputMode,
    pub color: bool,
}

impl RenderOptions {
    pub fn text(color: bool) -> Self {
        Self {
            mode: OutputMode::Text,
            color,
        }
    }

    pub fn json() -> Self {
        Self {
            mode: OutputMode::Json,
            color: false,
        }
    }
}

/// 渲染快照，返回完整输出（以换行结尾）
pub fn render_status(status: &TownStatus, options: RenderOptions) -> Result<String, GtError> {
    match options.mode {
        OutputMode::Json => {
            let mut out = serde_json::to_string_pretty(status)?;
            out.push('\n');
            Ok(out)
        }
        OutputMode::Text => Ok(TextRenderer::new(options.color).render(status)),
    }
}

struct TextRenderer {
    color: bool,
    lines: Vec<String>,
}

impl TextRenderer {
    fn new(color: bool) -> Self {
        Self {
            color,
            lines: Vec::new(),
        }
    }

    fn render(mut self, status: &TownStatus) -> String {
        self.line(format!("{} {}", self.bold("Town:"), status.name));
        self.line(self.dim(&status.location));
        self.line(String::new());

        let has_rigs = !status.rigs.is_empty();
        for (i, agent) in status.agents.iter().enumerate() {
            let is_last = i + 1 == status.agents.len() && !has_rigs;
            self.global_agent(agent, is_last);
        }

        if !has_rigs {
            self.line(String::new());
            self.line(self.dim("No rigs registered. Add one to mayor/rigs.json."));
            return self.finish();
        }

        self.line(format!("{TREE_LAST}{}", self.bold("Rigs")));
        for (i, rig) in status.rigs.iter().enumerate() {
            self.rig(rig, i + 1 == status.rigs.len());
        }
        self.finish()
    }

    fn global_agent(&mut self, agent: &AgentRuntime, is_last: bool) {
        let (prefix, child) = if is_last {
            (TREE_LAST, TREE_SPACE)
        } else {
            (TREE_BRANCH, TREE_VERT)
        };
        let label = format!("{} {}", agent.role.icon(), capitalize_first(&agent.name));
        self.line(format!("{prefix}{}", self.bold(&label)));

        let hook = format_hook_info(&agent.hook_bead, &agent.work_title, GLOBAL_TITLE_WIDTH);
        self.line(format!(
            "{child}{TREE_LAST}{} {}{hook}{}",
            self.dim(&agent.session),
            self.running(agent.running),
            self.state(&agent.state),
        ));
    }

    fn rig(&mut self, rig: &RigStatus, is_last: bool) {
        let (branch, rig_prefix) = if is_last {
            (TREE_LAST, TREE_SPACE)
        } else {
            (TREE_BRANCH, TREE_VERT)
        };
        self.line(format!("{TREE_SPACE}{branch}{}", self.bold(&format!("{}/", rig.name))));

        let base = format!("{TREE_SPACE}{rig_prefix}");
        let groups: Vec<(Role, Vec<&AgentRuntime>)> = ROLE_GROUPS
            .iter()
            .map(|role| (*role, rig.agents.iter().filter(|a| a.role == *role).collect::<Vec<_>>()))
            .filter(|(_, agents)| !agents.is_empty())
            .collect();

        if groups.is_empty() {
            self.line(format!("{base}{TREE_LAST}{}", self.dim("(no agents)")));
            return;
        }

        for (i, (role, agents)) in groups.iter().enumerate() {
            let last_group = i + 1 == groups.len();
            let (group_branch, group_indent) = if last_group {
                (TREE_LAST, format!("{base}{TREE_SPACE}"))
            } else {
                (TREE_BRANCH, format!("{base}{TREE_VERT}"))
            };
            self.line(format!(
                "{base}{group_branch}{} {}",
                role.icon(),
                self.bold(role.group_title())
            ));
            self.agent_list(agents, &group_indent, &rig.hooks);
        }
    }

    fn agent_list(&mut self, agents: &[&AgentRuntime], indent: &str, hooks: &[AgentHookInfo]) {
        for (i, agent) in agents.iter().enumerate() {
            let branch = if i + 1 == agents.len() { TREE_LAST } else { TREE_BRANCH };
            let mut hook = format_hook_info(&agent.hook_bead, &agent.work_title, RIG_TITLE_WIDTH);
            if hook.is_empty() {
                hook = handoff_hook_info(hooks, &agent.address);
            }
            self.line(format!(
                "{indent}{branch}{} {}{hook}{}",
                agent.name,
                self.running(agent.running),
                self.state(&agent.state),
            ));
        }
    }

    fn running(&self, running: bool) -> String {
        match (running, self.color) {
            (true, true) => "running".green().to_string(),
            (false, true) => "stopped".red().to_string(),
            (true, false) => "running".to_string(),
            (false, false) => "stopped".to_string(),
        }
    }

    fn state(&self, state: &str) -> String {
        if state.is_empty() || state == "idle" {
            String::new()
        } else {
            self.dim(&format!(" [{state}]"))
        }
    }

    fn bold(&self, s: &str) -> String {
        if self.color {
            s.bold().to_string()
        } else {
            s.to_string()
        }
    }

    fn dim(&self, s: &str) -> String {
        if self.color {
            s.dimmed().to_string()
        } else {
            s.to_string()
        }
    }

    fn line(&mut self, line: String) {
        self.lines.push(line);
    }

    fn finish(self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

/// ` → <标题>`；没有标题时显示 bead id，没有 hook 时为空
pub fn format_hook_info(hook_bead: &str, title: &str, max_len: usize) -> String {
    if hook_bead.is_empty() {
        String::new()
    } else if title.is_empty() {
        format!(" → {hook_bead}")
    } else {
        format!(" → {}", truncate_with_ellipsis(title, max_len))
    }
}

/// agent bead 没有 hook 时退回 rig 的 handoff 列表
fn handoff_hook_info(hooks: &[AgentHookInfo], address: &str) -> String {
    match hooks.iter().find(|h| h.agent == address && h.has_work) {
        Some(h) if !h.molecule.is_empty() => format!(" → {}", h.molecule),
        Some(h) if !h.title.is_empty() => format!(" → {}", truncate_with_ellipsis(&h.title, RIG_TITLE_WIDTH)),
        _ => String::new(),
    }
}

/// 按字符截断，超长时以 `...` 结尾
pub fn truncate_with_ellipsis(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len < 4 {
        return s.chars().take(max_len).collect();
    }
    let mut out: String = s.chars().take(max_len - 3).collect();
    out.push_str("...");
    out
}

pub fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
