//! 角色与命名
//!
//! 所有会话名、agent bead id、地址都从 `AgentRef` 推导，保证各处一致：
//!
//! | 角色 | 会话 | agent bead | 地址 |
//! |---|---|---|---|
//! | mayor | `gt-mayor` | `gt-mayor` | `mayor` |
//! | deacon | `gt-deacon` | `gt-deacon` | `deacon` |
//! | witness | `gt-<rig>-witness` | `gt-witness-<rig>` | `<rig>/witness` |
//! | refinery | `gt-<rig>-refinery` | `gt-refinery-<rig>` | `<rig>/refinery` |
//! | polecat | `gt-<rig>-<name>` | `gt-polecat-<rig>-<name>` | `<rig>/<name>` |
//! | crew | `gt-<rig>-crew-<name>` | `gt-crew-<rig>-<name>` | `<rig>/crew/<name>` |

use serde::Serialize;

/// 会话名命名空间前缀
pub const SESSION_PREFIX: &str = "gt-";

pub const MAYOR_SESSION: &str = "gt-mayor";
pub const DEACON_SESSION: &str = "gt-deacon";

/// Agent 角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// town 级协调者
    #[serde(rename = "coordinator")]
    Mayor,
    /// town 级健康检查
    #[serde(rename = "health-check")]
    Deacon,
    Witness,
    Refinery,
    Crew,
    Polecat,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Mayor => "mayor",
            Role::Deacon => "deacon",
            Role::Witness => "witness",
            Role::Refinery => "refinery",
            Role::Crew => "crew",
            Role::Polecat => "polecat",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Role::Mayor => "🎩",
            Role::Deacon => "🔔",
            Role::Witness => "👁",
            Role::Refinery => "🏭",
            Role::Crew => "👷",
            Role::Polecat => "😺",
        }
    }

    /// 状态树中的分组标题
    pub fn group_title(&self) -> &'static str {
        match self {
            Role::Mayor => "Mayor",
            Role::Deacon => "Deacon",
            Role::Witness => "Witness",
            Role::Refinery => "Refinery",
            Role::Crew => "Crew",
            Role::Polecat => "Polecats",
        }
    }

    /// 是否为 town 级（不属于任何 rig）
    pub fn is_global(&self) -> bool {
        matches!(self, Role::Mayor | Role::Deacon)
    }

    /// polecat 与 crew：按名字区分的 worker
    pub fn is_worker(&self) -> bool {
        matches!(self, Role::Polecat | Role::Crew)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一个具体 agent 的逻辑身份
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AgentRef {
    role: Role,
    rig: Option<String>,
    /// polecat / crew 的名字；其它角色等于角色名
    name: String,
}

impl AgentRef {
    pub fn mayor() -> Self {
        Self::global(Role::Mayor)
    }

    pub fn deacon() -> Self {
        Self::global(Role::Deacon)
    }

    pub fn witness(rig: &str) -> Self {
        Self::rig_singleton(Role::Witness, rig)
    }

    pub fn refinery(rig: &str) -> Self {
        Self::rig_singleton(Role::Refinery, rig)
    }

    pub fn polecat(rig: &str, name: &str) -> Self {
        Self {
            role: Role::Polecat,
            rig: Some(rig.to_string()),
            name: name.to_string(),
        }
    }

    pub fn crew(rig: &str, name: &str) -> Self {
        Self {
            role: Role::Crew,
            rig: Some(rig.to_string()),
            name: name.to_string(),
        }
    }

    fn global(role: Role) -> Self {
        Self {
            role,
            rig: None,
            name: role.as_str().to_string(),
        }
    }

    fn rig_singleton(role: Role, rig: &str) -> Self {
        Self {
            role,
            rig: Some(rig.to_string()),
            name: role.as_str().to_string(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn rig(&self) -> Option<&str> {
        self.rig.as_deref()
    }

    /// 展示名（mayor、witness、polecat 名字等）
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn session_name(&self) -> String {
        let rig = self.rig.as_deref().unwrap_or_default();
        match self.role {
            Role::Mayor => MAYOR_SESSION.to_string(),
            Role::Deacon => DEACON_SESSION.to_string(),
            Role::Witness | Role::Refinery => format!("{SESSION_PREFIX}{rig}-{}", self.role),
            Role::Polecat => format!("{SESSION_PREFIX}{rig}-{}", self.name),
            Role::Crew => format!("{SESSION_PREFIX}{rig}-crew-{}", self.name),
        }
    }

    pub fn agent_bead_id(&self) -> String {
        let rig = self.rig.as_deref().unwrap_or_default();
        match self.role {
            Role::Mayor | Role::Deacon => format!("{SESSION_PREFIX}{}", self.role),
            Role::Witness | Role::Refinery => format!("{SESSION_PREFIX}{}-{rig}", self.role),
            Role::Polecat | Role::Crew => format!("{SESSION_PREFIX}{}-{rig}-{}", self.role, self.name),
        }
    }

    pub fn address(&self) -> String {
        let rig = self.rig.as_deref().unwrap_or_default();
        match self.role {
            Role::Mayor | Role::Deacon => self.role.as_str().to_string(),
            Role::Witness | Role::Refinery => format!("{rig}/{}", self.role),
            Role::Polecat => format!("{rig}/{}", self.name),
            Role::Crew => format!("{rig}/crew/{}", self.name),
        }
    }
}
