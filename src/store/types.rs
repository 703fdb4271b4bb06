//! 消息存储的数据类型
//!
//! - `Message`：邮件日志中的一条消息（生命周期请求就是 subject 以 `LIFECYCLE:` 开头的消息）
//! - `Bead`：持久化记录（handoff、agent、任务等），按 id 查找
//! - `Checkpoint`：轮询游标，表示已消费到的存储序号

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fields::{AgentFields, AttachmentFields};

/// 邮件日志中的消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    /// 存储分配的单调递增序号，追加前为 0
    #[serde(default)]
    pub seq: i64,
    pub subject: String,
    #[serde(default)]
    pub body: String,
    pub from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: String,
    #[serde(rename = "type", default = "default_message_type")]
    pub msg_type: String,
    pub created_at: DateTime<Utc>,
}

fn default_priority() -> String {
    "normal".to_string()
}

fn default_message_type() -> String {
    "message".to_string()
}

impl Message {
    pub fn new(from: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            id: format!("gt-msg-{}", uuid::Uuid::new_v4().simple()),
            seq: 0,
            subject: subject.into(),
            body: String::new(),
            from: from.into(),
            to: None,
            priority: default_priority(),
            msg_type: default_message_type(),
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = priority.into();
        self
    }

    pub fn with_type(mut self, msg_type: impl Into<String>) -> Self {
        self.msg_type = msg_type.into();
        self
    }
}

/// Bead 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeadKind {
    /// 普通消息记录
    Message,
    /// 提供给某个角色的工作交接
    Handoff,
    /// 每个 agent 一条的状态记录（hook / state）
    Agent,
    /// 工作项（hook 指向的对象）
    Task,
}

impl BeadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BeadKind::Message => "message",
            BeadKind::Handoff => "handoff",
            BeadKind::Agent => "agent",
            BeadKind::Task => "task",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "message" => Some(BeadKind::Message),
            "handoff" => Some(BeadKind::Handoff),
            "agent" => Some(BeadKind::Agent),
            "task" => Some(BeadKind::Task),
            _ => None,
        }
    }
}

impl std::fmt::Display for BeadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 持久化记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bead {
    pub id: String,
    pub kind: BeadKind,
    pub title: String,
    /// 结构化字段以 `key: value` 行编码在描述里
    #[serde(default)]
    pub description: String,
    /// handoff 的目标角色地址（如 `gastown/witness`）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    /// 存储分配的序号，用于"最新"判定
    #[serde(default)]
    pub seq: i64,
    pub created_at: DateTime<Utc>,
}

impl Bead {
    pub fn new(id: impl Into<String>, kind: BeadKind, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            description: String::new(),
            assignee: None,
            seq: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    /// 解析 agent bead 字段
    pub fn agent_fields(&self) -> AgentFields {
        AgentFields::from_description(&self.description)
    }

    /// 解析 handoff 的附件字段；没有任何附件键时返回 None
    pub fn attachment(&self) -> Option<AttachmentFields> {
        AttachmentFields::from_description(&self.description)
    }
}

/// 轮询游标：已经消费到的最大存储序号
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Checkpoint(pub i64);

impl Checkpoint {
    pub const START: Checkpoint = Checkpoint(0);

    pub fn seq(&self) -> i64 {
        self.0
    }

    /// 只前进不后退
    pub fn advance(self, seq: i64) -> Self {
        Checkpoint(self.0.max(seq))
    }
}

impl std::fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
