//! Bead 描述中的结构化字段
//!
//! 字段以 `key: value` 行写在描述里，其余行是自由文本。解析宽松：未知键忽略，空值视为缺失。

/// agent bead 字段
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentFields {
    /// 当前钉住的工作 bead id，空表示没有
    pub hook_bead: String,
    /// 状态标签，"idle" 为空闲
    pub agent_state: String,
}

impl AgentFields {
    pub fn from_description(description: &str) -> Self {
        let mut fields = Self::default();
        for (key, value) in field_lines(description) {
            match key {
                "hook_bead" => fields.hook_bead = value.to_string(),
                "agent_state" => fields.agent_state = value.to_string(),
                _ => {}
            }
        }
        fields
    }
}

/// handoff 附件字段
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentFields {
    /// 附加的 molecule id
    pub attached_molecule: String,
    pub attached_at: String,
    pub attached_args: String,
}

impl AttachmentFields {
    /// 没有任何附件键（或值全为空）时返回 None
    pub fn from_description(description: &str) -> Option<Self> {
        let mut fields = Self::default();
        let mut found = false;
        for (key, value) in field_lines(description) {
            match key {
                "attached_molecule" => fields.attached_molecule = value.to_string(),
                "attached_at" => fields.attached_at = value.to_string(),
                "attached_args" => fields.attached_args = value.to_string(),
                _ => continue,
            }
            found = true;
        }
        found.then_some(fields)
    }
}

/// 逐行提取 `key: value`，跳过值为空的行
fn field_lines(description: &str) -> impl Iterator<Item = (&str, &str)> {
    description.lines().filter_map(|line| {
        let (key, value) = line.split_once(':')?;
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() || value.is_empty() || key.contains(char::is_whitespace) {
            return None;
        }
        Some((key, value))
    })
}
