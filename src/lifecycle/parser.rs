//! 生命周期请求解析
//!
//! 语法：subject 以 `LIFECYCLE:`（大小写不敏感）开头，例如 `LIFECYCLE: mayor requesting cycle`。
//!
//! 动作判定顺序固定：restart → shutdown/stop → cycle。前缀 `lifecycle:` 本身就含有 "cycle"，
//! 所以 cycle 必须作为独立单词（前面是空白）出现，且放在最后判断。
//!
//! 这是全仓库唯一对消息内容做字符串匹配的地方。

use serde::Serialize;

use crate::store::Message;

const PREFIX: &str = "lifecycle:";
const REQUESTING: &str = "requesting";

const RESTART_KEYWORDS: &[&str] = &["restart"];
const SHUTDOWN_KEYWORDS: &[&str] = &["shutdown", "stop"];
/// 必须以空白开头的单词形式
const CYCLE_WORDS: &[&str] = &["cycle", "cycling"];

/// 生命周期动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleAction {
    /// 先停后启
    Cycle,
    /// 与 Cycle 相同的会话操作，审计语义不同
    Restart,
    /// 只停止
    Shutdown,
}

impl LifecycleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleAction::Cycle => "cycle",
            LifecycleAction::Restart => "restart",
            LifecycleAction::Shutdown => "shutdown",
        }
    }

    /// 执行后会话是否应处于运行状态
    pub fn starts_session(&self) -> bool {
        match self {
            LifecycleAction::Cycle | LifecycleAction::Restart => true,
            LifecycleAction::Shutdown => false,
        }
    }
}

impl std::fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 从一条消息解析出的请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleRequest {
    pub action: LifecycleAction,
    /// 请求方身份，可能为空
    pub from: String,
}

/// 解析消息；不是生命周期请求时返回 None
pub fn parse_lifecycle_request(msg: &Message) -> Option<LifecycleRequest> {
    let lower = msg.subject.to_ascii_lowercase();
    let rest = lower.strip_prefix(PREFIX)?;
    let action = classify(rest)?;

    let from = extract_requester(&msg.subject)
        .unwrap_or_else(|| msg.from.trim().to_string());

    Some(LifecycleRequest { action, from })
}

fn classify(rest: &str) -> Option<LifecycleAction> {
    if RESTART_KEYWORDS.iter().any(|k| rest.contains(k)) {
        Some(LifecycleAction::Restart)
    } else if SHUTDOWN_KEYWORDS.iter().any(|k| rest.contains(k)) {
        Some(LifecycleAction::Shutdown)
    } else if has_cycle_word(rest) {
        Some(LifecycleAction::Cycle)
    } else {
        None
    }
}

/// 在空白之后出现的 cycle / cycling
fn has_cycle_word(rest: &str) -> bool {
    rest.match_indices("cycl").any(|(i, _)| {
        let preceded_by_space = rest[..i].chars().next_back().is_some_and(char::is_whitespace);
        preceded_by_space && CYCLE_WORDS.iter().any(|w| rest[i..].starts_with(w))
    })
}

/// 取第一个独立单词 "requesting" 前面的单词，保留原始大小写
fn extract_requester(subject: &str) -> Option<String> {
    // 前缀已按 ASCII 匹配，PREFIX.len() 一定落在字符边界上
    let words: Vec<&str> = subject.get(PREFIX.len()..)?.split_whitespace().collect();
    let idx = words.iter().position(|w| w.eq_ignore_ascii_case(REQUESTING))?;
    idx.checked_sub(1).map(|i| words[i].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(subject: &str, from: &str) -> Message {
        Message::new(from, subject)
    }

    #[test]
    fn test_requester_may_contain_requesting() {
        let req = parse_lifecycle_request(&msg("LIFECYCLE: requesting-witness requesting cycle", "x")).unwrap();
        assert_eq!(req.action, LifecycleAction::Cycle);
        assert_eq!(req.from, "requesting-witness");

        let req = parse_lifecycle_request(&msg("LIFECYCLE: Requesting-Bot REQUESTING restart", "x")).unwrap();
        assert_eq!(req.from, "Requesting-Bot");
    }

    #[test]
    fn test_cycle_requests() {
        for subject in [
            "LIFECYCLE: mayor requesting cycle",
            "lifecycle: gastown-witness requesting cycling",
            "LIFECYCLE: witness requesting cycle now",
            "Lifecycle: deacon requesting\tcycle",
        ] {
            let req = parse_lifecycle_request(&msg(subject, "test-sender"))
                .unwrap_or_else(|| panic!("{subject} should parse"));
            assert_eq!(req.action, LifecycleAction::Cycle, "{subject}");
        }
    }

    #[test]
    fn test_restart_and_shutdown_take_precedence() {
        let cases = [
            ("LIFECYCLE: mayor requesting restart", LifecycleAction::Restart),
            ("LIFECYCLE: mayor requesting shutdown", LifecycleAction::Shutdown),
            ("lifecycle: witness requesting stop", LifecycleAction::Shutdown),
            ("LIFECYCLE: mayor requesting RESTART", LifecycleAction::Restart),
            ("LIFECYCLE: mayor requesting restart cycle", LifecycleAction::Restart),
            ("LIFECYCLE: mayor requesting stop cycle", LifecycleAction::Shutdown),
        ];
        for (subject, expected) in cases {
            let req = parse_lifecycle_request(&msg(subject, "test-sender")).unwrap();
            assert_eq!(req.action, expected, "{subject}");
        }
    }

    #[test]
    fn test_not_lifecycle() {
        for subject in [
            "Regular message",
            "HEARTBEAT: check rigs",
            "lifecycle without colon",
            "Something else: requesting cycle",
            "",
            " LIFECYCLE: mayor requesting cycle",
        ] {
            assert_eq!(parse_lifecycle_request(&msg(subject, "test-sender")), None, "{subject:?}");
        }
    }

    #[test]
    fn test_lifecycle_without_action_word() {
        // 前缀里的 "cycle" 不算
        assert_eq!(parse_lifecycle_request(&msg("LIFECYCLE: mayor requesting", "x")), None);
        assert_eq!(parse_lifecycle_request(&msg("LIFECYCLE:cycle", "x")), None);
        assert_eq!(parse_lifecycle_request(&msg("LIFECYCLE: mayor requesting bicycle", "x")), None);
        assert_eq!(parse_lifecycle_request(&msg("LIFECYCLE: mayor requesting cyclone", "x")), None);
    }

    #[test]
    fn test_extracts_requester() {
        let cases = [
            ("LIFECYCLE: mayor requesting cycle", "mayor"),
            ("LIFECYCLE: gastown-witness requesting restart", "gastown-witness"),
            ("lifecycle: my-rig-witness requesting shutdown", "my-rig-witness"),
            ("LIFECYCLE: MyRig-Witness Requesting cycle", "MyRig-Witness"),
        ];
        for (subject, expected) in cases {
            let req = parse_lifecycle_request(&msg(subject, "fallback")).unwrap();
            assert_eq!(req.from, expected, "{subject}");
        }
    }

    #[test]
    fn test_falls_back_to_sender() {
        let req = parse_lifecycle_request(&msg("LIFECYCLE: requesting cycle", "fallback-sender")).unwrap();
        assert_eq!(req.from, "fallback-sender");
        assert_eq!(req.action, LifecycleAction::Cycle);

        let req = parse_lifecycle_request(&msg("LIFECYCLE: please stop", "gastown-witness")).unwrap();
        assert_eq!(req.from, "gastown-witness");
    }

    #[test]
    fn test_empty_requester_when_nothing_available() {
        let req = parse_lifecycle_request(&msg("LIFECYCLE: requesting restart", "")).unwrap();
        assert_eq!(req.from, "");
        assert_eq!(req.action, LifecycleAction::Restart);
    }

    #[test]
    fn test_action_semantics() {
        assert!(LifecycleAction::Cycle.starts_session());
        assert!(LifecycleAction::Restart.starts_session());
        assert!(!LifecycleAction::Shutdown.starts_session());
        assert_eq!(LifecycleAction::Restart.to_string(), "restart");
    }
}
