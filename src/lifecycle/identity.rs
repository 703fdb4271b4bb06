//! 身份 → 会话名
//!
//! 只解析两类身份：`mayor` 与 `<rig>-witness`。crew / polecat / refinery 的会话
//! 在别处按 rig 限定名寻址，这里一律视为"无会话"，调用方跳过即可。

use crate::agents::{MAYOR_SESSION, SESSION_PREFIX};

const WITNESS_SUFFIX: &str = "-witness";

/// 把请求方身份解析为会话名；无法解析时返回 None（不是错误）
pub fn resolve_session(identity: &str) -> Option<String> {
    if identity == "mayor" {
        return Some(MAYOR_SESSION.to_string());
    }
    match identity.strip_suffix(WITNESS_SUFFIX) {
        Some(rig) if !rig.is_empty() => Some(format!("{SESSION_PREFIX}{identity}")),
        _ => None,
    }
}
