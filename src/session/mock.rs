//! 测试用会话控制（无需 tmux）
//!
//! 在内存中维护"运行中"集合，并按顺序记录每次调用，便于断言幂等与先停后启的顺序。

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::SessionController;
use crate::core::SessionError;

/// 一次会话控制调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCall {
    Exists(String),
    Start(String),
    Stop(String),
}

#[derive(Default)]
struct State {
    running: HashSet<String>,
    calls: Vec<SessionCall>,
    failing: HashSet<String>,
}

/// 记录调用的会话控制
#[derive(Default)]
pub struct RecordingSessions {
    state: Mutex<State>,
}

impl RecordingSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置运行中的会话
    pub fn with_running<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let state = State {
            running: names.into_iter().map(Into::into).collect(),
            ..State::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    /// 让指定会话的所有操作失败（模拟运行时不可用）
    pub async fn fail_for(&self, name: impl Into<String>) {
        self.state.lock().await.failing.insert(name.into());
    }

    pub async fn is_running(&self, name: &str) -> bool {
        self.state.lock().await.running.contains(name)
    }

    /// 全部调用记录
    pub async fn calls(&self) -> Vec<SessionCall> {
        self.state.lock().await.calls.clone()
    }

    /// 只保留 start / stop（不含查询）
    pub async fn control_calls(&self) -> Vec<SessionCall> {
        self.calls()
            .await
            .into_iter()
            .filter(|c| !matches!(c, SessionCall::Exists(_)))
            .collect()
    }
}

fn check(state: &State, name: &str) -> Result<(), SessionError> {
    if state.failing.contains(name) {
        return Err(SessionError::Runtime(format!("runtime unavailable for {name}")));
    }
    Ok(())
}

#[async_trait]
impl SessionController for RecordingSessions {
    async fn session_exists(&self, name: &str) -> Result<bool, SessionError> {
        let mut state = self.state.lock().await;
        state.calls.push(SessionCall::Exists(name.to_string()));
        check(&state, name)?;
        Ok(state.running.contains(name))
    }

    async fn start_session(&self, name: &str) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;
        state.calls.push(SessionCall::Start(name.to_string()));
        check(&state, name)?;
        state.running.insert(name.to_string());
        Ok(())
    }

    async fn stop_session(&self, name: &str) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;
        state.calls.push(SessionCall::Stop(name.to_string()));
        check(&state, name)?;
        if !state.running.remove(name) {
            return Err(SessionError::NotFound(name.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_stop_tracks_running() {
        let sessions = RecordingSessions::new();
        sessions.start_session("gt-mayor").await.unwrap();
        assert!(sessions.session_exists("gt-mayor").await.unwrap());
        sessions.stop_session("gt-mayor").await.unwrap();
        assert!(!sessions.is_running("gt-mayor").await);
        assert!(matches!(
            sessions.stop_session("gt-mayor").await,
            Err(SessionError::NotFound(_))
        ));
        assert_eq!(sessions.control_calls().await.len(), 3);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let sessions = RecordingSessions::with_running(["gt-deacon"]);
        sessions.fail_for("gt-deacon").await;
        assert!(sessions.session_exists("gt-deacon").await.is_err());
        assert!(sessions.is_running("gt-deacon").await);
    }
}
