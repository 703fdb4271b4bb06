//! tmux 会话运行时
//!
//! 通过 `tmux has-session / new-session / kill-session` 管理会话，目标名前加 `=` 精确匹配，
//! 避免 `gt-gastown` 前缀匹配到 `gt-gastown-witness`。

use std::path::PathBuf;
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;

use super::SessionController;
use crate::core::SessionError;

/// tmux 会话控制
#[derive(Debug, Clone)]
pub struct TmuxSessions {
    binary: String,
    /// 新会话中执行的命令，None 时使用 tmux 默认 shell
    start_command: Option<String>,
    /// 新会话的工作目录
    workdir: Option<PathBuf>,
}

impl TmuxSessions {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            start_command: None,
            workdir: None,
        }
    }

    pub fn with_start_command(mut self, command: Option<String>) -> Self {
        self.start_command = command.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    fn target(name: &str) -> String {
        format!("={name}")
    }

    /// new-session 的参数（不含二进制名）
    fn new_session_args(&self, name: &str) -> Vec<String> {
        let mut args = vec![
            "new-session".to_string(),
            "-d".to_string(),
            "-s".to_string(),
            name.to_string(),
        ];
        if let Some(dir) = &self.workdir {
            args.push("-c".to_string());
            args.push(dir.display().to_string());
        }
        if let Some(cmd) = &self.start_command {
            args.push(cmd.clone());
        }
        args
    }

    async fn run(&self, args: &[String]) -> Result<Output, SessionError> {
        tracing::debug!(binary = %self.binary, args = ?args, "tmux");
        Ok(Command::new(&self.binary).args(args).output().await?)
    }

    fn failure(action: &str, name: &str, output: &Output) -> SessionError {
        let stderr = String::from_utf8_lossy(&output.stderr);
        SessionError::Runtime(format!(
            "tmux {action} {name} exited with {}: {}",
            output.status,
            stderr.trim()
        ))
    }
}

impl Default for TmuxSessions {
    fn default() -> Self {
        Self::new("tmux")
    }
}

#[async_trait]
impl SessionController for TmuxSessions {
    async fn session_exists(&self, name: &str) -> Result<bool, SessionError> {
        let args = ["has-session".to_string(), "-t".to_string(), Self::target(name)];
        // 非零退出（包括 "no server running"）都表示会话不存在
        Ok(self.run(&args).await?.status.success())
    }

    async fn start_session(&self, name: &str) -> Result<(), SessionError> {
        if self.session_exists(name).await? {
            return Ok(());
        }
        let output = self.run(&self.new_session_args(name)).await?;
        if !output.status.success() {
            return Err(Self::failure("new-session", name, &output));
        }
        tracing::info!(session = %name, "tmux session started");
        Ok(())
    }

    async fn stop_session(&self, name: &str) -> Result<(), SessionError> {
        if !self.session_exists(name).await? {
            return Err(SessionError::NotFound(name.to_string()));
        }
        let args = ["kill-session".to_string(), "-t".to_string(), Self::target(name)];
        let output = self.run(&args).await?;
        if !output.status.success() {
            return Err(Self::failure("kill-session", name, &output));
        }
        tracing::info!(session = %name, "tmux session stopped");
        Ok(())
    }
}
