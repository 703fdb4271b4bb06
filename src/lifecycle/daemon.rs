//! 生命周期守护进程：轮询消息存储，按请求重启 / 关闭会话
//!
//! 每条消息的处理流程：
//! Received → Classified → Resolved → Executed | Skipped
//!
//! - 已处理标记（内存缓存 + 存储中的 processed 记录）保证同一消息不会执行两次
//! - 一批消息按存储顺序串行处理，同一会话的先后请求不会乱序
//! - 单条消息的会话操作失败只记录在该消息上，循环继续
//! - 关闭信号只在两次轮询之间生效

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::identity::resolve_session;
use super::parser::{parse_lifecycle_request, LifecycleAction};
use crate::config::DaemonSection;
use crate::core::{SessionError, StoreError};
use crate::session::SessionController;
use crate::store::{Checkpoint, Message, MessageStore};

/// 内存中的已处理缓存上限；超过后清空，以存储中的标记为准
const PROCESSED_CACHE_LIMIT: usize = 10_000;

/// 回执消息的发送者
const ACK_SENDER: &str = "daemon";

/// 守护进程参数
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// checkpoint 与已处理标记使用的消费者名
    pub consumer: String,
    pub poll_interval: Duration,
    /// 每次轮询最多读取的消息数
    pub batch_limit: usize,
    /// 停止与重新启动之间的等待
    pub restart_delay: Duration,
    /// 是否向请求方回写 `LIFECYCLE-ACK:` 消息
    pub ack_requests: bool,
    /// 只处理发给该收件人的消息；None 表示全部
    pub inbox: Option<String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            consumer: "lifecycle-daemon".to_string(),
            poll_interval: Duration::from_secs(10),
            batch_limit: 100,
            restart_delay: Duration::from_millis(500),
            ack_requests: false,
            inbox: None,
        }
    }
}

impl From<&DaemonSection> for DaemonConfig {
    fn from(section: &DaemonSection) -> Self {
        Self {
            consumer: section.consumer.clone(),
            poll_interval: Duration::from_secs(section.poll_interval_secs.max(1)),
            batch_limit: section.batch_limit.max(1),
            restart_delay: Duration::from_millis(section.restart_delay_ms),
            ack_requests: section.ack_requests,
            inbox: section.inbox.clone().filter(|s| !s.is_empty()),
        }
    }
}

/// 跳过原因（正常情况，不是错误）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// 收件人不是本守护进程
    NotAddressed,
    /// 不是生命周期请求
    NotLifecycle,
    /// 请求方身份没有对应会话
    UnresolvedIdentity { requester: String },
    /// 之前已经处理过
    AlreadyProcessed,
}

/// 一次成功执行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Execution {
    pub action: LifecycleAction,
    pub requester: String,
    pub session: String,
    /// 执行前会话是否在运行
    pub was_running: bool,
}

/// 单条消息的处理结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Executed(Execution),
    Skipped(SkipReason),
    Failed {
        #[serde(skip_serializing_if = "Option::is_none")]
        action: Option<LifecycleAction>,
        #[serde(skip_serializing_if = "Option::is_none")]
        session: Option<String>,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageOutcome {
    pub message_id: String,
    pub seq: i64,
    pub outcome: Outcome,
}

/// 一次轮询的汇总
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollReport {
    /// 本轮结束后的 checkpoint
    pub checkpoint: Checkpoint,
    pub outcomes: Vec<MessageOutcome>,
}

impl PollReport {
    pub fn executed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Executed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.outcomes.iter().filter(|m| pred(&m.outcome)).count()
    }
}

/// 生命周期守护进程
pub struct LifecycleDaemon {
    store: Arc<dyn MessageStore>,
    sessions: Arc<dyn SessionController>,
    config: DaemonConfig,
    checkpoint: Checkpoint,
    processed: HashSet<String>,
}

impl LifecycleDaemon {
    pub fn new(
        store: Arc<dyn MessageStore>,
        sessions: Arc<dyn SessionController>,
        config: DaemonConfig,
    ) -> Self {
        Self {
            store,
            sessions,
            config,
            checkpoint: Checkpoint::START,
            processed: HashSet::new(),
        }
    }

    /// 从指定 checkpoint 开始（测试或手动回放）
    pub fn with_checkpoint(mut self, checkpoint: Checkpoint) -> Self {
        self.checkpoint = checkpoint;
        self
    }

    pub fn checkpoint(&self) -> Checkpoint {
        self.checkpoint
    }

    /// 从存储恢复 checkpoint（只前进不后退）
    pub async fn restore_checkpoint(&mut self) -> Result<Checkpoint, StoreError> {
        let saved = self.store.load_checkpoint(&self.config.consumer).await?;
        self.checkpoint = self.checkpoint.advance(saved.seq());
        Ok(self.checkpoint)
    }

    /// 轮询一次：读取 checkpoint 之后的消息，按顺序处理，然后推进 checkpoint
    pub async fn poll_once(&mut self) -> Result<PollReport, StoreError> {
        let messages = self
            .store
            .list_messages(self.checkpoint, self.config.batch_limit)
            .await?;

        let mut report = PollReport {
            checkpoint: self.checkpoint,
            outcomes: Vec::with_capacity(messages.len()),
        };
        let mut next = self.checkpoint;

        for msg in &messages {
            let outcome = self.process_message(msg).await;
            next = next.advance(msg.seq);
            report.outcomes.push(MessageOutcome {
                message_id: msg.id.clone(),
                seq: msg.seq,
                outcome,
            });
        }

        if next > self.checkpoint {
            self.checkpoint = next;
            if let Err(e) = self.store.save_checkpoint(&self.config.consumer, next).await {
                // 内存游标已前进；重启后靠已处理标记去重
                warn!(checkpoint = %next, error = %e, "failed to persist checkpoint");
            }
        }
        report.checkpoint = self.checkpoint;
        Ok(report)
    }

    /// 处理单条消息
    pub async fn process_message(&mut self, msg: &Message) -> Outcome {
        // Received
        if let Some(inbox) = &self.config.inbox {
            if msg.to.as_deref() != Some(inbox.as_str()) {
                return Outcome::Skipped(SkipReason::NotAddressed);
            }
        }

        // Classified
        let Some(request) = parse_lifecycle_request(msg) else {
            return Outcome::Skipped(SkipReason::NotLifecycle);
        };

        match self.already_processed(&msg.id).await {
            Ok(true) => {
                debug!(message_id = %msg.id, "lifecycle request already processed");
                return Outcome::Skipped(SkipReason::AlreadyProcessed);
            }
            Ok(false) => {}
            Err(e) => {
                // 无法确认是否处理过时不执行，避免重复操作
                warn!(message_id = %msg.id, error = %e, "cannot check processed marker");
                return Outcome::Failed {
                    action: Some(request.action),
                    session: None,
                    error: e.to_string(),
                };
            }
        }

        // Resolved
        let outcome = match resolve_session(&request.from) {
            None => {
                debug!(
                    message_id = %msg.id,
                    requester = %request.from,
                    "no session for requester, skipping"
                );
                Outcome::Skipped(SkipReason::UnresolvedIdentity {
                    requester: request.from.clone(),
                })
            }
            Some(session) => match self.execute(request.action, &session).await {
                Ok(was_running) => {
                    info!(
                        message_id = %msg.id,
                        action = %request.action,
                        requester = %request.from,
                        session = %session,
                        was_running,
                        "lifecycle {} executed",
                        request.action
                    );
                    Outcome::Executed(Execution {
                        action: request.action,
                        requester: request.from.clone(),
                        session,
                        was_running,
                    })
                }
                Err(e) => {
                    warn!(
                        message_id = %msg.id,
                        action = %request.action,
                        session = %session,
                        error = %e,
                        "lifecycle action failed"
                    );
                    Outcome::Failed {
                        action: Some(request.action),
                        session: Some(session),
                        error: e.to_string(),
                    }
                }
            },
        };

        self.record_processed(&msg.id).await;
        if self.config.ack_requests {
            self.acknowledge(msg, &request.from, &outcome).await;
        }
        outcome
    }

    /// 持续轮询直到收到关闭信号
    pub async fn run(&mut self, shutdown: CancellationToken) {
        match self.restore_checkpoint().await {
            Ok(cp) => info!(checkpoint = %cp, consumer = %self.config.consumer, "lifecycle daemon started"),
            Err(e) => warn!(error = %e, "could not restore checkpoint, starting from {}", self.checkpoint),
        }

        while !shutdown.is_cancelled() {
            match self.poll_once().await {
                Ok(report) if !report.outcomes.is_empty() => {
                    info!(
                        checkpoint = %report.checkpoint,
                        executed = report.executed(),
                        skipped = report.skipped(),
                        failed = report.failed(),
                        "poll cycle finished"
                    );
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "poll failed, retrying next cycle"),
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
        info!(checkpoint = %self.checkpoint, "lifecycle daemon stopped");
    }

    /// 执行会话操作，返回执行前是否在运行
    async fn execute(&self, action: LifecycleAction, session: &str) -> Result<bool, SessionError> {
        let was_running = self.sessions.session_exists(session).await?;
        if was_running {
            self.sessions.stop_session(session).await?;
        }
        match action {
            LifecycleAction::Cycle | LifecycleAction::Restart => {
                if was_running && !self.config.restart_delay.is_zero() {
                    tokio::time::sleep(self.config.restart_delay).await;
                }
                self.sessions.start_session(session).await?;
            }
            LifecycleAction::Shutdown => {}
        }
        Ok(was_running)
    }

    async fn already_processed(&self, message_id: &str) -> Result<bool, StoreError> {
        if self.processed.contains(message_id) {
            return Ok(true);
        }
        self.store.is_processed(&self.config.consumer, message_id).await
    }

    async fn record_processed(&mut self, message_id: &str) {
        if self.processed.len() >= PROCESSED_CACHE_LIMIT {
            self.processed.clear();
        }
        self.processed.insert(message_id.to_string());
        if let Err(e) = self.store.mark_processed(&self.config.consumer, message_id).await {
            warn!(message_id = %message_id, error = %e, "failed to persist processed marker");
        }
    }

    async fn acknowledge(&self, msg: &Message, requester: &str, outcome: &Outcome) {
        let recipient = if requester.is_empty() { msg.from.as_str() } else { requester };
        if recipient.is_empty() {
            return;
        }
        let summary = match outcome {
            Outcome::Executed(exec) => format!("{} {} ok", exec.action, exec.session),
            Outcome::Skipped(SkipReason::UnresolvedIdentity { requester }) => {
                format!("skipped, no session for '{requester}'")
            }
            Outcome::Skipped(_) => return,
            Outcome::Failed { session, error, .. } => format!(
                "{} failed: {error}",
                session.as_deref().unwrap_or("request")
            ),
        };
        let ack = Message::new(ACK_SENDER, format!("LIFECYCLE-ACK: {summary}"))
            .with_to(recipient)
            .with_body(format!("in reply to {}", msg.id))
            .with_type("ack");
        if let Err(e) = self.store.append_message(ack).await {
            warn!(message_id = %msg.id, error = %e, "failed to write acknowledgement");
        }
    }
}
