//! 内存消息存储（测试用；数据库缺失时 `gt status` 以空库代替）
//!
//! 语义与 SQLite 实现一致；额外支持故障注入：整库不可用、指定 id 查找失败。

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{AgentFields, Bead, BeadKind, Checkpoint, Message, MessageStore};
use crate::core::StoreError;

#[derive(Default)]
struct Inner {
    messages: Vec<Message>,
    beads: HashMap<String, Bead>,
    processed: HashSet<(String, String)>,
    checkpoints: HashMap<String, Vec<Checkpoint>>,
    next_message_seq: i64,
    next_bead_seq: i64,
    unavailable: bool,
    failing_ids: HashSet<String>,
}

impl Inner {
    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable("memory store marked unavailable".to_string()));
        }
        Ok(())
    }

    fn check_id(&self, id: &str) -> Result<(), StoreError> {
        self.check_available()?;
        if self.failing_ids.contains(id) {
            return Err(StoreError::Unavailable(format!("lookup of {id} failed")));
        }
        Ok(())
    }
}

/// 内存存储
#[derive(Default)]
pub struct MemoryMessageStore {
    inner: RwLock<Inner>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模拟存储整体不可用
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.inner.write().await.unavailable = unavailable;
    }

    /// 让指定 id 的查找失败（agent bead、bead、handoff 目标均适用）
    pub async fn fail_lookups_for(&self, id: impl Into<String>) {
        self.inner.write().await.failing_ids.insert(id.into());
    }

    /// 消费者写过的所有 checkpoint（按写入顺序）
    pub async fn checkpoint_history(&self, consumer: &str) -> Vec<Checkpoint> {
        self.inner
            .read()
            .await
            .checkpoints
            .get(consumer)
            .cloned()
            .unwrap_or_default()
    }

    /// 所有消息（按存储顺序）
    pub async fn messages(&self) -> Vec<Message> {
        self.inner.read().await.messages.clone()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn list_messages(&self, since: Checkpoint, limit: usize) -> Result<Vec<Message>, StoreError> {
        let inner = self.inner.read().await;
        inner.check_available()?;
        Ok(inner
            .messages
            .iter()
            .filter(|m| m.seq > since.seq())
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_message(&self, id: &str) -> Result<Option<Message>, StoreError> {
        let inner = self.inner.read().await;
        inner.check_id(id)?;
        Ok(inner.messages.iter().find(|m| m.id == id).cloned())
    }

    async fn append_message(&self, mut message: Message) -> Result<Message, StoreError> {
        let mut inner = self.inner.write().await;
        inner.check_available()?;
        if inner.messages.iter().any(|m| m.id == message.id) {
            return Err(StoreError::Duplicate(message.id));
        }
        inner.next_message_seq += 1;
        message.seq = inner.next_message_seq;
        inner.messages.push(message.clone());
        Ok(message)
    }

    async fn find_latest_handoff(&self, role_address: &str) -> Result<Option<Bead>, StoreError> {
        let inner = self.inner.read().await;
        inner.check_id(role_address)?;
        Ok(inner
            .beads
            .values()
            .filter(|b| b.kind == BeadKind::Handoff && b.assignee.as_deref() == Some(role_address))
            .max_by_key(|b| b.seq)
            .cloned())
    }

    async fn get_agent_bead(&self, agent_id: &str) -> Result<Option<AgentFields>, StoreError> {
        let inner = self.inner.read().await;
        inner.check_id(agent_id)?;
        Ok(inner
            .beads
            .get(agent_id)
            .filter(|b| b.kind == BeadKind::Agent)
            .map(Bead::agent_fields))
    }

    async fn get_bead(&self, id: &str) -> Result<Option<Bead>, StoreError> {
        let inner = self.inner.read().await;
        inner.check_id(id)?;
        Ok(inner.beads.get(id).cloned())
    }

    async fn put_bead(&self, mut bead: Bead) -> Result<Bead, StoreError> {
        let mut inner = self.inner.write().await;
        inner.check_available()?;
        inner.next_bead_seq += 1;
        bead.seq = inner.next_bead_seq;
        inner.beads.insert(bead.id.clone(), bead.clone());
        Ok(bead)
    }

    async fn mark_processed(&self, consumer: &str, message_id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.check_available()?;
        inner
            .processed
            .insert((consumer.to_string(), message_id.to_string()));
        Ok(())
    }

    async fn is_processed(&self, consumer: &str, message_id: &str) -> Result<bool, StoreError> {
        let inner = self.inner.read().await;
        inner.check_available()?;
        Ok(inner
            .processed
            .contains(&(consumer.to_string(), message_id.to_string())))
    }

    async fn load_checkpoint(&self, consumer: &str) -> Result<Checkpoint, StoreError> {
        let inner = self.inner.read().await;
        inner.check_available()?;
        Ok(inner
            .checkpoints
            .get(consumer)
            .and_then(|history| history.iter().max().copied())
            .unwrap_or(Checkpoint::START))
    }

    async fn save_checkpoint(&self, consumer: &str, checkpoint: Checkpoint) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.check_available()?;
        inner
            .checkpoints
            .entry(consumer.to_string())
            .or_default()
            .push(checkpoint);
        Ok(())
    }
}
