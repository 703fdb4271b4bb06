//! 消息存储抽象层
//!
//! 守护进程、hook 解析、状态汇总都只通过 `MessageStore` 读取共享存储：
//! - 消息日志：按存储序号有序，轮询时从 checkpoint 之后读取
//! - Bead 记录：handoff、agent、任务，按 id 或目标角色查找
//! - 消费标记：已处理消息与 checkpoint，只追加不原地修改
//!
//! 提供 SQLite（持久化）与内存（测试）两种实现。

pub mod fields;
pub mod memory;
pub mod sqlite;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::StoreError;

pub use fields::{AgentFields, AttachmentFields};
pub use memory::MemoryMessageStore;
pub use sqlite::SqliteMessageStore;
pub use types::{Bead, BeadKind, Checkpoint, Message};

/// 消息存储接口
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// 读取序号大于 `since` 的消息，按存储顺序，最多 `limit` 条
    async fn list_messages(&self, since: Checkpoint, limit: usize) -> Result<Vec<Message>, StoreError>;

    /// 按 id 读取单条消息
    async fn get_message(&self, id: &str) -> Result<Option<Message>, StoreError>;

    /// 追加消息，返回带存储序号的消息
    async fn append_message(&self, message: Message) -> Result<Message, StoreError>;

    /// 查找目标角色最新的 handoff 记录
    async fn find_latest_handoff(&self, role_address: &str) -> Result<Option<Bead>, StoreError>;

    /// 查找 agent bead；不存在时返回 None
    async fn get_agent_bead(&self, agent_id: &str) -> Result<Option<AgentFields>, StoreError>;

    /// 按 id 查找任意 bead（用于取钉住工作的标题）
    async fn get_bead(&self, id: &str) -> Result<Option<Bead>, StoreError>;

    /// 写入或替换 bead；替换后序号更新为最新
    async fn put_bead(&self, bead: Bead) -> Result<Bead, StoreError>;

    /// 标记消息已被某个消费者处理（幂等）
    async fn mark_processed(&self, consumer: &str, message_id: &str) -> Result<(), StoreError>;

    async fn is_processed(&self, consumer: &str, message_id: &str) -> Result<bool, StoreError>;

    /// 读取消费者的 checkpoint，没有记录时为 `Checkpoint::START`
    async fn load_checkpoint(&self, consumer: &str) -> Result<Checkpoint, StoreError>;

    /// 追加一条 checkpoint 记录
    async fn save_checkpoint(&self, consumer: &str, checkpoint: Checkpoint) -> Result<(), StoreError>;
}

/// 只读打开数据库供查询；数据库不存在或打不开时退回空的内存存储
pub fn open_read_only_or_empty(path: &Path) -> Arc<dyn MessageStore> {
    match SqliteMessageStore::open_read_only(path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "store unavailable, reporting without beads");
            Arc::new(MemoryMessageStore::new())
        }
    }
}
