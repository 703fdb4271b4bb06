//! SQLite 消息存储
//!
//! 四张表：
//! - `messages`：邮件日志，`seq` 自增即存储顺序
//! - `beads`：记录表，替换写入会分配新的 `seq`，用于"最新 handoff"判定
//! - `processed_messages`：消费标记
//! - `checkpoints`：checkpoint 只追加，读取时取最大值
//!
//! 单连接 + Mutex；查询都是本地短事务，直接在调用方任务里执行。

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};

use super::{AgentFields, Bead, BeadKind, Checkpoint, Message, MessageStore};
use crate::core::StoreError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS messages (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    subject TEXT NOT NULL,
    body TEXT NOT NULL DEFAULT '',
    sender TEXT NOT NULL,
    recipient TEXT,
    priority TEXT NOT NULL,
    msg_type TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS beads (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    kind TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    assignee TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_beads_assignee ON beads(kind, assignee);
CREATE TABLE IF NOT EXISTS processed_messages (
    consumer TEXT NOT NULL,
    message_id TEXT NOT NULL,
    processed_at TEXT NOT NULL,
    PRIMARY KEY (consumer, message_id)
);
CREATE TABLE IF NOT EXISTS checkpoints (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    consumer TEXT NOT NULL,
    seq INTEGER NOT NULL,
    saved_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_checkpoints_consumer ON checkpoints(consumer);
";

/// SQLite 存储
pub struct SqliteMessageStore {
    conn: Mutex<Connection>,
}

impl SqliteMessageStore {
    /// 打开（或创建）数据库文件；父目录不存在时自动创建
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Unavailable(format!("{}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        Self::init(conn)
    }

    /// 只读打开已有数据库：不创建文件或目录，不写入 schema
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(StoreError::Unavailable(format!("{} does not exist", path.display())));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite connection lock poisoned".to_string()))
    }
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        seq: row.get("seq")?,
        id: row.get("id")?,
        subject: row.get("subject")?,
        body: row.get("body")?,
        from: row.get("sender")?,
        to: row.get("recipient")?,
        priority: row.get("priority")?,
        msg_type: row.get("msg_type")?,
        created_at: row.get("created_at")?,
    })
}

fn bead_from_row(row: &Row<'_>) -> rusqlite::Result<Bead> {
    let kind: String = row.get("kind")?;
    let kind = BeadKind::parse(&kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("unknown bead kind '{kind}'").into(),
        )
    })?;
    Ok(Bead {
        seq: row.get("seq")?,
        id: row.get("id")?,
        kind,
        title: row.get("title")?,
        description: row.get("description")?,
        assignee: row.get("assignee")?,
        created_at: row.get("created_at")?,
    })
}

const BEAD_COLUMNS: &str = "seq, id, kind, title, description, assignee, created_at";

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn list_messages(&self, since: Checkpoint, limit: usize) -> Result<Vec<Message>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT seq, id, subject, body, sender, recipient, priority, msg_type, created_at
             FROM messages WHERE seq > ?1 ORDER BY seq ASC LIMIT ?2",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![since.seq(), limit], message_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn get_message(&self, id: &str) -> Result<Option<Message>, StoreError> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                "SELECT seq, id, subject, body, sender, recipient, priority, msg_type, created_at
                 FROM messages WHERE id = ?1",
                params![id],
                message_from_row,
            )
            .optional()?)
    }

    async fn append_message(&self, mut message: Message) -> Result<Message, StoreError> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO messages (id, subject, body, sender, recipient, priority, msg_type, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                message.id,
                message.subject,
                message.body,
                message.from,
                message.to,
                message.priority,
                message.msg_type,
                message.created_at,
            ],
        )?;
        if inserted == 0 {
            return Err(StoreError::Duplicate(message.id));
        }
        message.seq = conn.last_insert_rowid();
        Ok(message)
    }

    async fn find_latest_handoff(&self, role_address: &str) -> Result<Option<Bead>, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {BEAD_COLUMNS} FROM beads WHERE kind = 'handoff' AND assignee = ?1
             ORDER BY seq DESC LIMIT 1"
        );
        Ok(conn
            .query_row(&sql, params![role_address], bead_from_row)
            .optional()?)
    }

    async fn get_agent_bead(&self, agent_id: &str) -> Result<Option<AgentFields>, StoreError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {BEAD_COLUMNS} FROM beads WHERE id = ?1 AND kind = 'agent'");
        let bead = conn.query_row(&sql, params![agent_id], bead_from_row).optional()?;
        Ok(bead.as_ref().map(Bead::agent_fields))
    }

    async fn get_bead(&self, id: &str) -> Result<Option<Bead>, StoreError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {BEAD_COLUMNS} FROM beads WHERE id = ?1");
        Ok(conn.query_row(&sql, params![id], bead_from_row).optional()?)
    }

    async fn put_bead(&self, mut bead: Bead) -> Result<Bead, StoreError> {
        let conn = self.conn()?;
        // REPLACE 会删除旧行再插入，seq 随之更新
        conn.execute(
            "INSERT OR REPLACE INTO beads (id, kind, title, description, assignee, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                bead.id,
                bead.kind.as_str(),
                bead.title,
                bead.description,
                bead.assignee,
                bead.created_at,
            ],
        )?;
        bead.seq = conn.last_insert_rowid();
        Ok(bead)
    }

    async fn mark_processed(&self, consumer: &str, message_id: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO processed_messages (consumer, message_id, processed_at)
             VALUES (?1, ?2, ?3)",
            params![consumer, message_id, Utc::now()],
        )?;
        Ok(())
    }

    async fn is_processed(&self, consumer: &str, message_id: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM processed_messages WHERE consumer = ?1 AND message_id = ?2",
                params![consumer, message_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    async fn load_checkpoint(&self, consumer: &str) -> Result<Checkpoint, StoreError> {
        let conn = self.conn()?;
        let seq: Option<i64> = conn.query_row(
            "SELECT MAX(seq) FROM checkpoints WHERE consumer = ?1",
            params![consumer],
            |row| row.get(0),
        )?;
        Ok(seq.map(Checkpoint).unwrap_or(Checkpoint::START))
    }

    async fn save_checkpoint(&self, consumer: &str, checkpoint: Checkpoint) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO checkpoints (consumer, seq, saved_at) VALUES (?1, ?2, ?3)",
            params![consumer, checkpoint.seq(), Utc::now()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_only_open_of_missing_db_creates_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let db = tmp.path().join(".beads/beads.db");

        let err = SqliteMessageStore::open_read_only(&db);
        assert!(matches!(err, Err(StoreError::Unavailable(_))));
        assert!(!db.exists());
        assert!(!tmp.path().join(".beads").exists());
    }

    #[tokio::test]
    async fn test_read_only_open_reads_but_rejects_writes() {
        let tmp = tempfile::tempdir().unwrap();
        let db = tmp.path().join("beads.db");
        {
            let store = SqliteMessageStore::open(&db).unwrap();
            store
                .put_bead(Bead::new("gt-41", BeadKind::Task, "Write release notes"))
                .await
                .unwrap();
        }

        let reader = SqliteMessageStore::open_read_only(&db).unwrap();
        let bead = reader.get_bead("gt-41").await.unwrap().unwrap();
        assert_eq!(bead.title, "Write release notes");
        assert!(reader.append_message(Message::new("mayor", "hello")).await.is_err());
    }

    #[tokio::test]
    async fn test_messages_listed_in_store_order() {
        let store = SqliteMessageStore::open_in_memory().unwrap();
        for i in 0..3 {
            store
                .append_message(Message::new("mayor", format!("msg {i}")).with_to("deacon"))
                .await
                .unwrap();
        }
        let all = store.list_messages(Checkpoint::START, 10).await.unwrap();
        let subjects: Vec<_> = all.iter().map(|m| m.subject.as_str()).collect();
        assert_eq!(subjects, vec!["msg 0", "msg 1", "msg 2"]);
        assert_eq!(all[0].to.as_deref(), Some("deacon"));

        let tail = store.list_messages(Checkpoint(all[1].seq), 10).await.unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].subject, "msg 2");

        let limited = store.list_messages(Checkpoint::START, 2).await.unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_message_rejected() {
        let store = SqliteMessageStore::open_in_memory().unwrap();
        store.append_message(Message::new("a", "x").with_id("m-1")).await.unwrap();
        let err = store.append_message(Message::new("a", "x").with_id("m-1")).await;
        assert!(matches!(err, Err(StoreError::Duplicate(id)) if id == "m-1"));

        let fetched = store.get_message("m-1").await.unwrap().unwrap();
        assert_eq!(fetched.seq, 1);
        assert!(store.get_message("m-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replaced_handoff_becomes_latest() {
        let store = SqliteMessageStore::open_in_memory().unwrap();
        store
            .put_bead(Bead::new("h-1", BeadKind::Handoff, "first").with_assignee("gastown/toast"))
            .await
            .unwrap();
        store
            .put_bead(Bead::new("h-2", BeadKind::Handoff, "second").with_assignee("gastown/toast"))
            .await
            .unwrap();
        assert_eq!(
            store.find_latest_handoff("gastown/toast").await.unwrap().unwrap().id,
            "h-2"
        );

        // 重写 h-1 后它成为最新
        store
            .put_bead(
                Bead::new("h-1", BeadKind::Handoff, "first, updated")
                    .with_assignee("gastown/toast")
                    .with_description("attached_molecule: mol-9"),
            )
            .await
            .unwrap();
        let latest = store.find_latest_handoff("gastown/toast").await.unwrap().unwrap();
        assert_eq!(latest.id, "h-1");
        assert_eq!(latest.attachment().unwrap().attached_molecule, "mol-9");
    }

    #[tokio::test]
    async fn test_agent_bead_lookup_requires_agent_kind() {
        let store = SqliteMessageStore::open_in_memory().unwrap();
        store
            .put_bead(
                Bead::new("gt-mayor", BeadKind::Agent, "mayor")
                    .with_description("hook_bead: gt-task-1\nagent_state: working"),
            )
            .await
            .unwrap();
        store
            .put_bead(Bead::new("gt-task-1", BeadKind::Task, "Fix the build"))
            .await
            .unwrap();

        let fields = store.get_agent_bead("gt-mayor").await.unwrap().unwrap();
        assert_eq!(fields.hook_bead, "gt-task-1");
        assert_eq!(fields.agent_state, "working");
        assert!(store.get_agent_bead("gt-task-1").await.unwrap().is_none());
        assert_eq!(store.get_bead("gt-task-1").await.unwrap().unwrap().title, "Fix the build");
    }

    #[tokio::test]
    async fn test_processed_markers_and_checkpoints() {
        let store = SqliteMessageStore::open_in_memory().unwrap();
        assert!(!store.is_processed("daemon", "m-1").await.unwrap());
        store.mark_processed("daemon", "m-1").await.unwrap();
        store.mark_processed("daemon", "m-1").await.unwrap();
        assert!(store.is_processed("daemon", "m-1").await.unwrap());
        assert!(!store.is_processed("other", "m-1").await.unwrap());

        assert_eq!(store.load_checkpoint("daemon").await.unwrap(), Checkpoint::START);
        store.save_checkpoint("daemon", Checkpoint(4)).await.unwrap();
        store.save_checkpoint("daemon", Checkpoint(9)).await.unwrap();
        assert_eq!(store.load_checkpoint("daemon").await.unwrap(), Checkpoint(9));
    }

    #[tokio::test]
    async fn test_file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".beads").join("beads.db");
        {
            let store = SqliteMessageStore::open(&path).unwrap();
            store.append_message(Message::new("mayor", "persisted")).await.unwrap();
            store.save_checkpoint("daemon", Checkpoint(1)).await.unwrap();
        }
        let store = SqliteMessageStore::open(&path).unwrap();
        let all = store.list_messages(Checkpoint::START, 10).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(store.load_checkpoint("daemon").await.unwrap(), Checkpoint(1));
    }
}
