//! 生命周期守护进程集成测试（SQLite 存储）

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use gastown::lifecycle::{DaemonConfig, Execution, Outcome, SkipReason};
    use gastown::{LifecycleAction, LifecycleDaemon};
    use gastown::session::{RecordingSessions, SessionCall};
    use gastown::store::{Checkpoint, Message, MessageStore, SqliteMessageStore};

    fn config() -> DaemonConfig {
        DaemonConfig {
            restart_delay: Duration::ZERO,
            poll_interval: Duration::from_millis(10),
            ..DaemonConfig::default()
        }
    }

    async fn post(store: &SqliteMessageStore, from: &str, subject: &str) -> Message {
        store.append_message(Message::new(from, subject)).await.unwrap()
    }

    #[tokio::test]
    async fn test_daemon_end_to_end_over_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join(".beads/beads.db");
        let store = Arc::new(SqliteMessageStore::open(&db).unwrap());
        let sessions = Arc::new(RecordingSessions::with_running(["gt-mayor", "gt-gastown-witness"]));

        post(&store, "mayor", "Status update: all quiet").await;
        post(&store, "mayor", "LIFECYCLE: mayor requesting cycle").await;
        post(&store, "gastown/witness", "LIFECYCLE: gastown-witness requesting shutdown").await;
        post(&store, "x", "LIFECYCLE: gastown/toast requesting restart").await;

        let mut daemon = LifecycleDaemon::new(store.clone(), sessions.clone(), config());
        let report = daemon.poll_once().await.unwrap();

        assert_eq!(report.outcomes.len(), 4);
        assert_eq!(report.executed(), 2);
        assert_eq!(report.skipped(), 2);
        assert_eq!(report.outcomes[0].outcome, Outcome::Skipped(SkipReason::NotLifecycle));
        assert_eq!(
            report.outcomes[1].outcome,
            Outcome::Executed(Execution {
                action: LifecycleAction::Cycle,
                requester: "mayor".to_string(),
                session: "gt-mayor".to_string(),
                was_running: true,
            })
        );
        assert_eq!(
            sessions.control_calls().await,
            vec![
                SessionCall::Stop("gt-mayor".to_string()),
                SessionCall::Start("gt-mayor".to_string()),
                SessionCall::Stop("gt-gastown-witness".to_string()),
            ]
        );
        assert!(sessions.is_running("gt-mayor").await);
        assert!(!sessions.is_running("gt-gastown-witness").await);
        assert_eq!(store.load_checkpoint("lifecycle-daemon").await.unwrap(), Checkpoint(4));
    }

    #[tokio::test]
    async fn test_restarted_daemon_resumes_without_replaying() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("beads.db");
        let sessions = Arc::new(RecordingSessions::new());

        {
            let store = Arc::new(SqliteMessageStore::open(&db).unwrap());
            post(&store, "mayor", "LIFECYCLE: mayor requesting restart").await;
            let mut daemon = LifecycleDaemon::new(store, sessions.clone(), config());
            daemon.poll_once().await.unwrap();
        }

        // 重新打开同一数据库，模拟进程重启
        let store = Arc::new(SqliteMessageStore::open(&db).unwrap());
        post(&store, "x", "LIFECYCLE: gastown-witness requesting cycle").await;

        let mut daemon = LifecycleDaemon::new(store.clone(), sessions.clone(), config());
        assert_eq!(daemon.restore_checkpoint().await.unwrap(), Checkpoint(1));
        let report = daemon.poll_once().await.unwrap();
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.executed(), 1);

        // checkpoint 丢失时，已处理标记仍然阻止重复执行
        let mut replay = LifecycleDaemon::new(store, sessions.clone(), config());
        let report = replay.poll_once().await.unwrap();
        assert_eq!(report.executed(), 0);
        assert!(report
            .outcomes
            .iter()
            .all(|o| o.outcome == Outcome::Skipped(SkipReason::AlreadyProcessed)));

        assert_eq!(
            sessions.control_calls().await,
            vec![
                SessionCall::Start("gt-mayor".to_string()),
                SessionCall::Start("gt-gastown-witness".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_acknowledgements_land_in_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteMessageStore::open(dir.path().join("beads.db")).unwrap());
        let sessions = Arc::new(RecordingSessions::new());
        sessions.fail_for("gt-mayor").await;

        let request = post(&store, "mayor", "LIFECYCLE: mayor requesting cycle").await;
        let mut daemon = LifecycleDaemon::new(
            store.clone(),
            sessions,
            DaemonConfig {
                ack_requests: true,
                ..config()
            },
        );
        let report = daemon.poll_once().await.unwrap();
        assert_eq!(report.failed(), 1);

        let acks = store.list_messages(Checkpoint(request.seq), 10).await.unwrap();
        assert_eq!(acks.len(), 1);
        assert!(acks[0].subject.starts_with("LIFECYCLE-ACK: gt-mayor failed"));
        assert_eq!(acks[0].to.as_deref(), Some("mayor"));
        assert_eq!(acks[0].from, "daemon");
    }
}
