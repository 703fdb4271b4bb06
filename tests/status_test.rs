//! 状态汇总集成测试（临时 town 目录）

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    use gastown::session::RecordingSessions;
    use gastown::status::{render_status, RenderOptions, StatusAggregator, StatusSummary};
    use gastown::store::{open_read_only_or_empty, Bead, BeadKind, MessageStore, SqliteMessageStore};
    use gastown::town::{find_town_root, load_town_config_or_default, FsRigDiscovery};

    fn aggregator(root: &Path, store: Arc<dyn MessageStore>, sessions: RecordingSessions) -> StatusAggregator {
        StatusAggregator::new(store, Arc::new(sessions), Arc::new(FsRigDiscovery::from_root(root)))
    }

    #[tokio::test]
    async fn test_missing_town_config_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("quiet-town");
        fs::create_dir_all(&root).unwrap();

        let store = Arc::new(SqliteMessageStore::open_in_memory().unwrap());
        let town = load_town_config_or_default(&root);
        let status = aggregator(&root, store, RecordingSessions::new())
            .collect(&town, &root)
            .await
            .unwrap();

        assert_eq!(status.name, "quiet-town");
        assert!(status.rigs.is_empty());
        assert_eq!(status.summary, StatusSummary::default());
        assert_eq!(status.agents.len(), 2);
        assert!(status.agents.iter().all(|a| !a.running && !a.has_work));

        let text = render_status(&status, RenderOptions::text(false)).unwrap();
        assert!(text.starts_with("Town: quiet-town\n"));
        assert!(text.contains("No rigs registered."));
    }

    #[tokio::test]
    async fn test_status_without_database_leaves_town_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("quiet-town");
        fs::create_dir_all(root.join("mayor")).unwrap();
        fs::create_dir_all(root.join("gastown/witness")).unwrap();
        fs::write(root.join("mayor/rigs.json"), r#"{"rigs": {"gastown": {}}}"#).unwrap();

        let nested = root.join("gastown/witness");
        let found = find_town_root(&nested).unwrap();
        assert_eq!(found, root);

        let db = found.join(".beads/beads.db");
        let store = open_read_only_or_empty(&db);
        let sessions = RecordingSessions::with_running(["gt-mayor", "gt-gastown-witness"]);
        let town = load_town_config_or_default(&found);
        let status = aggregator(&found, store, sessions).collect(&town, &found).await.unwrap();

        assert_eq!(status.name, "quiet-town");
        assert_eq!(status.summary.witness_count, 1);
        assert_eq!(status.summary.active_hooks, 0);
        assert!(status.agents.iter().any(|a| a.name == "mayor" && a.running));
        assert!(status.rigs[0].agents.iter().all(|a| a.running && !a.has_work));
        assert!(!found.join(".beads").exists());

        let text = render_status(&status, RenderOptions::text(false)).unwrap();
        assert!(text.starts_with("Town: quiet-town\n"));
    }

    #[tokio::test]
    async fn test_full_town_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("mayor")).unwrap();
        fs::write(root.join("mayor/town.json"), r#"{"name": "alpha"}"#).unwrap();
        fs::write(root.join("mayor/rigs.json"), r#"{"rigs": {"gastown": {}}}"#).unwrap();
        for dir in ["witness", "refinery", "polecats/toast", "crew/max"] {
            fs::create_dir_all(root.join("gastown").join(dir)).unwrap();
        }

        let nested = root.join("gastown/polecats/toast");
        assert_eq!(find_town_root(&nested).unwrap(), root);

        let store = Arc::new(SqliteMessageStore::open(root.join(".beads/beads.db")).unwrap());
        store
            .put_bead(
                Bead::new("gt-crew-gastown-max", BeadKind::Agent, "max")
                    .with_description("hook_bead: gt-41\nagent_state: working"),
            )
            .await
            .unwrap();
        store
            .put_bead(Bead::new("gt-41", BeadKind::Task, "Write release notes"))
            .await
            .unwrap();
        store
            .put_bead(
                Bead::new("gt-handoff-7", BeadKind::Handoff, "Continue lexer work")
                    .with_assignee("gastown/toast")
                    .with_description("Left off at token spans."),
            )
            .await
            .unwrap();

        let sessions = RecordingSessions::with_running(["gt-mayor", "gt-gastown-witness", "gt-gastown-toast"]);
        let town = load_town_config_or_default(root);
        let status = aggregator(root, store, sessions).collect(&town, root).await.unwrap();

        assert_eq!(status.name, "alpha");
        assert_eq!(
            status.summary,
            StatusSummary {
                rig_count: 1,
                polecat_count: 1,
                crew_count: 1,
                witness_count: 1,
                refinery_count: 1,
                active_hooks: 1,
            }
        );

        let rig = &status.rigs[0];
        let max = rig.agents.iter().find(|a| a.name == "max").unwrap();
        assert!(max.has_work);
        assert_eq!(max.work_title, "Write release notes");
        assert!(!max.running);

        let text = render_status(&status, RenderOptions::text(false)).unwrap();
        assert!(text.contains("max stopped → Write release notes [working]"));
        assert!(text.contains("toast running → Continue lexer work"));
        assert!(text.contains("🏭 Refinery"));

        let json: serde_json::Value =
            serde_json::from_str(&render_status(&status, RenderOptions::json()).unwrap()).unwrap();
        assert_eq!(json["rigs"][0]["polecats"], serde_json::json!(["toast"]));
        assert_eq!(json["rigs"][0]["agents"][0]["session"], "gt-gastown-witness");
    }
}
