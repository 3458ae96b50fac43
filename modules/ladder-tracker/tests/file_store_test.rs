//! Registry persistence through the real file store.

use std::sync::Arc;
use std::time::Duration;

use ladder_common::{OwnerId, Tag};
use ladder_tracker::extractor::PageExtractor;
use ladder_tracker::store::FileStore;
use ladder_tracker::testing::MockPageSource;
use ladder_tracker::{RegistryStore, Tracker};

fn extractor(html: &str) -> PageExtractor {
    PageExtractor::new(
        Box::new(MockPageSource::with_page(html)),
        "https://leaderboard.test/players",
        Duration::ZERO,
    )
}

#[tokio::test]
async fn points_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let html = r##"<script>[{"tag":"#2PYLQC","name":"X","rank":1}]</script>"##;

    let store: Arc<dyn RegistryStore> = Arc::new(FileStore::new(dir.path()));
    let tracker = Tracker::load(store, extractor(html)).await;
    tracker.link("2PYLQC", OwnerId::from("U1"), "X").await.unwrap();
    tracker.scoring_cycle().await;
    drop(tracker);

    let store: Arc<dyn RegistryStore> = Arc::new(FileStore::new(dir.path()));
    let restarted = Tracker::load(store, extractor(html)).await;
    let tag = Tag::parse("2PYLQC").unwrap();
    assert_eq!(restarted.points(&tag).await, Some(20));
}

#[tokio::test]
async fn backup_is_used_when_primary_is_gone() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());
    let html = r##"<script>[{"tag":"#8QG","name":"B","rank":2}]</script>"##;

    let shared: Arc<dyn RegistryStore> = Arc::new(FileStore::new(dir.path()));
    let tracker = Tracker::load(shared, extractor(html)).await;
    tracker.link("8QG", OwnerId::from("U1"), "B").await.unwrap();
    // Second save copies the first file to the backup.
    tracker.scoring_cycle().await;
    drop(tracker);

    assert!(store.backup_path().exists());
    std::fs::remove_file(store.primary_path()).unwrap();

    let shared: Arc<dyn RegistryStore> = Arc::new(FileStore::new(dir.path()));
    let restarted = Tracker::load(shared, extractor(html)).await;
    let tag = Tag::parse("8QG").unwrap();
    // The backup predates the scoring cycle.
    assert_eq!(restarted.points(&tag).await, Some(0));
    assert_eq!(restarted.all_linked_accounts().await.len(), 1);
}

#[tokio::test]
async fn legacy_file_layout_loads() {
    let dir = tempfile::tempdir().unwrap();
    let legacy = r##"{
        "player_data": {
            "2PY": {"discord_id": 123456789, "points": 34, "name": "Ana"},
            "8QG": {"discord_id": "123456789", "points": 6}
        },
        "user_accounts": {"123456789": ["2PY", "8QG"]}
    }"##;
    std::fs::write(dir.path().join("player_data.json"), legacy).unwrap();

    let store: Arc<dyn RegistryStore> = Arc::new(FileStore::new(dir.path()));
    let tracker = Tracker::load(store, extractor("")).await;

    let accounts = tracker.linked_accounts(&OwnerId::from("123456789")).await;
    assert_eq!(accounts.accounts.len(), 2);
    assert_eq!(accounts.total_points, 40);
}

#[tokio::test]
async fn admin_link_from_another_process_is_scored_and_kept() {
    let dir = tempfile::tempdir().unwrap();
    let html = r##"<script>[{"tag":"#8QG","name":"B","rank":1},{"tag":"#2PY","name":"A","rank":2}]</script>"##;

    let daemon_store: Arc<dyn RegistryStore> = Arc::new(FileStore::new(dir.path()));
    let daemon = Tracker::load(daemon_store, extractor(html)).await;
    daemon.link("2PY", OwnerId::from("U1"), "A").await.unwrap();

    // A separate admin invocation on the same data dir.
    let admin_store: Arc<dyn RegistryStore> = Arc::new(FileStore::new(dir.path()));
    let admin = Tracker::load(admin_store, extractor("")).await;
    admin.link("8QG", OwnerId::from("U2"), "B").await.unwrap();

    let mut deltas: Vec<_> = daemon
        .scoring_cycle()
        .await
        .into_iter()
        .map(|d| (d.tag.as_str().to_string(), d.delta))
        .collect();
    deltas.sort();
    assert_eq!(deltas, vec![("2PY".to_string(), 14), ("8QG".to_string(), 20)]);

    let store = FileStore::new(dir.path());
    let saved = store.load().await;
    assert_eq!(saved.identities[&Tag::parse("8QG").unwrap()].points, 20);
    assert_eq!(saved.identities[&Tag::parse("2PY").unwrap()].points, 14);

    // And the admin side sees the daemon's points.
    assert_eq!(admin.points(&Tag::parse("2PY").unwrap()).await, Some(14));
    let removed = admin.unlink("8QG").await.unwrap();
    assert_eq!(removed.points, 20);
    assert_eq!(daemon.all_linked_accounts().await.len(), 1);
}
