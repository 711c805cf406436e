use vigil::error::ErrorKind;
use vigil::listeners::Listeners;
use vigil::store::MemoryStore;
use vigil::types::Seq;
use vigil_telemetry::tracing::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn index_lifecycle_is_idempotent() {
    init_test_tracing();

    let listeners = Listeners::new(MemoryStore::new());

    // Installing twice is fine; queries work after either call.
    listeners.create().await.unwrap();
    listeners.create().await.unwrap();
    assert!(listeners.dirty_listeners().await.unwrap().is_empty());

    listeners.destroy().await.unwrap();
    let err = listeners.dirty_listeners().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreQueryFailed);
}

#[tokio::test(flavor = "multi_thread")]
async fn unseen_database_reads_as_absent() {
    init_test_tracing();

    let listeners = Listeners::new(MemoryStore::new());
    listeners.create().await.unwrap();

    assert!(listeners.get("never_seen").await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn dirty_listeners_feed_reflects_protocol_state() {
    init_test_tracing();

    let listeners = Listeners::new(MemoryStore::new());
    listeners.create().await.unwrap();

    listeners.dirty_if_clean("a").await.unwrap();
    listeners.dirty_if_clean("b").await.unwrap();

    let dirty = listeners.dirty_listeners().await.unwrap();
    let mut names: Vec<&str> = dirty.iter().map(|l| l.db_name()).collect();
    names.sort_unstable();
    assert_eq!(names, ["a", "b"]);

    // Processing "a" to completion removes it from the dispatch feed.
    let a = listeners.get("a").await.unwrap().unwrap();
    let locked = listeners.lock(&a).await.unwrap();
    listeners
        .clean_and_unlock_or_update_last_seq(&locked, Seq::new("3"))
        .await
        .unwrap();

    let dirty = listeners.dirty_listeners().await.unwrap();
    assert_eq!(dirty.len(), 1);
    assert_eq!(dirty[0].db_name(), "b");
}
