use vigil::listeners::Listeners;
use vigil::store::{ListenerStore, MemoryStore};
use vigil::test_utils::{RecordingStore, StoreMethod};
use vigil::types::{ListenerPatch, ListenerPhase, Seq};
use vigil_telemetry::tracing::init_test_tracing;

async fn setup() -> (MemoryStore, Listeners<MemoryStore>) {
    init_test_tracing();

    let store = MemoryStore::new();
    let listeners = Listeners::new(store.clone());
    listeners.create().await.unwrap();

    (store, listeners)
}

#[tokio::test(flavor = "multi_thread")]
async fn fresh_database_runs_a_full_cycle() {
    let (_, listeners) = setup().await;

    // A database never seen before gets its listener created lazily, already dirty.
    let listener = listeners.dirty_if_clean("shop1").await.unwrap();
    assert!(listener.dirty());
    assert!(listener.last_seq().is_none());
    assert_eq!(listener.phase(), ListenerPhase::DirtyUnlocked);

    let locked = listeners.lock(&listener).await.unwrap();
    assert!(locked.locked_at().is_some());
    assert_eq!(locked.phase(), ListenerPhase::DirtyLocked);

    let cleaned = listeners
        .clean_and_unlock_or_update_last_seq(&locked, Seq::new("42"))
        .await
        .unwrap();
    assert!(!cleaned.dirty());
    assert!(cleaned.locked_at().is_none());
    assert_eq!(cleaned.last_seq(), Some(&Seq::new("42")));
}

#[tokio::test(flavor = "multi_thread")]
async fn dirty_if_clean_writes_once_then_never_again() {
    init_test_tracing();

    let store = RecordingStore::wrap(MemoryStore::new());
    let listeners = Listeners::new(store.clone());
    listeners.create().await.unwrap();

    listeners.dirty_if_clean("shop1").await.unwrap();
    assert_eq!(store.calls(StoreMethod::MergeUpsert).await, 1);
    assert_eq!(store.writes().await, 1);

    // Overlapping watchers report the same database again and again; none of the
    // repeats may touch the store.
    for _ in 0..5 {
        listeners.dirty_if_clean("shop1").await.unwrap();
    }
    assert_eq!(store.writes().await, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn lock_admits_exactly_one_of_two_racers() {
    let (_, listeners) = setup().await;

    let listener = listeners.dirty_if_clean("shop1").await.unwrap();

    // Two workers read the same revision and race to lock it.
    let winner = listeners.lock(&listener).await.unwrap();
    let loser = listeners.lock(&listener).await.unwrap_err();

    assert!(winner.locked_at().is_some());
    assert!(loser.is_conflict());

    // The loser re-reads and finds the lock held, which is its cue to move on.
    let observed = listeners.get("shop1").await.unwrap().unwrap();
    assert_eq!(observed.locked_at(), winner.locked_at());
}

#[tokio::test(flavor = "multi_thread")]
async fn dirty_raised_during_processing_survives_the_clean() {
    let (store, listeners) = setup().await;

    let listener = listeners.dirty_if_clean("shop1").await.unwrap();
    let locked = listeners.lock(&listener).await.unwrap();

    // A watcher that read the document before the lock landed now raises the flag; the
    // merge write lands regardless of the lock and advances the revision.
    store
        .merge_upsert(ListenerPatch::dirty(listener.id().clone()))
        .await
        .unwrap();

    // The worker's clean conflicts and falls back to advancing only the cursor.
    let after = listeners
        .clean_and_unlock_or_update_last_seq(&locked, Seq::new("42"))
        .await
        .unwrap();

    assert!(after.dirty());
    assert_eq!(after.last_seq(), Some(&Seq::new("42")));
    // The fallback leaves the lock field as stored; this worker does not release it.
    assert_eq!(after.locked_at(), locked.locked_at());
}

#[tokio::test(flavor = "multi_thread")]
async fn clean_without_interference_needs_no_fallback() {
    init_test_tracing();

    let store = RecordingStore::wrap(MemoryStore::new());
    let listeners = Listeners::new(store.clone());
    listeners.create().await.unwrap();

    let listener = listeners.dirty_if_clean("shop1").await.unwrap();
    let locked = listeners.lock(&listener).await.unwrap();
    let merges_before = store.calls(StoreMethod::MergeUpsert).await;

    listeners
        .clean_and_unlock_or_update_last_seq(&locked, Seq::new("42"))
        .await
        .unwrap();

    // The common case is a single compare-and-swap; the fallback merge never runs.
    assert_eq!(store.calls(StoreMethod::MergeUpsert).await, merges_before);
}

#[tokio::test(flavor = "multi_thread")]
async fn cursor_only_moves_forward_across_cycles() {
    let (store, listeners) = setup().await;

    for seq in ["10", "20"] {
        let listener = listeners.dirty_if_clean("shop1").await.unwrap();
        let locked = listeners.lock(&listener).await.unwrap();
        listeners
            .clean_and_unlock_or_update_last_seq(&locked, Seq::new(seq))
            .await
            .unwrap();
    }

    let listener = listeners.get("shop1").await.unwrap().unwrap();
    assert_eq!(listener.last_seq(), Some(&Seq::new("20")));

    // The fallback path advances the cursor as well.
    let listener = listeners.dirty_if_clean("shop1").await.unwrap();
    let locked = listeners.lock(&listener).await.unwrap();
    store
        .merge_upsert(ListenerPatch::dirty(listener.id().clone()))
        .await
        .unwrap();
    let after = listeners
        .clean_and_unlock_or_update_last_seq(&locked, Seq::new("30"))
        .await
        .unwrap();
    assert_eq!(after.last_seq(), Some(&Seq::new("30")));
    assert!(after.dirty());
}
