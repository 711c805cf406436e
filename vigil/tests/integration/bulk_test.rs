use futures::future::join_all;
use vigil::error::ErrorKind;
use vigil::listeners::Listeners;
use vigil::store::MemoryStore;
use vigil::test_utils::{RecordingStore, StoreMethod};
use vigil::types::{Listener, Seq};
use vigil_config::shared::CoordinatorConfig;
use vigil_telemetry::tracing::init_test_tracing;

async fn setup() -> (MemoryStore, Listeners<MemoryStore>) {
    init_test_tracing();

    let store = MemoryStore::new();
    let listeners = Listeners::new(store.clone());
    listeners.create().await.unwrap();

    (store, listeners)
}

/// Runs a full dirty/lock/clean cycle so the listener ends up clean and unlocked.
async fn cycled_clean(listeners: &Listeners<MemoryStore>, db_name: &str, seq: &str) -> Listener {
    let listener = listeners.dirty_if_clean(db_name).await.unwrap();
    let locked = listeners.lock(&listener).await.unwrap();
    listeners
        .clean_and_unlock_or_update_last_seq(&locked, Seq::new(seq))
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn bulk_covers_clean_locked_and_missing_listeners() {
    let (_, listeners) = setup().await;

    // "a" is clean after a completed cycle, "b" is being processed right now, "c" has
    // never been seen.
    cycled_clean(&listeners, "a", "10").await;
    let b = listeners.dirty_if_clean("b").await.unwrap();
    let b_locked = listeners.lock(&b).await.unwrap();

    listeners
        .dirty_if_clean_or_locked(["a", "b", "c"])
        .await
        .unwrap();

    let a = listeners.get("a").await.unwrap().unwrap();
    assert!(a.dirty());
    assert_eq!(a.last_seq(), Some(&Seq::new("10")));

    // The in-flight lock is untouched; only the dirty flag (and revision) moved, which
    // is what forces a retry once the current replication finishes.
    let b = listeners.get("b").await.unwrap().unwrap();
    assert!(b.dirty());
    assert_eq!(b.locked_at(), b_locked.locked_at());

    let c = listeners.get("c").await.unwrap().unwrap();
    assert!(c.dirty());
    assert!(c.last_seq().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn bulk_over_already_dirty_listeners_writes_nothing() {
    init_test_tracing();

    let store = RecordingStore::wrap(MemoryStore::new());
    let listeners = Listeners::new(store.clone());
    listeners.create().await.unwrap();

    listeners.dirty_if_clean("a").await.unwrap();
    listeners.dirty_if_clean("b").await.unwrap();
    let writes_before = store.writes().await;

    listeners.dirty_if_clean_or_locked(["a", "b"]).await.unwrap();

    assert_eq!(store.writes().await, writes_before);
    assert_eq!(store.calls(StoreMethod::BulkUpdate).await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn bulk_retries_exactly_the_conflicted_subset() {
    init_test_tracing();

    let store = RecordingStore::wrap(MemoryStore::new());
    let listeners = Listeners::new(store.clone());
    listeners.create().await.unwrap();

    cycled_clean_recording(&listeners, "a").await;
    cycled_clean_recording(&listeners, "b").await;

    // Round one rejects "a" as if another process had advanced it; round two must
    // retry "a" alone and land it.
    store.inject_bulk_conflicts(["a"]).await;

    listeners.dirty_if_clean_or_locked(["a", "b"]).await.unwrap();

    assert!(listeners.get("a").await.unwrap().unwrap().dirty());
    assert!(listeners.get("b").await.unwrap().unwrap().dirty());
    assert_eq!(store.calls(StoreMethod::BulkUpdate).await, 2);
}

async fn cycled_clean_recording(
    listeners: &Listeners<RecordingStore<MemoryStore>>,
    db_name: &str,
) {
    let listener = listeners.dirty_if_clean(db_name).await.unwrap();
    let locked = listeners.lock(&listener).await.unwrap();
    listeners
        .clean_and_unlock_or_update_last_seq(&locked, Seq::new("1"))
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn bulk_round_limit_surfaces_as_an_error() {
    init_test_tracing();

    let store = RecordingStore::wrap(MemoryStore::new());
    let config = CoordinatorConfig {
        max_dirty_rounds: Some(2),
    };
    let listeners = Listeners::with_config(store.clone(), config);
    listeners.create().await.unwrap();

    cycled_clean_recording(&listeners, "a").await;

    // Sustained contention on "a": both permitted rounds conflict.
    store.inject_bulk_conflicts(["a"]).await;
    store.inject_bulk_conflicts(["a"]).await;

    let err = listeners
        .dirty_if_clean_or_locked(["a"])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DirtyRoundsExhausted);
}

#[tokio::test(flavor = "multi_thread")]
async fn bulk_converges_under_concurrent_single_listener_traffic() {
    let (_, listeners) = setup().await;

    // Three groups: clean listeners a worker will try to process, databases no one has
    // seen yet, and listeners mid-processing with the lock already held.
    let clean_names: Vec<String> = (0..4).map(|i| format!("clean_{i}")).collect();
    let fresh_names: Vec<String> = (0..4).map(|i| format!("fresh_{i}")).collect();
    let locked_names: Vec<String> = (0..4).map(|i| format!("locked_{i}")).collect();

    let mut clean_snapshots = Vec::new();
    for name in &clean_names {
        clean_snapshots.push(cycled_clean(&listeners, name, "5").await);
    }

    let mut held_locks = Vec::new();
    for name in &locked_names {
        let listener = listeners.dirty_if_clean(name).await.unwrap();
        held_locks.push(listeners.lock(&listener).await.unwrap());
    }

    let all_names: Vec<String> = clean_names
        .iter()
        .chain(fresh_names.iter())
        .chain(locked_names.iter())
        .cloned()
        .collect();

    let mut tasks = Vec::new();

    // The bulk dirtying pass races every other task below.
    {
        let listeners = listeners.clone();
        let names = all_names.clone();
        tasks.push(tokio::spawn(async move {
            listeners.dirty_if_clean_or_locked(names).await.unwrap();
        }));
    }

    // Workers pick up the clean listeners from their pre-bulk snapshots. Their locks
    // and cleans may or may not land; either way the dirty signal must not be lost.
    for snapshot in clean_snapshots {
        let listeners = listeners.clone();
        tasks.push(tokio::spawn(async move {
            if let Ok(locked) = listeners.lock(&snapshot).await {
                listeners
                    .clean_and_unlock_or_update_last_seq(&locked, Seq::new("6"))
                    .await
                    .unwrap();
            }
        }));
    }

    // Watchers report the fresh databases at the same time as the bulk pass.
    for name in fresh_names.clone() {
        let listeners = listeners.clone();
        tasks.push(tokio::spawn(async move {
            listeners.dirty_if_clean(&name).await.unwrap();
        }));
    }

    // The in-flight workers finish and clean from their held locks.
    for locked in held_locks {
        let listeners = listeners.clone();
        tasks.push(tokio::spawn(async move {
            listeners
                .clean_and_unlock_or_update_last_seq(&locked, Seq::new("7"))
                .await
                .unwrap();
        }));
    }

    join_all(tasks).await.into_iter().for_each(|r| r.unwrap());

    for name in &all_names {
        let listener = listeners.get(name).await.unwrap().unwrap();
        assert!(listener.dirty(), "{name} lost its dirty signal");
    }
}
