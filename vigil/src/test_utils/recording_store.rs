//! A store wrapper that records calls and injects bulk conflicts.
//!
//! Tests assert write counts (the idempotence properties are phrased as "exactly one
//! write" / "zero writes") and script conflict rounds for the bulk coordinator without
//! needing real concurrent contention.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::VigilResult;
use crate::store::base::{BulkOutcome, ListenerIndex, ListenerStore};
use crate::types::{Listener, ListenerId, ListenerPatch};

/// Store methods a [`RecordingStore`] counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreMethod {
    GetListener,
    MergeUpsert,
    Update,
    BulkUpdate,
    QueryIndex,
}

#[derive(Debug, Default)]
struct Recording {
    calls: HashMap<StoreMethod, usize>,
    /// One entry per upcoming `bulk_update` call; names in the entry are forced to
    /// conflict in that call without touching the underlying store.
    bulk_conflict_plan: Vec<BTreeSet<String>>,
}

/// Delegating [`ListenerStore`] wrapper with per-method call counters and scripted bulk
/// conflicts.
#[derive(Debug, Clone)]
pub struct RecordingStore<S> {
    inner: S,
    recording: Arc<Mutex<Recording>>,
}

impl<S> RecordingStore<S> {
    pub fn wrap(inner: S) -> Self {
        Self {
            inner,
            recording: Arc::new(Mutex::new(Recording::default())),
        }
    }

    /// Number of calls observed for a method.
    pub async fn calls(&self, method: StoreMethod) -> usize {
        let recording = self.recording.lock().await;
        recording.calls.get(&method).copied().unwrap_or(0)
    }

    /// Total number of write calls observed, across merge, update, and bulk update.
    pub async fn writes(&self) -> usize {
        let recording = self.recording.lock().await;
        [
            StoreMethod::MergeUpsert,
            StoreMethod::Update,
            StoreMethod::BulkUpdate,
        ]
        .iter()
        .map(|method| recording.calls.get(method).copied().unwrap_or(0))
        .sum()
    }

    /// Schedules the next `bulk_update` call to reject the given database names, as if
    /// another process had advanced their revisions in between.
    ///
    /// Repeated calls queue further rounds of rejection.
    pub async fn inject_bulk_conflicts<I>(&self, db_names: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut recording = self.recording.lock().await;
        recording
            .bulk_conflict_plan
            .push(db_names.into_iter().map(Into::into).collect());
    }

    async fn record(&self, method: StoreMethod) {
        let mut recording = self.recording.lock().await;
        *recording.calls.entry(method).or_insert(0) += 1;
    }
}

impl<S> ListenerStore for RecordingStore<S>
where
    S: ListenerStore + Sync,
{
    async fn get_listener(&self, id: &ListenerId) -> VigilResult<Option<Listener>> {
        self.record(StoreMethod::GetListener).await;
        self.inner.get_listener(id).await
    }

    async fn merge_upsert(&self, patch: ListenerPatch) -> VigilResult<Listener> {
        self.record(StoreMethod::MergeUpsert).await;
        self.inner.merge_upsert(patch).await
    }

    async fn update(&self, listener: &Listener) -> VigilResult<Listener> {
        self.record(StoreMethod::Update).await;
        self.inner.update(listener).await
    }

    async fn bulk_update(&self, listeners: Vec<Listener>) -> VigilResult<Vec<BulkOutcome>> {
        self.record(StoreMethod::BulkUpdate).await;

        let forced = {
            let mut recording = self.recording.lock().await;
            if recording.bulk_conflict_plan.is_empty() {
                BTreeSet::new()
            } else {
                recording.bulk_conflict_plan.remove(0)
            }
        };

        if forced.is_empty() {
            return self.inner.bulk_update(listeners).await;
        }

        // Outcomes stay positionally aligned with the submitted batch.
        let mut slots: Vec<Option<BulkOutcome>> = Vec::with_capacity(listeners.len());
        let mut passed = Vec::new();
        for listener in listeners {
            if forced.contains(listener.db_name()) {
                slots.push(Some(BulkOutcome::Conflicted {
                    db_name: listener.db_name().to_string(),
                }));
            } else {
                slots.push(None);
                passed.push(listener);
            }
        }

        let mut inner_outcomes = self.inner.bulk_update(passed).await?.into_iter();
        let outcomes = slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    inner_outcomes
                        .next()
                        .expect("inner store returned fewer outcomes than submitted items")
                })
            })
            .collect();

        Ok(outcomes)
    }

    async fn query_index(
        &self,
        index: ListenerIndex,
        keys: &[String],
    ) -> VigilResult<Vec<Listener>> {
        self.record(StoreMethod::QueryIndex).await;
        self.inner.query_index(index, keys).await
    }

    async fn create_indexes(&self) -> VigilResult<()> {
        self.inner.create_indexes().await
    }

    async fn destroy_indexes(&self) -> VigilResult<()> {
        self.inner.destroy_indexes().await
    }
}
