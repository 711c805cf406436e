//! The listener store contract.
//!
//! Everything the coordination protocol needs from persistence is captured here: a point
//! read, an unconditional merge write, two compare-and-swap writes (single and bulk), and
//! index queries over three materialized views. The store is the only shared resource
//! between processes, and per-document compare-and-swap is the only synchronization
//! primitive.

use std::future::Future;

use crate::error::VigilResult;
use crate::types::{Listener, ListenerId, ListenerPatch};

/// The secondary indexes maintained over listener documents.
///
/// Indexes are materialized views; [`ListenerStore::create_indexes`] installs them and
/// they stay in lockstep with document writes from then on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerIndex {
    /// Every listener, keyed by database name.
    ByDbName,
    /// Listeners that are not dirty or are locked, keyed by database name.
    ///
    /// This is the bulk-dirtying candidate set: clean listeners need the flag raised, and
    /// locked listeners need it raised again so the in-flight replication is retried once
    /// it completes.
    CleanOrLockedByDbName,
    /// Listeners with the dirty flag raised, keyed by listener id. Consumed by the
    /// worker-dispatch loop, not by the coordination protocol itself.
    Dirty,
}

impl ListenerIndex {
    /// Name of the index as known to the store.
    pub fn name(&self) -> &'static str {
        match self {
            ListenerIndex::ByDbName => "listeners_by_db_name",
            ListenerIndex::CleanOrLockedByDbName => "clean_or_locked_listeners_by_db_name",
            ListenerIndex::Dirty => "dirty_listeners",
        }
    }

    /// All indexes, in installation order.
    pub fn all() -> [ListenerIndex; 3] {
        [
            ListenerIndex::Dirty,
            ListenerIndex::CleanOrLockedByDbName,
            ListenerIndex::ByDbName,
        ]
    }
}

/// Per-document outcome of a [`ListenerStore::bulk_update`] call.
///
/// Bulk writes succeed and fail per item; a single stale revision never fails the batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOutcome {
    /// The compare-and-swap committed; carries the stored listener with its new revision.
    Updated(Listener),
    /// The compare-and-swap was rejected because the document's revision moved since it
    /// was read.
    Conflicted {
        /// Database name of the listener whose write was rejected, for retry narrowing.
        db_name: String,
    },
}

/// Persistence contract consumed by the listener state machine and the bulk coordinator.
///
/// Implementations must make each method atomic with respect to concurrent calls on the
/// same document, and must reject [`update`](ListenerStore::update) and
/// [`bulk_update`](ListenerStore::bulk_update) writes whose revision is stale with
/// [`ErrorKind::ListenerConflict`](crate::error::ErrorKind::ListenerConflict) (or the
/// equivalent [`BulkOutcome::Conflicted`] item). Nothing else about ordering is assumed.
pub trait ListenerStore {
    /// Reads a listener by id. Absence is not an error; it means "not yet created".
    fn get_listener(
        &self,
        id: &ListenerId,
    ) -> impl Future<Output = VigilResult<Option<Listener>>> + Send;

    /// Creates the document if absent, otherwise merges exactly the patch's fields into
    /// the current document, ignoring unrelated concurrent field drift.
    ///
    /// Never conflicts. This is the write used where losing unrelated concurrent changes
    /// is acceptable (dirty flag, cursor) and is forbidden where exclusivity is required
    /// (lock acquisition).
    fn merge_upsert(
        &self,
        patch: ListenerPatch,
    ) -> impl Future<Output = VigilResult<Listener>> + Send;

    /// Full compare-and-swap update keyed on the listener's held revision.
    ///
    /// Fails with [`ErrorKind::ListenerConflict`](crate::error::ErrorKind::ListenerConflict)
    /// if the document changed since that revision was read. On success returns the stored
    /// listener carrying its new revision.
    fn update(&self, listener: &Listener) -> impl Future<Output = VigilResult<Listener>> + Send;

    /// Compare-and-swap over a batch of listeners, with per-item outcomes.
    fn bulk_update(
        &self,
        listeners: Vec<Listener>,
    ) -> impl Future<Output = VigilResult<Vec<BulkOutcome>>> + Send;

    /// Queries an index. `keys` narrows the result to matching index keys; an empty slice
    /// returns every row.
    fn query_index(
        &self,
        index: ListenerIndex,
        keys: &[String],
    ) -> impl Future<Output = VigilResult<Vec<Listener>>> + Send;

    /// Idempotently installs all listener indexes.
    fn create_indexes(&self) -> impl Future<Output = VigilResult<()>> + Send;

    /// Removes all listener indexes.
    fn destroy_indexes(&self) -> impl Future<Output = VigilResult<()>> + Send;
}
