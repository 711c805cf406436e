//! The listener state machine.
//!
//! [`Listeners`] drives the dirty/lock/clean protocol for a single database's listener
//! document. The protocol uses exactly two kinds of writes and never mixes them up:
//!
//! - **Merge-upsert** where a signal must land no matter what happened concurrently
//!   (raising the dirty flag, advancing the cursor). Losing unrelated concurrent field
//!   changes is acceptable at these points.
//! - **Compare-and-swap** where exclusivity is required (taking the lock, the combined
//!   clean-and-unlock transition). A stale revision is rejected, and that rejection is
//!   the coordination signal between processes.
//!
//! The bulk variant that dirties many databases per round trip lives in [`bulk`].

pub mod bulk;

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use vigil_config::shared::CoordinatorConfig;

use crate::error::VigilResult;
use crate::store::ListenerStore;
use crate::store::base::ListenerIndex;
use crate::types::{Listener, ListenerId, ListenerPatch, Seq};

/// Coordination interface over the listeners of a store.
///
/// Cheap to clone; every clone talks to the same store. Processes on different machines
/// coordinate purely through the store, so there is no in-memory state here beyond
/// configuration.
#[derive(Debug, Clone)]
pub struct Listeners<S> {
    store: S,
    config: Arc<CoordinatorConfig>,
}

impl<S> Listeners<S>
where
    S: ListenerStore,
{
    /// Creates a coordinator with the default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, CoordinatorConfig::default())
    }

    /// Creates a coordinator with an explicit configuration.
    pub fn with_config(store: S, config: CoordinatorConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    /// Idempotently installs the listener indexes.
    pub async fn create(&self) -> VigilResult<()> {
        self.store.create_indexes().await?;
        info!(
            indexes = ?ListenerIndex::all().map(|index| index.name()),
            "listener indexes installed"
        );

        Ok(())
    }

    /// Removes the listener indexes.
    pub async fn destroy(&self) -> VigilResult<()> {
        self.store.destroy_indexes().await?;
        info!("listener indexes removed");

        Ok(())
    }

    /// Reads the listener for a database, if one has been created.
    pub async fn get(&self, db_name: &str) -> VigilResult<Option<Listener>> {
        self.store.get_listener(&ListenerId::for_db_name(db_name)).await
    }

    /// Returns every listener whose dirty flag is raised.
    ///
    /// This is the feed for the worker-dispatch loop; the coordination protocol itself
    /// never reads it.
    pub async fn dirty_listeners(&self) -> VigilResult<Vec<Listener>> {
        self.store.query_index(ListenerIndex::Dirty, &[]).await
    }

    /// Marks a database as needing replication, creating its listener on first
    /// reference.
    ///
    /// Already-dirty listeners are left untouched with zero writes; watchers observe
    /// overlapping change feeds, so concurrent calls for the same database are the norm
    /// rather than the exception.
    ///
    /// The write is a merge-upsert of the dirty flag alone. Even if the document was
    /// locked or cleaned between our read and this write, the flag still lands; the worst
    /// case is one redundant reprocessing, never a dropped signal.
    pub async fn dirty_if_clean(&self, db_name: &str) -> VigilResult<Listener> {
        let id = ListenerId::for_db_name(db_name);

        match self.store.get_listener(&id).await? {
            Some(listener) if listener.dirty() => {
                debug!(db_name, "listener already dirty, skipping write");
                Ok(listener)
            }
            Some(_) => self.store.merge_upsert(ListenerPatch::dirty(id)).await,
            None => {
                self.store
                    .merge_upsert(ListenerPatch::create_dirty(db_name))
                    .await
            }
        }
    }

    /// Attempts to take the processing lock on a previously-read listener.
    ///
    /// The write is a compare-and-swap keyed on the listener's held revision; if any
    /// write landed since that read, the attempt fails with
    /// [`ErrorKind::ListenerConflict`](crate::error::ErrorKind::ListenerConflict) and the
    /// caller must re-read before deciding anything. When two workers race from the same
    /// revision, exactly one gets the lock.
    ///
    /// On success returns the locked listener carrying its new revision.
    pub async fn lock(&self, listener: &Listener) -> VigilResult<Listener> {
        let locked = listener.with_lock(Utc::now());

        self.store.update(&locked).await
    }

    /// Ends a processing run: clean, unlock, and advance the cursor, or fall back to
    /// advancing the cursor alone.
    ///
    /// The primary write is a compare-and-swap on the revision held since before
    /// processing started, setting `dirty = false`, clearing `locked_at`, and recording
    /// `last_seq`. A conflict means the document changed while processing was underway,
    /// almost always because a watcher raised a fresh dirty signal. That signal must
    /// survive this worker's cleanup, so the fallback merges only `last_seq` and leaves
    /// dirty and lock state exactly as currently stored. The fallback does not release
    /// the lock field either; whoever next reads the document sees the stored state.
    ///
    /// Non-conflict errors propagate untouched.
    pub async fn clean_and_unlock_or_update_last_seq(
        &self,
        listener: &Listener,
        last_seq: Seq,
    ) -> VigilResult<Listener> {
        let cleaned = listener.with_clean_and_seq(last_seq.clone());

        match self.store.update(&cleaned).await {
            Ok(stored) => Ok(stored),
            Err(err) if err.is_conflict() => {
                debug!(
                    db_name = listener.db_name(),
                    "clean conflicted, advancing cursor only"
                );

                self.store
                    .merge_upsert(ListenerPatch::last_seq(listener.id().clone(), last_seq))
                    .await
            }
            Err(err) => Err(err),
        }
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    pub(crate) fn config(&self) -> &CoordinatorConfig {
        &self.config
    }
}
