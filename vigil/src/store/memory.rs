//! In-memory listener store.
//!
//! [`MemoryStore`] implements the full [`ListenerStore`] contract, including revision
//! tokens and per-item bulk outcomes, which makes it the executable model of the store's
//! optimistic-concurrency semantics. It is used by tests and development setups; all data
//! is lost on process restart.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{ErrorKind, VigilResult};
use crate::store::base::{BulkOutcome, ListenerIndex, ListenerStore};
use crate::types::{Listener, ListenerId, ListenerPatch, Revision};
use crate::vigil_error;

/// Inner state of [`MemoryStore`].
#[derive(Debug)]
struct Inner {
    /// Listener documents as stored, keyed by id.
    listeners: BTreeMap<ListenerId, Listener>,
    /// Per-document write counters, used as the generation half of revision tokens.
    revision_counters: HashMap<ListenerId, u64>,
    /// Whether the materialized views have been installed.
    indexes_installed: bool,
}

impl Inner {
    /// Produces the next revision token for a document.
    ///
    /// Tokens are `{generation}-{random}`; the random half distinguishes writes even if a
    /// counter were ever reused, and keeps the token opaque to callers.
    fn next_revision(&mut self, id: &ListenerId) -> Revision {
        let counter = self.revision_counters.entry(id.clone()).or_insert(0);
        *counter += 1;
        Revision::new(format!("{}-{}", counter, Uuid::new_v4().simple()))
    }

    fn index_rows(&self, index: ListenerIndex, keys: &[String]) -> Vec<Listener> {
        self.listeners
            .values()
            .filter(|listener| match index {
                ListenerIndex::ByDbName => true,
                ListenerIndex::CleanOrLockedByDbName => {
                    !listener.dirty() || listener.locked_at().is_some()
                }
                ListenerIndex::Dirty => listener.dirty(),
            })
            .filter(|listener| {
                if keys.is_empty() {
                    return true;
                }

                match index {
                    ListenerIndex::ByDbName | ListenerIndex::CleanOrLockedByDbName => {
                        keys.iter().any(|key| key == listener.db_name())
                    }
                    ListenerIndex::Dirty => keys.iter().any(|key| key == listener.id().as_str()),
                }
            })
            .cloned()
            .collect()
    }
}

/// In-memory storage for listener documents.
///
/// All writes go through a single [`Mutex`], which gives each store call the same
/// per-document atomicity a real document store provides. Index queries are evaluated on
/// demand over the document map, so the views never lag behind writes.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Creates a new empty memory store. Indexes start uninstalled, mirroring a fresh
    /// store database.
    pub fn new() -> Self {
        let inner = Inner {
            listeners: BTreeMap::new(),
            revision_counters: HashMap::new(),
            indexes_installed: false,
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenerStore for MemoryStore {
    async fn get_listener(&self, id: &ListenerId) -> VigilResult<Option<Listener>> {
        let inner = self.inner.lock().await;

        Ok(inner.listeners.get(id).cloned())
    }

    async fn merge_upsert(&self, patch: ListenerPatch) -> VigilResult<Listener> {
        let mut inner = self.inner.lock().await;

        let current = inner.listeners.get(patch.id()).cloned();
        let merged = match current {
            Some(current) => {
                // db_name is immutable after creation; a create patch racing an existing
                // document converges on the stored name.
                let dirty = patch.dirty_field().unwrap_or(current.dirty());
                let last_seq = patch
                    .last_seq_field()
                    .cloned()
                    .or_else(|| current.last_seq().cloned());

                let revision = inner.next_revision(patch.id());
                Listener::from_parts(
                    current.id().clone(),
                    current.db_name().to_string(),
                    dirty,
                    current.locked_at(),
                    last_seq,
                    revision,
                )
            }
            None => {
                let Some(db_name) = patch.db_name_field() else {
                    return Err(vigil_error!(
                        ErrorKind::InvalidState,
                        "Cannot create a listener from a patch without a database name",
                        patch.id()
                    ));
                };

                let revision = inner.next_revision(patch.id());
                Listener::from_parts(
                    patch.id().clone(),
                    db_name.to_string(),
                    patch.dirty_field().unwrap_or(false),
                    None,
                    patch.last_seq_field().cloned(),
                    revision,
                )
            }
        };

        inner.listeners.insert(merged.id().clone(), merged.clone());

        Ok(merged)
    }

    async fn update(&self, listener: &Listener) -> VigilResult<Listener> {
        let mut inner = self.inner.lock().await;

        match inner.listeners.get(listener.id()) {
            Some(current) if current.revision() == listener.revision() => {}
            _ => {
                // A missing document counts as changed-since-read as well.
                return Err(vigil_error!(
                    ErrorKind::ListenerConflict,
                    "Stale revision on listener update",
                    listener.id()
                ));
            }
        }

        let revision = inner.next_revision(listener.id());
        let stored = Listener::from_parts(
            listener.id().clone(),
            listener.db_name().to_string(),
            listener.dirty(),
            listener.locked_at(),
            listener.last_seq().cloned(),
            revision,
        );
        inner.listeners.insert(stored.id().clone(), stored.clone());

        Ok(stored)
    }

    async fn bulk_update(&self, listeners: Vec<Listener>) -> VigilResult<Vec<BulkOutcome>> {
        let mut inner = self.inner.lock().await;

        let mut outcomes = Vec::with_capacity(listeners.len());
        for listener in listeners {
            let matches = matches!(
                inner.listeners.get(listener.id()),
                Some(current) if current.revision() == listener.revision()
            );
            if !matches {
                outcomes.push(BulkOutcome::Conflicted {
                    db_name: listener.db_name().to_string(),
                });
                continue;
            }

            let revision = inner.next_revision(listener.id());
            let stored = Listener::from_parts(
                listener.id().clone(),
                listener.db_name().to_string(),
                listener.dirty(),
                listener.locked_at(),
                listener.last_seq().cloned(),
                revision,
            );
            inner.listeners.insert(stored.id().clone(), stored.clone());
            outcomes.push(BulkOutcome::Updated(stored));
        }

        Ok(outcomes)
    }

    async fn query_index(
        &self,
        index: ListenerIndex,
        keys: &[String],
    ) -> VigilResult<Vec<Listener>> {
        let inner = self.inner.lock().await;

        if !inner.indexes_installed {
            return Err(vigil_error!(
                ErrorKind::StoreQueryFailed,
                "Listener indexes have not been installed",
                index.name()
            ));
        }

        Ok(inner.index_rows(index, keys))
    }

    async fn create_indexes(&self) -> VigilResult<()> {
        let mut inner = self.inner.lock().await;
        inner.indexes_installed = true;

        Ok(())
    }

    async fn destroy_indexes(&self) -> VigilResult<()> {
        let mut inner = self.inner.lock().await;
        inner.indexes_installed = false;

        Ok(())
    }
}
