//! The listener document and its associated value types.
//!
//! A listener is the durable per-database record through which watchers and workers
//! coordinate: watchers raise the `dirty` flag, workers take the `locked_at` lock, process,
//! and advance the `last_seq` cursor. All cross-process communication happens through this
//! document; processes share no memory.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Namespace prefix for listener document ids.
///
/// Database names that are reserved by the store itself (for example names starting with
/// an underscore) would otherwise be unusable as document ids.
const LISTENER_ID_PREFIX: &str = "listener:";

/// Unique identifier of a listener document, derived deterministically from the database
/// name it tracks.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenerId(String);

impl ListenerId {
    /// Derives the listener id for a database name.
    ///
    /// The derivation is stable, so every process addressing the same database addresses
    /// the same document. Combined with upsert-by-id this enforces the one-listener-per-db
    /// invariant without any registration step.
    pub fn for_db_name(db_name: &str) -> Self {
        Self(format!("{LISTENER_ID_PREFIX}{db_name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque optimistic-concurrency token assigned by the store on every successful write.
///
/// A caller must present the revision it last read for a compare-and-swap update to
/// succeed; the token's contents carry no meaning beyond equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque change-feed position.
///
/// Sequence tokens are ordered by the change feed that produced them, not by their
/// textual value, so this type intentionally offers no comparison beyond equality. The
/// protocol keeps the stored cursor monotonic by only ever writing positions the worker
/// has fully processed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Seq(String);

impl Seq {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Seq {
    fn from(token: &str) -> Self {
        Seq::new(token)
    }
}

/// Display-oriented classification of a listener's dirty/lock state.
///
/// Never stored; derived on demand from the flags of a [`Listener`]. `CleanLocked` is
/// only observable transiently, between a worker locking a clean listener and its clean
/// transition committing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerPhase {
    CleanUnlocked,
    CleanLocked,
    DirtyUnlocked,
    DirtyLocked,
}

impl fmt::Display for ListenerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerPhase::CleanUnlocked => f.write_str("clean"),
            ListenerPhase::CleanLocked => f.write_str("clean (locked)"),
            ListenerPhase::DirtyUnlocked => f.write_str("dirty"),
            ListenerPhase::DirtyLocked => f.write_str("dirty (locked)"),
        }
    }
}

/// Durable per-database coordination record.
///
/// Instances always represent a document as stored, revision included. New documents are
/// created through [`ListenerPatch`] merge-upserts, never by building a [`Listener`] by
/// hand on the write path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listener {
    id: ListenerId,
    db_name: String,
    #[serde(default)]
    dirty: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    locked_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_seq: Option<Seq>,
    revision: Revision,
}

impl Listener {
    /// Reassembles a stored listener from its fields.
    ///
    /// Intended for [`ListenerStore`](crate::store::ListenerStore) implementations mapping
    /// their wire format back into the typed record.
    pub fn from_parts(
        id: ListenerId,
        db_name: String,
        dirty: bool,
        locked_at: Option<DateTime<Utc>>,
        last_seq: Option<Seq>,
        revision: Revision,
    ) -> Self {
        Self {
            id,
            db_name,
            dirty,
            locked_at,
            last_seq,
            revision,
        }
    }

    pub fn id(&self) -> &ListenerId {
        &self.id
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    pub fn dirty(&self) -> bool {
        self.dirty
    }

    pub fn locked_at(&self) -> Option<DateTime<Utc>> {
        self.locked_at
    }

    pub fn last_seq(&self) -> Option<&Seq> {
        self.last_seq.as_ref()
    }

    pub fn revision(&self) -> &Revision {
        &self.revision
    }

    /// Classifies the listener's current dirty/lock state.
    pub fn phase(&self) -> ListenerPhase {
        match (self.dirty, self.locked_at.is_some()) {
            (false, false) => ListenerPhase::CleanUnlocked,
            (false, true) => ListenerPhase::CleanLocked,
            (true, false) => ListenerPhase::DirtyUnlocked,
            (true, true) => ListenerPhase::DirtyLocked,
        }
    }

    /// Returns a copy carrying the lock timestamp, for a compare-and-swap attempt.
    pub(crate) fn with_lock(&self, locked_at: DateTime<Utc>) -> Self {
        let mut locked = self.clone();
        locked.locked_at = Some(locked_at);
        locked
    }

    /// Returns a copy cleaned and unlocked with the cursor advanced, for a
    /// compare-and-swap attempt.
    pub(crate) fn with_clean_and_seq(&self, last_seq: Seq) -> Self {
        let mut cleaned = self.clone();
        cleaned.dirty = false;
        cleaned.locked_at = None;
        cleaned.last_seq = Some(last_seq);
        cleaned
    }

    /// Returns a copy with the dirty flag raised, for a bulk compare-and-swap attempt.
    pub(crate) fn with_dirty(&self) -> Self {
        let mut dirtied = self.clone();
        dirtied.dirty = true;
        dirtied
    }
}

/// Merge-upsert payload: the fields a single unconditional write may touch.
///
/// A patch carries no revision and no lock field. Revisions are absent because merge
/// writes must land regardless of concurrent revision churn; `locked_at` is absent
/// because lock transitions are the one place where exclusivity matters and they must go
/// through compare-and-swap instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerPatch {
    id: ListenerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    db_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dirty: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_seq: Option<Seq>,
}

impl ListenerPatch {
    /// Patch that creates a listener for `db_name` with the dirty flag already raised.
    pub fn create_dirty(db_name: &str) -> Self {
        Self {
            id: ListenerId::for_db_name(db_name),
            db_name: Some(db_name.to_string()),
            dirty: Some(true),
            last_seq: None,
        }
    }

    /// Patch that raises the dirty flag on an existing listener.
    pub fn dirty(id: ListenerId) -> Self {
        Self {
            id,
            db_name: None,
            dirty: Some(true),
            last_seq: None,
        }
    }

    /// Patch that advances only the cursor, leaving dirty and lock state as stored.
    pub fn last_seq(id: ListenerId, last_seq: Seq) -> Self {
        Self {
            id,
            db_name: None,
            dirty: None,
            last_seq: Some(last_seq),
        }
    }

    pub fn id(&self) -> &ListenerId {
        &self.id
    }

    pub fn db_name_field(&self) -> Option<&str> {
        self.db_name.as_deref()
    }

    pub fn dirty_field(&self) -> Option<bool> {
        self.dirty
    }

    pub fn last_seq_field(&self) -> Option<&Seq> {
        self.last_seq.as_ref()
    }
}
