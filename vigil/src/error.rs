//! Error types and result definitions for listener coordination.
//!
//! Provides an error system with classification and captured diagnostic metadata for
//! operations against the listener store. The [`VigilError`] type carries an error kind,
//! a static description, optional dynamic detail, and the callsite that produced it.

use std::borrow::Cow;
use std::error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for listener operations using [`VigilError`] as the error type.
pub type VigilResult<T> = Result<T, VigilError>;

/// Detailed payload stored for [`VigilError`] instances.
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
}

/// Main error type for listener coordination operations.
///
/// [`VigilError`] pairs a machine-checkable [`ErrorKind`] with human-oriented context.
/// Conflicts are ordinary control flow in this system, so callers are expected to branch
/// on [`VigilError::is_conflict`] rather than treat every error as fatal.
#[derive(Debug, Clone)]
pub struct VigilError {
    payload: ErrorPayload,
}

/// Specific categories of errors that can occur while coordinating listeners.
///
/// Error kinds are organized by failure mode so call sites can decide between the
/// conflict-handling paths and plain propagation.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A compare-and-swap write was rejected because the held revision is stale.
    ListenerConflict,

    // Store access errors
    StoreIo,
    StoreQueryFailed,
    SerializationError,

    // Protocol errors
    InvalidState,
    DirtyRoundsExhausted,

    // Configuration
    ConfigError,

    Unknown,
}

impl VigilError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.payload.kind
    }

    /// Returns `true` when this error is a stale-revision rejection.
    ///
    /// Conflicts drive the fallback and retry paths of the dirty/lock/clean protocol and
    /// must never be swallowed as generic failures.
    pub fn is_conflict(&self) -> bool {
        self.payload.kind == ErrorKind::ListenerConflict
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        self.payload.detail.as_deref()
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.payload.location
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified
    /// instance.
    ///
    /// The stored source is preserved across clones and exposed via [`error::Error::source`].
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.payload.source = Some(Arc::new(source));
        self
    }

    /// Creates a [`VigilError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
    ) -> Self {
        VigilError {
            payload: ErrorPayload {
                kind,
                description,
                detail,
                source: None,
                location: Location::caller(),
            },
        }
    }
}

impl PartialEq for VigilError {
    fn eq(&self, other: &VigilError) -> bool {
        self.payload.kind == other.payload.kind
    }
}

impl Hash for VigilError {
    /// Hashes the error using only its stable identifying components.
    ///
    /// Detail, source, and location are intentionally excluded so errors of the same
    /// category produce the same hash across occurrences.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.payload.kind.hash(state);
        self.payload.description.hash(state);
    }
}

impl fmt::Display for VigilError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let location = self.payload.location;
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            self.payload.kind,
            self.payload.description,
            location.file(),
            location.line(),
            location.column()
        )?;

        if let Some(detail) = &self.payload.detail {
            write!(f, ": {detail}")?;
        }

        Ok(())
    }
}

impl error::Error for VigilError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.payload
            .source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

impl From<(ErrorKind, &'static str)> for VigilError {
    #[track_caller]
    fn from((kind, description): (ErrorKind, &'static str)) -> Self {
        VigilError::from_components(kind, Cow::Borrowed(description), None)
    }
}

impl From<(ErrorKind, &'static str, String)> for VigilError {
    #[track_caller]
    fn from((kind, description, detail): (ErrorKind, &'static str, String)) -> Self {
        VigilError::from_components(kind, Cow::Borrowed(description), Some(Cow::Owned(detail)))
    }
}

impl From<serde_json::Error> for VigilError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        VigilError::from_components(
            ErrorKind::SerializationError,
            Cow::Borrowed("Failed to serialize or deserialize a listener document"),
            Some(Cow::Owned(err.to_string())),
        )
        .with_source(err)
    }
}
