use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The bulk-dirtying round limit, when set, cannot be zero.
    #[error("`max_dirty_rounds` cannot be zero when set")]
    MaxDirtyRoundsZero,
    /// The store URL is required.
    #[error("`store.url` must not be empty")]
    MissingStoreUrl,
    /// The store database name is required.
    #[error("`store.database` must not be empty")]
    MissingStoreDatabase,
}
