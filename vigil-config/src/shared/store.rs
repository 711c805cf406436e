use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Connection configuration for the document store holding listener documents.
///
/// This intentionally does not implement [`Serialize`] to avoid accidentally leaking the
/// password into serialized forms.
#[derive(Clone, Debug, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the document store.
    pub url: String,
    /// Name of the database holding the listener documents.
    pub database: String,
    /// Username for authenticated stores.
    pub username: Option<String>,
    /// Password for authenticated stores.
    pub password: Option<SecretString>,
}

impl StoreConfig {
    /// Validates store connection settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingStoreUrl);
        }

        if self.database.is_empty() {
            return Err(ValidationError::MissingStoreDatabase);
        }

        Ok(())
    }
}

/// Same as [`StoreConfig`] but without secrets, safe to serialize for logs and
/// diagnostics endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfigWithoutSecrets {
    /// Base URL of the document store.
    pub url: String,
    /// Name of the database holding the listener documents.
    pub database: String,
    /// Username for authenticated stores.
    pub username: Option<String>,
}

impl From<StoreConfig> for StoreConfigWithoutSecrets {
    fn from(value: StoreConfig) -> Self {
        StoreConfigWithoutSecrets {
            url: value.url,
            database: value.database,
            username: value.username,
        }
    }
}
