use thiserror::Error;

use crate::StoreConfiguration;

/// An error resulting from opening a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The configuration cannot be served, for example because the suite name is invalid.
    #[error("Store configuration not supported: {0:?}")]
    UnsupportedConfiguration(StoreConfiguration),

    /// The suite is already open with a different configuration.
    #[error("Suite {0} is already open with a different configuration")]
    ConfigurationConflict(String),

    /// Reading or writing the suite file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The suite file is not valid JSON.
    #[error("Suite file is corrupt: {0}")]
    Json(#[from] serde_json::Error),
}
