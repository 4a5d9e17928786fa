use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum PurgeError {
    /// Enumeration or connectivity failure. Aborts the run.
    #[error("{operation} failed: {source}")]
    StoreUnavailable {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    /// Reading one key's value failed. The key is skipped.
    #[error("reading {key:?} failed: {source}")]
    Fetch {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("key DELETE failed for {key:?}: {source}")]
    Delete {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("key EXISTS check failed for {key:?}: {source}")]
    Exists {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error(
        "reconciliation did not converge after {passes} passes \
         ({consecutive_clean} consecutive clean)"
    )]
    NotConverged { passes: u64, consecutive_clean: u64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, PurgeError>;
