//! Store protocol surface the purger needs: cursor enumeration, two flavors
//! of value read, delete, exists and an approximate key count.

use async_trait::async_trait;
use std::borrow::Cow;
use thiserror::Error;

pub mod memory;
pub mod redis;

pub use memory::{InMemoryStore, StoredValue};
pub use self::redis::RedisStore;

/// Error types that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis: {0}")]
    Redis(#[source] ::redis::RedisError),

    #[error("WRONGTYPE operation against key {0:?} holding the wrong kind of value")]
    WrongType(String),

    #[error("key {0:?} not found")]
    NotFound(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl From<::redis::RedisError> for StoreError {
    /// Connection loss, refusal, timeouts and socket errors mean the store
    /// itself is unreachable. Anything else is a command-level failure.
    fn from(err: ::redis::RedisError) -> Self {
        if err.is_timeout()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
            || err.is_io_error()
        {
            Self::Unavailable(err.to_string())
        } else {
            Self::Redis(err)
        }
    }
}

/// Keys are arbitrary bytes. Renders one for output and log lines,
/// replacing invalid UTF-8 sequences with U+FFFD.
pub fn printable_key(key: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(key)
}

/// One page of a cursor-based keyspace traversal.
///
/// A `cursor` of `0` means the traversal is complete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    pub cursor: u64,
    pub keys: Vec<Vec<u8>>,
}

/// Trait implemented by every key-value backend the purger can run against.
///
/// Keys are passed as raw bytes; they need not be valid UTF-8.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the page of keys starting at `cursor`. `count` is a hint.
    async fn scan(&self, cursor: u64, count: usize) -> StoreResult<ScanPage>;

    /// Read a flat value. `None` if the key does not exist.
    async fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Read a field/value mapping in the order the store returns it. A missing
    /// key reads as an empty mapping.
    async fn hash_fields(&self, key: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Delete a key. Returns whether anything was removed; deleting an
    /// absent key is not an error.
    async fn delete(&self, key: &[u8]) -> StoreResult<bool>;

    async fn exists(&self, key: &[u8]) -> StoreResult<bool>;

    /// Approximate number of keys, possibly stale.
    async fn key_count(&self) -> StoreResult<u64>;

    /// Short human-readable identification used in log lines.
    fn describe(&self) -> String;
}
