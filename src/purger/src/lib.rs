//! Keyspace purger.
//!
//! Walks an entire Redis-compatible keyspace with `SCAN`, matches each value
//! against a [`MatchCondition`], and either lists or deletes the matches.
//! After a delete run it can keep re-checking the deleted keys until writers
//! stop re-inserting them (see [`reconcile`]).
//!
//! All store calls happen one after another on a single connection, so the
//! key lines and the totals are deterministic for a given keyspace.

pub mod access;
pub mod condition;
pub mod deletion;
pub mod error;
pub mod orchestrator;
pub mod reconcile;
pub mod report;
pub mod scan;
pub mod store;

pub use common::config::AccessMode;
pub use condition::{MatchCondition, Matcher, Predicate};
pub use error::{PurgeError, Result};
pub use orchestrator::{MatchedKey, Orchestrator};
pub use reconcile::{PassReport, ReconciliationLoop, ReconciliationReport, ReconciliationState};
pub use report::{ConsoleReporter, RecordingReporter, Reporter, RunMode, RunSummary};
pub use store::{
    InMemoryStore, KeyValueStore, RedisStore, StoreError, StoredValue, printable_key,
};
