use crate::error::{PurgeError, Result};
use crate::store::KeyValueStore;

/// Single pass, cursor-driven traversal of the whole keyspace.
///
/// Concurrent writes during the pass may or may not be observed. The scanner
/// cannot be rewound; once the store hands back cursor `0` every further call
/// to [`next_batch`](Self::next_batch) yields `None`.
pub struct KeyspaceScanner<'a> {
    store: &'a dyn KeyValueStore,
    batch_size: usize,
    cursor: u64,
    finished: bool,
    visited: u64,
}

impl<'a> KeyspaceScanner<'a> {
    pub fn new(store: &'a dyn KeyValueStore, batch_size: usize) -> Self {
        Self {
            store,
            batch_size,
            cursor: 0,
            finished: false,
            visited: 0,
        }
    }

    /// Best-effort key count for progress display. Failures read as `0`.
    pub async fn estimate_total(&self) -> u64 {
        match self.store.key_count().await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "Couldn't count keys, progress will be approximate");
                0
            }
        }
    }

    /// Fetch the next batch of keys, or `None` once the traversal is complete.
    ///
    /// A failed store call is fatal and surfaces as
    /// [`PurgeError::StoreUnavailable`].
    pub async fn next_batch(&mut self) -> Result<Option<Vec<Vec<u8>>>> {
        if self.finished {
            return Ok(None);
        }

        let page = self
            .store
            .scan(self.cursor, self.batch_size)
            .await
            .map_err(|source| PurgeError::StoreUnavailable {
                operation: "SCAN",
                source,
            })?;

        tracing::debug!(
            cursor = page.cursor,
            key_count = page.keys.len(),
            "Scanned keyspace page"
        );

        self.cursor = page.cursor;
        self.finished = page.cursor == 0;
        self.visited += page.keys.len() as u64;
        Ok(Some(page.keys))
    }

    /// Number of keys handed out so far.
    pub fn visited(&self) -> u64 {
        self.visited
    }
}
