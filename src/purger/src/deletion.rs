use crate::error::{PurgeError, Result};
use crate::store::{KeyValueStore, printable_key};

/// Single-key delete and existence checks with purge error context attached.
#[derive(Clone, Copy)]
pub struct DeletionEngine<'a> {
    store: &'a dyn KeyValueStore,
}

impl<'a> DeletionEngine<'a> {
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self { store }
    }

    /// Delete `key`. Returns whether the key was present.
    ///
    /// Deleting an absent key succeeds; only a failed store call is an error.
    pub async fn delete(&self, key: &[u8]) -> Result<bool> {
        let removed = self
            .store
            .delete(key)
            .await
            .map_err(|source| PurgeError::Delete {
                key: printable_key(key).into_owned(),
                source,
            })?;

        if !removed {
            tracing::debug!(key = %printable_key(key), "Key was already gone at delete time");
        }
        Ok(removed)
    }

    pub async fn exists(&self, key: &[u8]) -> Result<bool> {
        self.store
            .exists(key)
            .await
            .map_err(|source| PurgeError::Exists {
                key: printable_key(key).into_owned(),
                source,
            })
    }
}
