use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use super::{KeyValueStore, ScanPage, StoreError, StoreResult, printable_key};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredValue {
    Flat(Vec<u8>),
    FieldMap(Vec<(Vec<u8>, Vec<u8>)>),
}

impl StoredValue {
    pub fn flat(value: impl Into<Vec<u8>>) -> Self {
        Self::Flat(value.into())
    }

    pub fn fields<F, V>(fields: impl IntoIterator<Item = (F, V)>) -> Self
    where
        F: Into<Vec<u8>>,
        V: Into<Vec<u8>>,
    {
        Self::FieldMap(
            fields
                .into_iter()
                .map(|(field, value)| (field.into(), value.into()))
                .collect(),
        )
    }
}

/// Ordered in-memory keyspace.
///
/// The scan cursor is a position in key order, so keys inserted or removed
/// between pages may be skipped or seen twice, like a real `SCAN`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<BTreeMap<Vec<u8>, StoredValue>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<K: Into<Vec<u8>>>(
        entries: impl IntoIterator<Item = (K, StoredValue)>,
    ) -> Self {
        Self {
            entries: Mutex::new(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.into(), value))
                    .collect(),
            ),
        }
    }

    pub async fn insert(&self, key: impl Into<Vec<u8>>, value: StoredValue) {
        self.entries.lock().await.insert(key.into(), value);
    }

    pub async fn contains(&self, key: impl AsRef<[u8]>) -> bool {
        self.entries.lock().await.contains_key(key.as_ref())
    }

    pub async fn keys(&self) -> Vec<Vec<u8>> {
        self.entries.lock().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn scan(&self, cursor: u64, count: usize) -> StoreResult<ScanPage> {
        let entries = self.entries.lock().await;
        let start = cursor as usize;
        let keys: Vec<Vec<u8>> = entries
            .keys()
            .skip(start)
            .take(count.max(1))
            .cloned()
            .collect();

        let next = start + keys.len();
        let cursor = if next >= entries.len() { 0 } else { next as u64 };
        Ok(ScanPage { cursor, keys })
    }

    async fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        match self.entries.lock().await.get(key) {
            None => Ok(None),
            Some(StoredValue::Flat(value)) => Ok(Some(value.clone())),
            Some(StoredValue::FieldMap(_)) => Err(StoreError::WrongType(printable_key(key).into_owned())),
        }
    }

    async fn hash_fields(&self, key: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        match self.entries.lock().await.get(key) {
            None => Ok(Vec::new()),
            Some(StoredValue::FieldMap(fields)) => Ok(fields.clone()),
            Some(StoredValue::Flat(_)) => Err(StoreError::WrongType(printable_key(key).into_owned())),
        }
    }

    async fn delete(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.entries.lock().await.remove(key).is_some())
    }

    async fn exists(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.entries.lock().await.contains_key(key))
    }

    async fn key_count(&self) -> StoreResult<u64> {
        Ok(self.entries.lock().await.len() as u64)
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
