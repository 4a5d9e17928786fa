use common::config::AccessMode;

use crate::error::{PurgeError, Result};
use crate::store::{KeyValueStore, StoreError, printable_key};

/// Reads a key's value as bytes according to the configured access mode.
pub struct ValueAccessor<'a> {
    store: &'a dyn KeyValueStore,
    mode: AccessMode,
}

impl<'a> ValueAccessor<'a> {
    pub fn new(store: &'a dyn KeyValueStore, mode: AccessMode) -> Self {
        Self { store, mode }
    }

    /// Fetch the byte content of `key`.
    ///
    /// Field maps are collapsed by [`collapse_fields`]. A flat key that no
    /// longer exists is reported as a fetch error wrapping
    /// [`StoreError::NotFound`].
    pub async fn fetch(&self, key: &[u8]) -> Result<Vec<u8>> {
        let fetch_error = |source| PurgeError::Fetch {
            key: printable_key(key).into_owned(),
            source,
        };

        match self.mode {
            AccessMode::Flat => self
                .store
                .get(key)
                .await
                .map_err(fetch_error)?
                .ok_or_else(|| fetch_error(StoreError::NotFound(printable_key(key).into_owned()))),
            AccessMode::FieldMap => {
                let fields = self.store.hash_fields(key).await.map_err(fetch_error)?;
                Ok(collapse_fields(&fields))
            }
        }
    }
}

/// Concatenate every field name and value, in the order given.
///
/// The store decides that order, so a multi-field value may collapse
/// differently across fetches.
pub fn collapse_fields(fields: &[(Vec<u8>, Vec<u8>)]) -> Vec<u8> {
    let capacity = fields.iter().map(|(f, v)| f.len() + v.len()).sum();
    fields
        .iter()
        .fold(Vec::with_capacity(capacity), |mut bytes, (field, value)| {
            bytes.extend_from_slice(field);
            bytes.extend_from_slice(value);
            bytes
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, StoredValue};

    fn store() -> InMemoryStore {
        InMemoryStore::from_entries([
            ("flat", StoredValue::flat("null")),
            (
                "map",
                StoredValue::fields([("name", "null"), ("kind", "x")]),
            ),
        ])
    }

    #[test]
    fn test_collapse_fields_keeps_given_order() {
        let fields = vec![
            (b"b".to_vec(), b"2".to_vec()),
            (b"a".to_vec(), b"1".to_vec()),
        ];
        assert_eq!(collapse_fields(&fields), b"b2a1");
        assert!(collapse_fields(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_flat_fetch() {
        let store = store();
        let accessor = ValueAccessor::new(&store, AccessMode::Flat);
        assert_eq!(accessor.fetch(b"flat").await.unwrap(), b"null");
    }

    #[tokio::test]
    async fn test_flat_fetch_of_missing_key_is_not_found() {
        let store = store();
        let accessor = ValueAccessor::new(&store, AccessMode::Flat);
        let err = accessor.fetch(b"gone").await.unwrap_err();
        assert!(matches!(
            err,
            PurgeError::Fetch { ref key, source: StoreError::NotFound(_) } if key == "gone"
        ));
    }

    #[tokio::test]
    async fn test_field_map_fetch_collapses_fields() {
        let store = store();
        let accessor = ValueAccessor::new(&store, AccessMode::FieldMap);
        assert_eq!(accessor.fetch(b"map").await.unwrap(), b"namenullkindx");
        assert!(accessor.fetch(b"gone").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_value_kind_is_a_fetch_error() {
        let store = store();
        let flat = ValueAccessor::new(&store, AccessMode::Flat);
        assert!(matches!(
            flat.fetch(b"map").await,
            Err(PurgeError::Fetch {
                source: StoreError::WrongType(_),
                ..
            })
        ));

        let map = ValueAccessor::new(&store, AccessMode::FieldMap);
        assert!(matches!(
            map.fetch(b"flat").await,
            Err(PurgeError::Fetch { .. })
        ));
    }
}
