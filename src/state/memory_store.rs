//! In-memory `PersistentStore`, used by tests and by `pvm-dump` when
//! pointed at a snapshot instead of a live sled tree. Mirrors the teacher's
//! in-memory fallback used in its own `#[cfg(test)]` storage harness.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::error::StateError;

use super::{PersistentStore, WriteBatch};

#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistentStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StateError> {
        Ok(self
            .data
            .read()
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), StateError> {
        let mut data = self.data.write();
        for key in batch.deletes() {
            data.remove(key);
        }
        for (key, value) in batch.puts() {
            data.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_batch_applies_puts_and_deletes_atomically() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.put(b"a".to_vec(), b"1".to_vec());
        store.write_batch(batch).unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));

        let mut batch = WriteBatch::new();
        batch.delete(b"a".to_vec());
        batch.put(b"b".to_vec(), b"2".to_vec());
        store.write_batch(batch).unwrap();
        assert_eq!(store.get(b"a").unwrap(), None);
        assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn scan_prefix_only_returns_matching_keys() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.put(b"utxo/1".to_vec(), b"x".to_vec());
        batch.put(b"utxo/2".to_vec(), b"y".to_vec());
        batch.put(b"chain/1".to_vec(), b"z".to_vec());
        store.write_batch(batch).unwrap();

        let results = store.scan_prefix(b"utxo/").unwrap();
        assert_eq!(results.len(), 2);
    }
}
