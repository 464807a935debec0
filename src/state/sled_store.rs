//! Production `PersistentStore`, grounded directly on the teacher's
//! `storage.rs` sled wrapper: one tree, prefix-scanned column families, and
//! a single `sled::Batch` per commit so a crash mid-write leaves either the
//! old state or the new one, never a mix.

use crate::error::StateError;

use super::{PersistentStore, WriteBatch};

pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open(path: &std::path::Path) -> Result<Self, StateError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }
}

impl PersistentStore for SledStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        Ok(self.db.get(key)?.map(|ivec| ivec.to_vec()))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StateError> {
        self.db
            .scan_prefix(prefix)
            .map(|entry| entry.map(|(k, v)| (k.to_vec(), v.to_vec())))
            .collect::<Result<Vec<_>, sled::Error>>()
            .map_err(StateError::from)
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), StateError> {
        let mut sled_batch = sled::Batch::default();
        for key in batch.deletes() {
            sled_batch.remove(key.as_slice());
        }
        for (key, value) in batch.puts() {
            sled_batch.insert(key.as_slice(), value.as_slice());
        }
        self.db.apply_batch(sled_batch)?;
        self.db.flush()?;
        Ok(())
    }
}
