//! The super-block side database: a dedicated RocksDB database at
//! `<base>/0000/superblocks.dat/` mirroring every super-block's row, plus
//! secondary indexes on `blockChecksum` and `lastSuperBlockChecksum` so a
//! super-block can be looked up by either key without a full shard scan.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rocksdb::{ColumnFamilyDescriptor, Options, DB};
use rill_core::error::StoreError;
use rill_core::types::Hash256;

use super::types::StoredBlock;

const CF_PRIMARY: &str = "superblocks";
const CF_BY_BLOCK_CHECKSUM: &str = "byBlockChecksum";
const CF_BY_LAST_SUPER_BLOCK_CHECKSUM: &str = "byLastSuperBlockChecksum";

/// Holds the super-block database connection behind its own lock, acquired
/// before the owning shard's lock (super-block lock, then shard lock, never
/// the reverse).
pub struct SuperBlockStore {
    db: Mutex<DB>,
}

impl SuperBlockStore {
    pub fn open(base_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path: PathBuf = base_dir.as_ref().join("0000").join("superblocks.dat");
        std::fs::create_dir_all(path.parent().unwrap_or(Path::new("."))).map_err(|e| StoreError::Io(e.to_string()))?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_PRIMARY, CF_BY_BLOCK_CHECKSUM, CF_BY_LAST_SUPER_BLOCK_CHECKSUM]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, &path, cfs).map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(Self { db: Mutex::new(db) })
    }

    pub fn insert(&self, block: &StoredBlock) -> Result<(), StoreError> {
        if !block.is_super_block() {
            return Ok(());
        }
        let db = self.db.lock();
        let primary = db.cf_handle(CF_PRIMARY).expect("cf exists");
        let by_checksum = db.cf_handle(CF_BY_BLOCK_CHECKSUM).expect("cf exists");
        let by_last = db.cf_handle(CF_BY_LAST_SUPER_BLOCK_CHECKSUM).expect("cf exists");

        let key = block.num.to_be_bytes();
        db.put_cf(&primary, key, block.encode()).map_err(|e| StoreError::Io(e.to_string()))?;
        db.put_cf(&by_checksum, block.checksum.as_bytes(), key)
            .map_err(|e| StoreError::Io(e.to_string()))?;
        if let Some(last) = &block.last_super_block_checksum {
            db.put_cf(&by_last, last.as_bytes(), key).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        Ok(())
    }

    pub fn get_by_num(&self, num: u64) -> Result<Option<StoredBlock>, StoreError> {
        let db = self.db.lock();
        let primary = db.cf_handle(CF_PRIMARY).expect("cf exists");
        let raw = db.get_cf(&primary, num.to_be_bytes()).map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(raw.map(|bytes| StoredBlock::decode(&bytes)))
    }

    pub fn get_by_checksum(&self, checksum: &Hash256) -> Result<Option<StoredBlock>, StoreError> {
        let num = {
            let db = self.db.lock();
            let idx = db.cf_handle(CF_BY_BLOCK_CHECKSUM).expect("cf exists");
            db.get_cf(&idx, checksum.as_bytes()).map_err(|e| StoreError::Io(e.to_string()))?
        };
        match num {
            Some(key) => self.get_by_num(u64::from_be_bytes(key.try_into().unwrap())),
            None => Ok(None),
        }
    }

    pub fn get_by_last_super_block_checksum(&self, checksum: &Hash256) -> Result<Option<StoredBlock>, StoreError> {
        let num = {
            let db = self.db.lock();
            let idx = db.cf_handle(CF_BY_LAST_SUPER_BLOCK_CHECKSUM).expect("cf exists");
            db.get_cf(&idx, checksum.as_bytes()).map_err(|e| StoreError::Io(e.to_string()))?
        };
        match num {
            Some(key) => self.get_by_num(u64::from_be_bytes(key.try_into().unwrap())),
            None => Ok(None),
        }
    }

    pub fn remove(&self, num: u64) -> Result<(), StoreError> {
        let existing = self.get_by_num(num)?;
        let db = self.db.lock();
        let primary = db.cf_handle(CF_PRIMARY).expect("cf exists");
        db.delete_cf(&primary, num.to_be_bytes()).map_err(|e| StoreError::Io(e.to_string()))?;
        if let Some(block) = existing {
            let by_checksum = db.cf_handle(CF_BY_BLOCK_CHECKSUM).expect("cf exists");
            db.delete_cf(&by_checksum, block.checksum.as_bytes()).map_err(|e| StoreError::Io(e.to_string()))?;
            if let Some(last) = &block.last_super_block_checksum {
                let by_last = db.cf_handle(CF_BY_LAST_SUPER_BLOCK_CHECKSUM).expect("cf exists");
                db.delete_cf(&by_last, last.as_bytes()).map_err(|e| StoreError::Io(e.to_string()))?;
            }
        }
        Ok(())
    }
}
