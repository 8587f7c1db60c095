//! The sharded block store: one RocksDB database per
//! [`rill_core::constants::MAX_BLOCKS_PER_DB`]-block window, plus a
//! dedicated super-block side database. Query shape (point lookup by
//! primary key, range scan by secondary index) mirrors the canonical
//! row layout; RocksDB column families stand in for SQL tables and
//! indexes.

pub mod encoding;
pub mod shard;
pub mod super_block;
pub mod types;

use std::path::Path;

use rill_core::error::StoreError;
use rill_core::types::Hash256;
use rill_core::varint::read_varint;

use shard::{shard_for, ShardManager, CF_BLOCKS, CF_TRANSACTIONS};
use super_block::SuperBlockStore;
use types::{StoredBlock, StoredTransaction};

/// Decode the block height varint embedded at byte offset 1 of a
/// transaction id. Returns `None` if the id is too short to carry one.
fn decode_id_height(id: &[u8]) -> Option<u64> {
    let (height, _) = read_varint(id.get(1..)?)?;
    Some(height)
}

/// Facade over the shard manager and the super-block side database.
///
/// Lock ordering when both are touched by a single operation: super-block
/// store first, then the shard. `insert_block` is the only method that
/// needs both.
pub struct BlockStore {
    shards: ShardManager,
    super_blocks: SuperBlockStore,
    archival: bool,
}

impl BlockStore {
    pub fn open(base_dir: impl AsRef<Path>, archival: bool) -> Result<Self, StoreError> {
        Ok(Self {
            shards: ShardManager::new(base_dir.as_ref()),
            super_blocks: SuperBlockStore::open(base_dir.as_ref())?,
            archival,
        })
    }

    /// Highest block number known across any existing shard, or `None` if
    /// the store is empty.
    pub fn tip(&self) -> Result<Option<u64>, StoreError> {
        let Some((shard, db)) = self.shards.seek_latest()? else {
            return Ok(None);
        };
        let Some(cf) = db.cf_handle(CF_BLOCKS) else {
            return Ok(None);
        };
        let mut iter = db.iterator_cf(&cf, rocksdb::IteratorMode::End);
        match iter.next() {
            Some(Ok((key, _))) => {
                let num = u64::from_be_bytes(key.as_ref().try_into().map_err(|_| {
                    StoreError::Malformed("block key is not 8 bytes".into())
                })?);
                Ok(Some(num))
            }
            Some(Err(e)) => Err(StoreError::Io(e.to_string())),
            None if shard == 0 => Ok(None),
            None => Ok(None),
        }
    }

    pub fn insert_block(&self, block: &StoredBlock) -> Result<(), StoreError> {
        self.super_blocks.insert(block)?;
        let db = self.shards.seek(block.num)?;
        let cf = db.cf_handle(CF_BLOCKS).expect("cf exists");
        db.put_cf(&cf, block.num.to_be_bytes(), block.encode())
            .map_err(|e| StoreError::Io(e.to_string()))
    }

    pub fn insert_transaction(&self, tx: &StoredTransaction) -> Result<(), StoreError> {
        let db = self.shards.seek(tx.applied)?;
        let cf = db.cf_handle(CF_TRANSACTIONS).expect("cf exists");
        db.put_cf(&cf, &tx.id, tx.encode()).map_err(|e| StoreError::Io(e.to_string()))
    }

    /// `None` if the owning shard simply hasn't been created yet, not an error.
    pub fn get_block_by_number(&self, num: u64) -> Result<Option<StoredBlock>, StoreError> {
        let shard = shard_for(num);
        if !self.shards.shard_exists(shard) {
            return Ok(None);
        }
        let db = self.shards.seek_shard(shard)?;
        let cf = db.cf_handle(CF_BLOCKS).expect("cf exists");
        let raw = db.get_cf(&cf, num.to_be_bytes()).map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(raw.map(|bytes| StoredBlock::decode(&bytes)))
    }

    /// Checks the super-block index first (covers the common case of
    /// looking up a super-block by hash), then walks shards downward from
    /// tip.
    pub fn get_block_by_hash(&self, checksum: &Hash256) -> Result<Option<StoredBlock>, StoreError> {
        if let Some(block) = self.super_blocks.get_by_checksum(checksum)? {
            return Ok(Some(block));
        }

        let Some(tip) = self.tip()? else {
            return Ok(None);
        };
        let mut shard = shard_for(tip);
        loop {
            if self.shards.shard_exists(shard) {
                let db = self.shards.seek_shard(shard)?;
                if let Some(cf) = db.cf_handle(CF_BLOCKS) {
                    for item in db.iterator_cf(&cf, rocksdb::IteratorMode::Start) {
                        let (_, value) = item.map_err(|e| StoreError::Io(e.to_string()))?;
                        let block = StoredBlock::decode(&value);
                        if &block.checksum == checksum {
                            return Ok(Some(block));
                        }
                    }
                }
            }
            if shard == 0 {
                break;
            }
            shard = shard.saturating_sub(rill_core::constants::MAX_BLOCKS_PER_DB);
        }
        Ok(None)
    }

    /// Tries the currently-seeked shard first. On miss, decodes the block
    /// height embedded in `id` (a varint starting at byte offset 1) to pin
    /// a starting shard, then scans forward at most
    /// [`rill_core::constants::REDACTED_WINDOW`] blocks worth of shards.
    pub fn get_transaction_by_id(&self, id: &[u8]) -> Result<Option<StoredTransaction>, StoreError> {
        if let Some(tx) = self.lookup_transaction_in_current_shard(id)? {
            return Ok(Some(tx));
        }

        let Some(height) = decode_id_height(id) else {
            return Ok(None);
        };

        let start = shard_for(height);
        let end = shard_for(height + rill_core::constants::REDACTED_WINDOW);
        let mut shard = start;
        loop {
            if self.shards.shard_exists(shard) {
                if let Some(tx) = self.lookup_transaction_in_shard(shard, id)? {
                    return Ok(Some(tx));
                }
            }
            if shard >= end {
                break;
            }
            shard += rill_core::constants::MAX_BLOCKS_PER_DB;
        }
        Ok(None)
    }

    fn lookup_transaction_in_current_shard(&self, id: &[u8]) -> Result<Option<StoredTransaction>, StoreError> {
        let Some(tip) = self.tip()? else {
            return Ok(None);
        };
        self.lookup_transaction_in_shard(shard_for(tip), id)
    }

    fn lookup_transaction_in_shard(&self, shard: u64, id: &[u8]) -> Result<Option<StoredTransaction>, StoreError> {
        if !self.shards.shard_exists(shard) {
            return Ok(None);
        }
        let db = self.shards.seek_shard(shard)?;
        let Some(cf) = db.cf_handle(CF_TRANSACTIONS) else {
            return Ok(None);
        };
        let raw = db.get_cf(&cf, id).map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(raw.map(|bytes| StoredTransaction::decode(&bytes)))
    }

    pub fn get_transactions_in_block(
        &self,
        block: &StoredBlock,
        tx_type: Option<u32>,
    ) -> Result<Vec<StoredTransaction>, StoreError> {
        let mut out = Vec::with_capacity(block.tx_ids.len());
        for id in &block.tx_ids {
            if let Some(tx) = self.get_transaction_by_id(id)? {
                if tx_type.is_none_or(|t| t == tx.tx_type) {
                    out.push(tx);
                }
            }
        }
        Ok(out)
    }

    pub fn remove_block(&self, num: u64) -> Result<(), StoreError> {
        if self.archival {
            return Ok(());
        }
        if let Some(block) = self.get_block_by_number(num)? {
            for id in &block.tx_ids {
                self.remove_transaction(id, num)?;
            }
        }
        self.super_blocks.remove(num)?;
        let shard = shard_for(num);
        if self.shards.shard_exists(shard) {
            let db = self.shards.seek_shard(shard)?;
            let cf = db.cf_handle(CF_BLOCKS).expect("cf exists");
            db.delete_cf(&cf, num.to_be_bytes()).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        Ok(())
    }

    pub fn remove_transaction(&self, id: &[u8], applied: u64) -> Result<(), StoreError> {
        if self.archival {
            return Ok(());
        }
        let shard = shard_for(applied);
        if self.shards.shard_exists(shard) {
            let db = self.shards.seek_shard(shard)?;
            let cf = db.cf_handle(CF_TRANSACTIONS).expect("cf exists");
            db.delete_cf(&cf, id).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        Ok(())
    }

    pub fn compact(&self, shard: u64) -> Result<(), StoreError> {
        self.shards.compact(shard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn sample_block(num: u64) -> StoredBlock {
        StoredBlock {
            num,
            checksum: Hash256::from_bytes([num as u8; 32]),
            prev_checksum: Hash256::ZERO,
            wallet_state_checksum: Hash256::ZERO,
            sig_freeze_checksum: Hash256::ZERO,
            difficulty: 1,
            pow_field: vec![],
            tx_ids: vec![vec![num as u8, 1]],
            signatures: vec![],
            timestamp: 0,
            version: 11,
            last_super_block_checksum: None,
            last_super_block_num: 0,
            super_block_segments: vec![],
            compacted_sigs: false,
            block_proposer: None,
        }
    }

    fn sample_tx(num: u64) -> StoredTransaction {
        StoredTransaction {
            id: vec![num as u8, 1],
            tx_type: 0,
            amount: Decimal::ZERO,
            fee: Decimal::ZERO,
            to_list: vec![],
            from_list: vec![],
            data_checksum: None,
            data: None,
            block_height: num,
            nonce: 0,
            timestamp: 0,
            checksum: Hash256::ZERO,
            signature: vec![],
            pubkey: None,
            applied: num,
            version: 11,
        }
    }

    #[test]
    fn tip_is_none_when_empty() {
        let dir = TempDir::new().unwrap();
        let store = BlockStore::open(dir.path(), false).unwrap();
        assert_eq!(store.tip().unwrap(), None);
    }

    #[test]
    fn insert_and_get_block_by_number() {
        let dir = TempDir::new().unwrap();
        let store = BlockStore::open(dir.path(), false).unwrap();
        store.insert_block(&sample_block(1)).unwrap();
        assert_eq!(store.get_block_by_number(1).unwrap(), Some(sample_block(1)));
        assert_eq!(store.get_block_by_number(2).unwrap(), None);
    }

    #[test]
    fn get_block_by_number_missing_shard_returns_none_not_error() {
        let dir = TempDir::new().unwrap();
        let store = BlockStore::open(dir.path(), false).unwrap();
        assert_eq!(store.get_block_by_number(999).unwrap(), None);
    }

    #[test]
    fn insert_and_get_block_by_hash() {
        let dir = TempDir::new().unwrap();
        let store = BlockStore::open(dir.path(), false).unwrap();
        let block = sample_block(1);
        store.insert_block(&block).unwrap();
        assert_eq!(store.get_block_by_hash(&block.checksum).unwrap(), Some(block));
    }

    #[test]
    fn insert_and_get_transaction_by_id() {
        let dir = TempDir::new().unwrap();
        let store = BlockStore::open(dir.path(), false).unwrap();
        store.insert_block(&sample_block(1)).unwrap();
        let tx = sample_tx(1);
        store.insert_transaction(&tx).unwrap();
        assert_eq!(store.get_transaction_by_id(&tx.id).unwrap(), Some(tx));
    }

    #[test]
    fn get_transactions_in_block_filters_by_type() {
        let dir = TempDir::new().unwrap();
        let store = BlockStore::open(dir.path(), false).unwrap();
        let block = sample_block(1);
        store.insert_block(&block).unwrap();
        let mut tx = sample_tx(1);
        tx.tx_type = 3;
        store.insert_transaction(&tx).unwrap();

        let matches = store.get_transactions_in_block(&block, Some(3)).unwrap();
        assert_eq!(matches.len(), 1);
        let none = store.get_transactions_in_block(&block, Some(9)).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn remove_block_deletes_block_and_its_transactions() {
        let dir = TempDir::new().unwrap();
        let store = BlockStore::open(dir.path(), false).unwrap();
        let block = sample_block(1);
        store.insert_block(&block).unwrap();
        let tx = sample_tx(1);
        store.insert_transaction(&tx).unwrap();

        store.remove_block(1).unwrap();
        assert_eq!(store.get_block_by_number(1).unwrap(), None);
        assert_eq!(store.get_transaction_by_id(&tx.id).unwrap(), None);
    }

    #[test]
    fn archival_store_refuses_removal() {
        let dir = TempDir::new().unwrap();
        let store = BlockStore::open(dir.path(), true).unwrap();
        store.insert_block(&sample_block(1)).unwrap();
        store.remove_block(1).unwrap();
        assert_eq!(store.get_block_by_number(1).unwrap(), Some(sample_block(1)));
    }

    #[test]
    fn tip_tracks_highest_inserted_block() {
        let dir = TempDir::new().unwrap();
        let store = BlockStore::open(dir.path(), false).unwrap();
        store.insert_block(&sample_block(1)).unwrap();
        store.insert_block(&sample_block(2)).unwrap();
        assert_eq!(store.tip().unwrap(), Some(2));
    }
}
