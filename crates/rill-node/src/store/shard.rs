//! Shard connection management: one RocksDB database per
//! `MAX_BLOCKS_PER_DB`-block window, opened lazily and evicted on idle.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rocksdb::{ColumnFamilyDescriptor, Options, DB};
use rill_core::constants::{MAX_BLOCKS_PER_DB, SHARD_CACHE_CAP, SHARD_IDLE_SECS};
use rill_core::error::StoreError;

/// Column families carried by each shard database, named after the stored
/// fields that originally migrated onto the shard schema.
pub const CF_BLOCKS: &str = "blocks";
pub const CF_TRANSACTIONS: &str = "transactions";
pub const CF_FROM_LIST: &str = "fromList";
pub const CF_DATA_CHECKSUM: &str = "dataChecksum";
pub const CF_COMPACTED_SIGS: &str = "compactedSigs";
pub const CF_LAST_SUPER_BLOCK_CHECKSUM: &str = "lastSuperBlockChecksum";
pub const CF_LAST_SUPER_BLOCK_NUM: &str = "lastSuperBlockNum";
pub const CF_SUPER_BLOCK_SEGMENTS: &str = "superBlockSegments";
pub const CF_BLOCK_PROPOSER: &str = "blockProposer";

fn shard_column_families() -> Vec<&'static str> {
    vec![
        CF_BLOCKS,
        CF_TRANSACTIONS,
        CF_FROM_LIST,
        CF_DATA_CHECKSUM,
        CF_COMPACTED_SIGS,
        CF_LAST_SUPER_BLOCK_CHECKSUM,
        CF_LAST_SUPER_BLOCK_NUM,
        CF_SUPER_BLOCK_SEGMENTS,
        CF_BLOCK_PROPOSER,
    ]
}

/// `shard = floor(n / MAX_BLOCKS_PER_DB) * MAX_BLOCKS_PER_DB`.
pub fn shard_for(n: u64) -> u64 {
    (n / MAX_BLOCKS_PER_DB) * MAX_BLOCKS_PER_DB
}

struct CachedShard {
    db: Arc<DB>,
    last_used: Instant,
}

/// Caches open shard connections, evicting idle ones and enforcing a hard
/// cap on the number kept open at once. Every accessor removes stray
/// `*.dat-shm`/`*.dat-wal` siblings on first open of a shard, a defensive
/// cleanup step with no corresponding RocksDB artifact but kept for parity
/// with the on-disk layout other tooling expects.
pub struct ShardManager {
    base_dir: PathBuf,
    cache: Mutex<HashMap<u64, CachedShard>>,
    cache_cap: usize,
    idle_limit: Duration,
}

impl ShardManager {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self::with_limits(base_dir, SHARD_CACHE_CAP, Duration::from_secs(SHARD_IDLE_SECS))
    }

    pub fn with_limits(base_dir: impl Into<PathBuf>, cache_cap: usize, idle_limit: Duration) -> Self {
        Self {
            base_dir: base_dir.into(),
            cache: Mutex::new(HashMap::new()),
            cache_cap,
            idle_limit,
        }
    }

    fn shard_path(&self, shard: u64) -> PathBuf {
        self.base_dir.join("0000").join(format!("{shard}.dat"))
    }

    fn open_shard(path: &Path) -> Result<DB, StoreError> {
        std::fs::create_dir_all(path.parent().unwrap_or(Path::new(".")))
            .map_err(|e| StoreError::Io(e.to_string()))?;
        let _ = std::fs::remove_file(format!("{}-shm", path.display()));
        let _ = std::fs::remove_file(format!("{}-wal", path.display()));

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs: Vec<ColumnFamilyDescriptor> = shard_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        DB::open_cf_descriptors(&opts, path, cfs).map_err(|e| StoreError::Io(e.to_string()))
    }

    /// Evict idle shards, then shrink to the cache cap, oldest-first. Never
    /// evicts `keep`, the shard about to be accessed.
    fn evict(&self, cache: &mut HashMap<u64, CachedShard>, keep: u64) {
        let now = Instant::now();
        cache.retain(|shard, entry| {
            *shard == keep || now.duration_since(entry.last_used) < self.idle_limit
        });

        while cache.len() > self.cache_cap {
            let oldest = cache
                .iter()
                .filter(|(shard, _)| **shard != keep)
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(shard, _)| *shard);
            match oldest {
                Some(shard) => {
                    cache.remove(&shard);
                }
                None => break,
            }
        }
    }

    /// Fetch (opening if necessary) the shard database containing block `n`.
    pub fn seek(&self, n: u64) -> Result<Arc<DB>, StoreError> {
        let shard = shard_for(n);
        self.seek_shard(shard)
    }

    /// Fetch (opening if necessary) the shard database by its own shard number.
    pub fn seek_shard(&self, shard: u64) -> Result<Arc<DB>, StoreError> {
        let mut cache = self.cache.lock();
        self.evict(&mut cache, shard);

        if let Some(entry) = cache.get_mut(&shard) {
            entry.last_used = Instant::now();
            return Ok(entry.db.clone());
        }

        let db = Arc::new(Self::open_shard(&self.shard_path(shard))?);
        cache.insert(
            shard,
            CachedShard {
                db: db.clone(),
                last_used: Instant::now(),
            },
        );
        Ok(db)
    }

    /// Whether a shard's directory already exists on disk, without opening it.
    pub fn shard_exists(&self, shard: u64) -> bool {
        self.shard_path(shard).exists()
    }

    /// Probe `0, MAX, 2*MAX, ...` for the highest existing shard directory,
    /// then reverse-iterate its `blocks` column family to find the highest
    /// block number actually stored there.
    pub fn seek_latest(&self) -> Result<Option<(u64, Arc<DB>)>, StoreError> {
        let mut shard = 0u64;
        let mut last_existing = None;
        while self.shard_exists(shard) {
            last_existing = Some(shard);
            shard += MAX_BLOCKS_PER_DB;
        }

        let Some(shard) = last_existing else {
            return Ok(None);
        };
        let db = self.seek_shard(shard)?;
        Ok(Some((shard, db)))
    }

    /// Compact the `blocks` and `transactions` column families of the given
    /// shard, the VACUUM-equivalent for a key/value store.
    pub fn compact(&self, shard: u64) -> Result<(), StoreError> {
        let db = self.seek_shard(shard)?;
        for cf_name in [CF_BLOCKS, CF_TRANSACTIONS] {
            if let Some(cf) = db.cf_handle(cf_name) {
                db.compact_range_cf(&cf, None::<&[u8]>, None::<&[u8]>);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_core::constants::MAX_BLOCKS_PER_DB;
    use tempfile::TempDir;

    #[test]
    fn shard_for_buckets_by_max_blocks_per_db() {
        assert_eq!(shard_for(0), 0);
        assert_eq!(shard_for(MAX_BLOCKS_PER_DB - 1), 0);
        assert_eq!(shard_for(MAX_BLOCKS_PER_DB), MAX_BLOCKS_PER_DB);
        assert_eq!(shard_for(MAX_BLOCKS_PER_DB * 3 + 7), MAX_BLOCKS_PER_DB * 3);
    }

    #[test]
    fn seek_opens_and_reuses_shard() {
        let dir = TempDir::new().unwrap();
        let mgr = ShardManager::new(dir.path());
        let db1 = mgr.seek(0).unwrap();
        let db2 = mgr.seek(5).unwrap();
        assert!(Arc::ptr_eq(&db1, &db2));
    }

    #[test]
    fn seek_different_shards_opens_distinct_dbs() {
        let dir = TempDir::new().unwrap();
        let mgr = ShardManager::new(dir.path());
        let db1 = mgr.seek(0).unwrap();
        let db2 = mgr.seek(MAX_BLOCKS_PER_DB).unwrap();
        assert!(!Arc::ptr_eq(&db1, &db2));
    }

    #[test]
    fn evict_respects_cache_cap() {
        let dir = TempDir::new().unwrap();
        let mgr = ShardManager::with_limits(dir.path(), 2, Duration::from_secs(3600));
        mgr.seek_shard(0).unwrap();
        mgr.seek_shard(MAX_BLOCKS_PER_DB).unwrap();
        mgr.seek_shard(MAX_BLOCKS_PER_DB * 2).unwrap();
        assert_eq!(mgr.cache.lock().len(), 2);
    }

    #[test]
    fn seek_latest_finds_highest_existing_shard() {
        let dir = TempDir::new().unwrap();
        let mgr = ShardManager::new(dir.path());
        assert!(mgr.seek_latest().unwrap().is_none());
        mgr.seek_shard(0).unwrap();
        mgr.seek_shard(MAX_BLOCKS_PER_DB).unwrap();
        let (shard, _) = mgr.seek_latest().unwrap().unwrap();
        assert_eq!(shard, MAX_BLOCKS_PER_DB);
    }

    #[test]
    fn shard_exists_false_before_open() {
        let dir = TempDir::new().unwrap();
        let mgr = ShardManager::new(dir.path());
        assert!(!mgr.shard_exists(0));
        mgr.seek_shard(0).unwrap();
        assert!(mgr.shard_exists(0));
    }
}
