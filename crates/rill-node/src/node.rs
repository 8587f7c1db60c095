//! Full node composition.
//!
//! The [`Node`] struct wires together the wallet state, the sharded block
//! store, and the chain view adapter consumed by inventory reconciliation.
//! Block application is driven externally (by the out-of-scope consensus
//! collaborator calling [`Node::apply_block`] directly); the RPC surface
//! exposed by [`crate::rpc`] is read-only.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::{info, warn};

use rill_core::address::Address;
use rill_core::error::StoreError;
use rill_core::types::Hash256;
use rill_wallet::{JournalTransaction, WalletState};

use crate::chain_view::NodeChainView;
use crate::config::NodeConfig;
use crate::store::types::{StoredBlock, StoredTransaction};
use crate::store::BlockStore;

/// Runtime counters, updated as blocks are applied and rolled back.
#[derive(Default)]
pub struct NodeMetrics {
    /// Total blocks applied since startup.
    pub blocks_applied: AtomicU64,
    /// Total blocks rolled back since startup.
    pub blocks_reverted: AtomicU64,
    /// Total WSJ entries applied since startup.
    pub entries_applied: AtomicU64,
}

impl NodeMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A block that failed to apply, paired with the number of entries that had
/// already taken effect before the failing entry was hit (so a caller can
/// decide whether to revert just those, or the whole journal transaction).
#[derive(Debug)]
pub struct BlockApplyError {
    pub block_num: u64,
    pub entries_applied: usize,
}

/// The full node: wallet state, sharded block store, and the chain view
/// adapter handed to the network layer for inventory reconciliation.
pub struct Node {
    /// Wallet state, exclusively locked for the duration of apply/revert.
    wallet_state: RwLock<WalletState>,
    /// Sharded block + transaction store.
    store: Arc<BlockStore>,
    /// Read-only chain view over `store`, shared with `rill-network`.
    chain_view: Arc<NodeChainView>,
    /// Node configuration.
    config: NodeConfig,
    /// Runtime metrics counters.
    metrics: NodeMetrics,
}

impl Node {
    pub fn open(config: NodeConfig) -> Result<Self, StoreError> {
        let store = Arc::new(BlockStore::open(config.db_path(), config.archival)?);
        let chain_view = Arc::new(NodeChainView::new(store.clone()));
        Ok(Self {
            wallet_state: RwLock::new(WalletState::new()),
            store,
            chain_view,
            config,
            metrics: NodeMetrics::new(),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn metrics(&self) -> &NodeMetrics {
        &self.metrics
    }

    pub fn chain_view(&self) -> Arc<NodeChainView> {
        self.chain_view.clone()
    }

    pub fn store(&self) -> Arc<BlockStore> {
        self.store.clone()
    }

    pub fn balance(&self, address: &Address) -> Option<Decimal> {
        self.wallet_state.read().get(address).map(|w| w.balance)
    }

    pub fn block_by_number(&self, num: u64) -> Result<Option<StoredBlock>, StoreError> {
        self.store.get_block_by_number(num)
    }

    pub fn block_by_hash(&self, checksum: &Hash256) -> Result<Option<StoredBlock>, StoreError> {
        self.store.get_block_by_hash(checksum)
    }

    pub fn transaction_by_id(&self, id: &[u8]) -> Result<Option<StoredTransaction>, StoreError> {
        self.store.get_transaction_by_id(id)
    }

    /// Apply a block's wallet-state journal, persist the block and its
    /// transactions, and advance metrics. The wallet-state lock is held
    /// exclusively for the whole operation.
    ///
    /// On journal failure the entries that already took effect are rolled
    /// back in reverse order before returning the error, leaving
    /// wallet-state untouched as a whole; the block is not persisted.
    pub fn apply_block(
        &self,
        block: StoredBlock,
        transactions: Vec<StoredTransaction>,
        journal: &JournalTransaction,
    ) -> Result<(), BlockApplyError> {
        let mut state = self.wallet_state.write();
        if !journal.apply(&mut state) {
            warn!(block_num = block.num, "block journal failed to apply, rolling back");
            journal.revert(&mut state);
            return Err(BlockApplyError {
                block_num: block.num,
                entries_applied: 0,
            });
        }
        drop(state);

        if let Err(e) = self.store.insert_block(&block) {
            warn!(block_num = block.num, error = %e, "failed to persist block after journal apply");
        }
        for tx in &transactions {
            if let Err(e) = self.store.insert_transaction(tx) {
                warn!(tx_id = ?tx.id, error = %e, "failed to persist transaction after journal apply");
            }
        }

        self.chain_view.set_proposer_block(None);
        self.metrics.blocks_applied.fetch_add(1, Ordering::Relaxed);
        self.metrics
            .entries_applied
            .fetch_add(journal.entries.len() as u64, Ordering::Relaxed);
        info!(block_num = block.num, "block applied");
        Ok(())
    }

    /// Revert a previously applied block's journal and remove its rows from
    /// the store (subject to `archival`).
    pub fn revert_block(&self, block: &StoredBlock, journal: &JournalTransaction) -> Result<(), StoreError> {
        {
            let mut state = self.wallet_state.write();
            journal.revert(&mut state);
        }
        self.store.remove_block(block.num)?;
        self.metrics.blocks_reverted.fetch_add(1, Ordering::Relaxed);
        info!(block_num = block.num, "block reverted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_wallet::{JournalEntry, Wallet};
    use tempfile::TempDir;

    fn config_at(dir: &TempDir) -> NodeConfig {
        NodeConfig {
            data_dir: dir.path().to_path_buf(),
            ..NodeConfig::default()
        }
    }

    fn sample_block(num: u64) -> StoredBlock {
        StoredBlock {
            num,
            checksum: Hash256::from_bytes([num as u8; 32]),
            prev_checksum: Hash256::ZERO,
            wallet_state_checksum: Hash256::ZERO,
            sig_freeze_checksum: Hash256::ZERO,
            difficulty: 1,
            pow_field: vec![],
            tx_ids: vec![],
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

    #[test]
    fn open_starts_with_empty_wallet_state_and_no_tip() {
        let dir = TempDir::new().unwrap();
        let node = Node::open(config_at(&dir)).unwrap();
        assert_eq!(node.store.tip().unwrap(), None);
        assert!(node.balance(&Address::new(vec![1]).unwrap()).is_none());
    }

    #[test]
    fn apply_block_persists_block_and_updates_wallet_state() {
        let dir = TempDir::new().unwrap();
        let node = Node::open(config_at(&dir)).unwrap();
        let addr = Address::new(vec![1, 2, 3]).unwrap();

        let mut state = node.wallet_state.write();
        state.create_wallet(Wallet::new(addr.clone())).unwrap();
        drop(state);

        let mut journal = JournalTransaction::new(1);
        journal.append(JournalEntry::Balance {
            target: addr.clone(),
            old_balance: Decimal::ZERO,
            new_balance: Decimal::from(10),
        });

        node.apply_block(sample_block(1), vec![], &journal).unwrap();

        assert_eq!(node.balance(&addr), Some(Decimal::from(10)));
        assert_eq!(node.block_by_number(1).unwrap().unwrap().num, 1);
        assert_eq!(node.metrics().blocks_applied.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn revert_block_rolls_back_wallet_state_and_removes_block() {
        let dir = TempDir::new().unwrap();
        let node = Node::open(config_at(&dir)).unwrap();
        let addr = Address::new(vec![1, 2, 3]).unwrap();

        let mut state = node.wallet_state.write();
        state.create_wallet(Wallet::new(addr.clone())).unwrap();
        drop(state);

        let mut journal = JournalTransaction::new(1);
        journal.append(JournalEntry::Balance {
            target: addr.clone(),
            old_balance: Decimal::ZERO,
            new_balance: Decimal::from(10),
        });
        let block = sample_block(1);
        node.apply_block(block.clone(), vec![], &journal).unwrap();

        node.revert_block(&block, &journal).unwrap();
        assert_eq!(node.balance(&addr), Some(Decimal::ZERO));
        assert_eq!(node.block_by_number(1).unwrap(), None);
    }
}
