//! Concrete [`ChainView`] over the block store plus the in-progress local
//! block, used by inventory reconciliation (`rill-network`).

use parking_lot::Mutex;
use rill_core::adapters::{BlockSummary, ChainView};
use rill_core::address::Address;

use crate::store::BlockStore;

/// The block currently being assembled/signed locally, not yet committed to
/// the store. Held under its own lock, taken only around reads, never held
/// across store I/O.
#[derive(Default)]
struct LocalBlock {
    summary: Option<BlockSummary>,
    signers: Vec<Address>,
}

pub struct NodeChainView {
    store: std::sync::Arc<BlockStore>,
    local_block: Mutex<LocalBlock>,
}

impl NodeChainView {
    pub fn new(store: std::sync::Arc<BlockStore>) -> Self {
        Self {
            store,
            local_block: Mutex::new(LocalBlock::default()),
        }
    }

    pub fn set_proposer_block(&self, summary: Option<BlockSummary>) {
        let mut local = self.local_block.lock();
        local.summary = summary;
        local.signers.clear();
    }

    pub fn record_signature(&self, signer: Address) {
        let mut local = self.local_block.lock();
        if !local.signers.contains(&signer) {
            local.signers.push(signer);
        }
    }
}

impl ChainView for NodeChainView {
    fn tip(&self) -> u64 {
        self.store.tip().ok().flatten().unwrap_or(0)
    }

    fn block(&self, num: u64) -> Option<BlockSummary> {
        self.store
            .get_block_by_number(num)
            .ok()
            .flatten()
            .map(|b| BlockSummary { num: b.num, checksum: b.checksum })
    }

    fn proposer_block(&self) -> Option<BlockSummary> {
        self.local_block.lock().summary.clone()
    }

    fn has_signature(&self, block: &BlockSummary, signer: &Address) -> bool {
        let local = self.local_block.lock();
        if local.summary.as_ref() == Some(block) {
            return local.signers.contains(signer);
        }
        drop(local);
        self.store
            .get_block_by_number(block.num)
            .ok()
            .flatten()
            .filter(|b| b.checksum == block.checksum)
            .map(|b| b.signatures.iter().any(|(pubkey, _)| {
                pubkey.as_deref() == Some(signer.as_bytes())
            }))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_core::types::Hash256;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn addr(b: u8) -> Address {
        Address::new(vec![b; 4]).unwrap()
    }

    #[test]
    fn tip_is_zero_when_empty() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(BlockStore::open(dir.path(), false).unwrap());
        let view = NodeChainView::new(store);
        assert_eq!(view.tip(), 0);
    }

    #[test]
    fn proposer_block_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(BlockStore::open(dir.path(), false).unwrap());
        let view = NodeChainView::new(store);
        assert!(view.proposer_block().is_none());

        let summary = BlockSummary { num: 5, checksum: Hash256::from_bytes([1; 32]) };
        view.set_proposer_block(Some(summary.clone()));
        assert_eq!(view.proposer_block(), Some(summary));
    }

    #[test]
    fn has_signature_checks_local_block_signers() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(BlockStore::open(dir.path(), false).unwrap());
        let view = NodeChainView::new(store);
        let summary = BlockSummary { num: 5, checksum: Hash256::from_bytes([1; 32]) };
        view.set_proposer_block(Some(summary.clone()));

        let signer = addr(9);
        assert!(!view.has_signature(&summary, &signer));
        view.record_signature(signer.clone());
        assert!(view.has_signature(&summary, &signer));
    }
}
