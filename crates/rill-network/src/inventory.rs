//! Inventory reconciliation: given a peer's advertised [`InventoryItem`],
//! decide whether and what to fetch.
//!
//! Decisions never throw. A `PeerLink` send failure is logged and treated
//! as "not handled" (the request simply wasn't emitted), the same outcome
//! as a condition that didn't warrant a fetch.

use tracing::warn;

use rill_core::adapters::{ChainView, InventoryItem, PeerLink, Presence};
use rill_core::constants::SIGNATURE_WINDOW;

use crate::protocol::{
    InventoryRequest, CODE_GET_BLOCK, CODE_GET_BLOCK_SIGNATURE, CODE_GET_KEEP_ALIVE, CODE_GET_PRESENCE,
    CODE_GET_TRANSACTION, INCLUDE_TX_FULL,
};

/// Evaluate one advertised inventory item against local chain/presence
/// state, emitting a targeted fetch request if warranted.
///
/// Returns `true` if a request was sent, `false` if the advertisement was
/// declined (already known, stale, referencing a fork we can't service, or
/// the send itself failed).
pub fn reconcile(item: &InventoryItem, peer: &dyn PeerLink, chain: &dyn ChainView, presence: &dyn Presence) -> bool {
    match item {
        InventoryItem::Block(num) => {
            let tip = chain.tip();
            if *num <= tip {
                return false;
            }
            let req = InventoryRequest::GetBlock {
                next_height: tip + 1,
                include_tx: INCLUDE_TX_FULL,
                latest_only: true,
            };
            send(peer, CODE_GET_BLOCK, req)
        }

        InventoryItem::Transaction(id) => {
            let req = InventoryRequest::GetTransaction { legacy_tx_id: id.clone() };
            send(peer, CODE_GET_TRANSACTION, req)
        }

        InventoryItem::KeepAlive { address, device, last_seen } => match presence.by_address(address) {
            None => {
                let req = InventoryRequest::GetPresence { addr: address.as_bytes().to_vec() };
                send(peer, CODE_GET_PRESENCE, req)
            }
            Some(info) => {
                let known = info.addresses.iter().find(|e| &e.device == device);
                let stale = known.map(|e| e.last_seen_time < *last_seen).unwrap_or(true);
                if !stale {
                    return false;
                }
                let req =
                    InventoryRequest::GetKeepAlive { addr: address.as_bytes().to_vec(), device: device.clone() };
                send(peer, CODE_GET_KEEP_ALIVE, req)
            }
        },

        InventoryItem::BlockSignature { num, hash, signer } => {
            let tip = chain.tip();
            if *num > tip + 1 || *num <= tip.saturating_sub(SIGNATURE_WINDOW) {
                return false;
            }
            let local = if *num == tip + 1 { chain.proposer_block() } else { chain.block(*num) };
            let Some(block) = local else { return false };
            if block.checksum != *hash || chain.has_signature(&block, signer) {
                return false;
            }
            let req = InventoryRequest::GetBlockSignature { block_num: *num, addr: signer.as_bytes().to_vec() };
            send(peer, CODE_GET_BLOCK_SIGNATURE, req)
        }
    }
}

fn send(peer: &dyn PeerLink, code: u32, req: InventoryRequest) -> bool {
    match peer.send(code, req.encode()) {
        Ok(()) => true,
        Err(e) => {
            warn!(code, error = %e, "inventory: failed to send fetch request");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rill_core::adapters::{BlockSummary, PresenceInfo};
    use rill_core::address::Address;
    use rill_core::error::InventoryError;
    use rill_core::types::Hash256;

    struct StubChain {
        tip: u64,
        blocks: Vec<BlockSummary>,
        proposer: Option<BlockSummary>,
        signed_by: Vec<Address>,
    }

    impl ChainView for StubChain {
        fn tip(&self) -> u64 {
            self.tip
        }
        fn block(&self, num: u64) -> Option<BlockSummary> {
            self.blocks.iter().find(|b| b.num == num).cloned()
        }
        fn proposer_block(&self) -> Option<BlockSummary> {
            self.proposer.clone()
        }
        fn has_signature(&self, _block: &BlockSummary, signer: &Address) -> bool {
            self.signed_by.contains(signer)
        }
    }

    struct StubPresence(Option<PresenceInfo>);

    impl Presence for StubPresence {
        fn by_address(&self, _addr: &Address) -> Option<PresenceInfo> {
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct RecordingPeer {
        sent: Mutex<Vec<(u32, Vec<u8>)>>,
        fail: bool,
    }

    impl PeerLink for RecordingPeer {
        fn send(&self, code: u32, bytes: Vec<u8>) -> Result<(), InventoryError> {
            if self.fail {
                return Err(InventoryError::PeerLink("boom".into()));
            }
            self.sent.lock().push((code, bytes));
            Ok(())
        }
    }

    fn addr(b: u8) -> Address {
        Address::new(vec![b; 4]).unwrap()
    }

    #[test]
    fn block_ahead_of_tip_fetches() {
        let chain = StubChain { tip: 5, blocks: vec![], proposer: None, signed_by: vec![] };
        let presence = StubPresence(None);
        let peer = RecordingPeer::default();
        assert!(reconcile(&InventoryItem::Block(6), &peer, &chain, &presence));
        assert_eq!(peer.sent.lock()[0].0, CODE_GET_BLOCK);
    }

    #[test]
    fn block_at_or_below_tip_declines() {
        let chain = StubChain { tip: 5, blocks: vec![], proposer: None, signed_by: vec![] };
        let presence = StubPresence(None);
        let peer = RecordingPeer::default();
        assert!(!reconcile(&InventoryItem::Block(5), &peer, &chain, &presence));
        assert!(peer.sent.lock().is_empty());
    }

    #[test]
    fn transaction_always_fetches() {
        let chain = StubChain { tip: 0, blocks: vec![], proposer: None, signed_by: vec![] };
        let presence = StubPresence(None);
        let peer = RecordingPeer::default();
        assert!(reconcile(&InventoryItem::Transaction(vec![1, 2, 3]), &peer, &chain, &presence));
    }

    #[test]
    fn keep_alive_with_no_presence_fetches_presence() {
        let chain = StubChain { tip: 0, blocks: vec![], proposer: None, signed_by: vec![] };
        let presence = StubPresence(None);
        let peer = RecordingPeer::default();
        let item = InventoryItem::KeepAlive { address: addr(1), device: b"d".to_vec(), last_seen: 150 };
        assert!(reconcile(&item, &peer, &chain, &presence));
        assert_eq!(peer.sent.lock()[0].0, CODE_GET_PRESENCE);
    }

    #[test]
    fn keep_alive_stale_device_fetches_keep_alive() {
        let chain = StubChain { tip: 0, blocks: vec![], proposer: None, signed_by: vec![] };
        let info = PresenceInfo {
            addresses: vec![rill_core::adapters::PresenceEntry { device: b"d".to_vec(), last_seen_time: 100 }],
        };
        let presence = StubPresence(Some(info));
        let peer = RecordingPeer::default();
        let item = InventoryItem::KeepAlive { address: addr(1), device: b"d".to_vec(), last_seen: 150 };
        assert!(reconcile(&item, &peer, &chain, &presence));
        assert_eq!(peer.sent.lock()[0].0, CODE_GET_KEEP_ALIVE);
    }

    #[test]
    fn keep_alive_fresh_device_declines() {
        let chain = StubChain { tip: 0, blocks: vec![], proposer: None, signed_by: vec![] };
        let info = PresenceInfo {
            addresses: vec![rill_core::adapters::PresenceEntry { device: b"d".to_vec(), last_seen_time: 200 }],
        };
        let presence = StubPresence(Some(info));
        let peer = RecordingPeer::default();
        let item = InventoryItem::KeepAlive { address: addr(1), device: b"d".to_vec(), last_seen: 150 };
        assert!(!reconcile(&item, &peer, &chain, &presence));
    }

    #[test]
    fn block_signature_in_progress_proposer_fetches() {
        let hash = Hash256([0xAA; 32]);
        let chain = StubChain {
            tip: 9,
            blocks: vec![],
            proposer: Some(BlockSummary { num: 10, checksum: hash }),
            signed_by: vec![],
        };
        let presence = StubPresence(None);
        let peer = RecordingPeer::default();
        let item = InventoryItem::BlockSignature { num: 10, hash, signer: addr(2) };
        assert!(reconcile(&item, &peer, &chain, &presence));
    }

    #[test]
    fn block_signature_already_present_declines() {
        let hash = Hash256([0xAA; 32]);
        let signer = addr(2);
        let chain = StubChain {
            tip: 9,
            blocks: vec![BlockSummary { num: 8, checksum: hash }],
            proposer: None,
            signed_by: vec![signer.clone()],
        };
        let presence = StubPresence(None);
        let peer = RecordingPeer::default();
        let item = InventoryItem::BlockSignature { num: 8, hash, signer };
        assert!(!reconcile(&item, &peer, &chain, &presence));
    }

    #[test]
    fn block_signature_checksum_mismatch_declines() {
        let chain = StubChain {
            tip: 9,
            blocks: vec![BlockSummary { num: 8, checksum: Hash256([0x11; 32]) }],
            proposer: None,
            signed_by: vec![],
        };
        let presence = StubPresence(None);
        let peer = RecordingPeer::default();
        let item = InventoryItem::BlockSignature { num: 8, hash: Hash256([0x22; 32]), signer: addr(2) };
        assert!(!reconcile(&item, &peer, &chain, &presence));
    }

    #[test]
    fn block_signature_out_of_window_declines() {
        let chain = StubChain {
            tip: 100,
            blocks: vec![BlockSummary { num: 10, checksum: Hash256([0x11; 32]) }],
            proposer: None,
            signed_by: vec![],
        };
        let presence = StubPresence(None);
        let peer = RecordingPeer::default();
        let item = InventoryItem::BlockSignature { num: 10, hash: Hash256([0x11; 32]), signer: addr(2) };
        assert!(!reconcile(&item, &peer, &chain, &presence));
    }

    #[test]
    fn peer_send_failure_returns_false() {
        let chain = StubChain { tip: 0, blocks: vec![], proposer: None, signed_by: vec![] };
        let presence = StubPresence(None);
        let peer = RecordingPeer { sent: Mutex::new(vec![]), fail: true };
        assert!(!reconcile(&InventoryItem::Transaction(vec![1]), &peer, &chain, &presence));
    }
}
