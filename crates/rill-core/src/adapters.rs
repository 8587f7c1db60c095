//! Traits for collaborators the wallet-state journal core treats as
//! external: the consensus/chain-sync engine, the peer transport, and the
//! presence registry. Concrete implementations live in `rill-node`
//! (`ChainView`) and `rill-network` (`PeerLink`, `Presence`).

use crate::address::Address;
use crate::error::InventoryError;
use crate::types::Hash256;

/// A minimal view of a stored block, sufficient for inventory
/// reconciliation decisions without pulling the full block-store type
/// across the crate boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockSummary {
    pub num: u64,
    pub checksum: Hash256,
}

/// A single advertised/local presence entry: a device seen for an address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresenceEntry {
    pub device: Vec<u8>,
    pub last_seen_time: i64,
}

/// Presence information known for a wallet address.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct PresenceInfo {
    pub addresses: Vec<PresenceEntry>,
}

/// A peer's advertisement of an object this node may need to fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InventoryItem {
    Block(u64),
    Transaction(Vec<u8>),
    KeepAlive {
        address: Address,
        device: Vec<u8>,
        last_seen: i64,
    },
    BlockSignature {
        num: u64,
        hash: Hash256,
        signer: Address,
    },
}

/// Read-only view of the locally-known chain, as needed by inventory
/// reconciliation. Implemented in `rill-node` over the shard store plus the
/// in-progress local block.
pub trait ChainView: Send + Sync {
    /// Height of the highest committed block.
    fn tip(&self) -> u64;

    /// The committed block at `num`, if known.
    fn block(&self, num: u64) -> Option<BlockSummary>;

    /// The in-flight block currently being signed, if any.
    fn proposer_block(&self) -> Option<BlockSummary>;

    /// Whether `block` already carries a signature from `signer`.
    fn has_signature(&self, block: &BlockSummary, signer: &Address) -> bool;
}

/// Lookup of presence (device/last-seen) records by wallet address.
/// Implemented in `rill-network` as a `dashmap`-backed registry.
pub trait Presence: Send + Sync {
    fn by_address(&self, addr: &Address) -> Option<PresenceInfo>;
}

/// A transport-level link to the peer that advertised an inventory item.
/// Implemented in `rill-network` over the libp2p request-response
/// behaviour.
pub trait PeerLink: Send + Sync {
    /// Send a fetch request: a protocol `code` plus its encoded payload.
    fn send(&self, code: u32, bytes: Vec<u8>) -> Result<(), InventoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Object-safety assertions: these only need to compile.
    fn _assert_chain_view_object_safe(_: &dyn ChainView) {}
    fn _assert_presence_object_safe(_: &dyn Presence) {}
    fn _assert_peer_link_object_safe(_: &dyn PeerLink) {}

    struct NullPeerLink;
    impl PeerLink for NullPeerLink {
        fn send(&self, _code: u32, _bytes: Vec<u8>) -> Result<(), InventoryError> {
            Ok(())
        }
    }

    #[test]
    fn peer_link_object_safe_usable() {
        let link = NullPeerLink;
        let dyn_link: &dyn PeerLink = &link;
        assert!(dyn_link.send(1, vec![]).is_ok());
    }

    #[test]
    fn presence_info_default_is_empty() {
        assert!(PresenceInfo::default().addresses.is_empty());
    }

    #[test]
    fn inventory_item_equality() {
        let a = InventoryItem::Block(5);
        let b = InventoryItem::Block(5);
        assert_eq!(a, b);
        assert_ne!(a, InventoryItem::Block(6));
    }
}
