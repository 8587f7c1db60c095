//! JSON-RPC server for the Rill full node.
//!
//! A read-only surface: balance lookup, block-by-height/hash, and
//! transaction-by-id. Write operations (submitting a block) are not
//! exposed here; block application is driven by the consensus collaborator
//! calling [`crate::node::Node::apply_block`] directly.

use std::sync::Arc;

use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use serde::{Deserialize, Serialize};

use rill_core::address::Address;
use rill_core::error::RillError;
use rill_core::types::Hash256;

use crate::node::Node;
use crate::store::types::{StoredBlock, StoredTransaction};

/// JSON representation of a stored block (without the heavier
/// transaction/signature payloads, which are fetched separately).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockJson {
    pub num: u64,
    pub checksum: String,
    pub prev_checksum: String,
    pub wallet_state_checksum: String,
    pub difficulty: u64,
    pub timestamp: i64,
    pub version: u32,
    pub tx_count: usize,
    pub tx: Vec<String>,
    pub is_super_block: bool,
}

impl From<StoredBlock> for BlockJson {
    fn from(block: StoredBlock) -> Self {
        Self {
            num: block.num,
            checksum: hex::encode(block.checksum.as_bytes()),
            prev_checksum: hex::encode(block.prev_checksum.as_bytes()),
            wallet_state_checksum: hex::encode(block.wallet_state_checksum.as_bytes()),
            difficulty: block.difficulty,
            timestamp: block.timestamp,
            version: block.version,
            tx_count: block.tx_ids.len(),
            is_super_block: block.is_super_block(),
            tx: block.tx_ids.iter().map(hex::encode).collect(),
        }
    }
}

/// JSON representation of a stored transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionJson {
    pub id: String,
    pub tx_type: u32,
    pub amount: String,
    pub fee: String,
    pub block_height: u64,
    pub nonce: u32,
    pub timestamp: i64,
    pub applied: u64,
    pub version: u32,
}

impl From<StoredTransaction> for TransactionJson {
    fn from(tx: StoredTransaction) -> Self {
        Self {
            id: hex::encode(&tx.id),
            tx_type: tx.tx_type,
            amount: tx.amount.to_string(),
            fee: tx.fee.to_string(),
            block_height: tx.block_height,
            nonce: tx.nonce,
            timestamp: tx.timestamp,
            applied: tx.applied,
            version: tx.version,
        }
    }
}

/// JSON representation of general node info.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfoJson {
    /// Current chain tip height, or `None` if no blocks are stored yet.
    pub tip: Option<u64>,
    pub blocks_applied: u64,
    pub blocks_reverted: u64,
}

/// Parse a 64-character hex string into a [`Hash256`].
pub fn parse_hash(hex_str: &str) -> Result<Hash256, ErrorObjectOwned> {
    if hex_str.len() != 64 {
        return Err(rpc_error(-1, "hash must be 64 hex characters"));
    }
    let bytes = hex::decode(hex_str).map_err(|_| rpc_error(-1, "invalid hex in hash"))?;
    let arr: [u8; 32] = bytes.try_into().map_err(|_| rpc_error(-1, "hash must be 32 bytes"))?;
    Ok(Hash256::from_bytes(arr))
}

fn rpc_error(code: i32, msg: &str) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(code, msg.to_string(), None::<()>)
}

/// The Rill JSON-RPC interface: read-only queries over wallet state and
/// the block store.
#[rpc(server)]
pub trait RillRpc {
    /// Returns the current chain tip height, or `null` if the store is empty.
    #[method(name = "getblockcount")]
    async fn get_block_count(&self) -> Result<Option<u64>, ErrorObjectOwned>;

    /// Returns a block by its height.
    #[method(name = "getblockbyheight")]
    async fn get_block_by_height(&self, height: u64) -> Result<BlockJson, ErrorObjectOwned>;

    /// Returns a block by its checksum (hex-encoded).
    #[method(name = "getblockbyhash")]
    async fn get_block_by_hash(&self, hash: String) -> Result<BlockJson, ErrorObjectOwned>;

    /// Returns a transaction by its id (hex-encoded).
    #[method(name = "gettransaction")]
    async fn get_transaction(&self, txid: String) -> Result<TransactionJson, ErrorObjectOwned>;

    /// Returns the current balance of the given address (base58-encoded).
    #[method(name = "getbalance")]
    async fn get_balance(&self, address: String) -> Result<String, ErrorObjectOwned>;

    /// Returns general node info.
    #[method(name = "getinfo")]
    async fn get_info(&self) -> Result<NodeInfoJson, ErrorObjectOwned>;
}

/// Implementation of the Rill JSON-RPC server.
pub struct RpcServerImpl {
    node: Arc<Node>,
}

impl RpcServerImpl {
    pub fn new(node: Arc<Node>) -> Self {
        Self { node }
    }
}

#[async_trait]
impl RillRpcServer for RpcServerImpl {
    async fn get_block_count(&self) -> Result<Option<u64>, ErrorObjectOwned> {
        self.node
            .store()
            .tip()
            .map_err(|e| rpc_error(-1, &e.to_string()))
    }

    async fn get_block_by_height(&self, height: u64) -> Result<BlockJson, ErrorObjectOwned> {
        self.node
            .block_by_number(height)
            .map_err(|e| rpc_error(-1, &e.to_string()))?
            .map(BlockJson::from)
            .ok_or_else(|| rpc_error(-5, "block not found"))
    }

    async fn get_block_by_hash(&self, hash: String) -> Result<BlockJson, ErrorObjectOwned> {
        let checksum = parse_hash(&hash)?;
        self.node
            .block_by_hash(&checksum)
            .map_err(|e| rpc_error(-1, &e.to_string()))?
            .map(BlockJson::from)
            .ok_or_else(|| rpc_error(-5, "block not found"))
    }

    async fn get_transaction(&self, txid: String) -> Result<TransactionJson, ErrorObjectOwned> {
        let id = hex::decode(&txid).map_err(|_| rpc_error(-22, "invalid hex in txid"))?;
        self.node
            .transaction_by_id(&id)
            .map_err(|e| rpc_error(-1, &e.to_string()))?
            .map(TransactionJson::from)
            .ok_or_else(|| rpc_error(-5, "transaction not found"))
    }

    async fn get_balance(&self, address: String) -> Result<String, ErrorObjectOwned> {
        let addr = Address::from_base58(&address).map_err(|e| rpc_error(-5, &format!("invalid address: {e}")))?;
        self.node
            .balance(&addr)
            .map(|b| b.to_string())
            .ok_or_else(|| rpc_error(-5, "wallet not found"))
    }

    async fn get_info(&self) -> Result<NodeInfoJson, ErrorObjectOwned> {
        let tip = self.node.store().tip().map_err(|e| rpc_error(-1, &e.to_string()))?;
        Ok(NodeInfoJson {
            tip,
            blocks_applied: self.node.metrics().blocks_applied.load(std::sync::atomic::Ordering::Relaxed),
            blocks_reverted: self.node.metrics().blocks_reverted.load(std::sync::atomic::Ordering::Relaxed),
        })
    }
}

/// Start the JSON-RPC server on the given address.
pub async fn start_rpc_server(addr: &str, node: Arc<Node>) -> Result<ServerHandle, RillError> {
    let server = Server::builder()
        .build(addr)
        .await
        .map_err(|e| RillError::Store(rill_core::error::StoreError::Io(format!("RPC server error: {e}"))))?;

    let rpc_impl = RpcServerImpl::new(node);
    let handle = server.start(rpc_impl.into_rpc());

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_core::types::Hash256;

    #[test]
    fn parse_hash_valid() {
        let hex_str = "aa".repeat(32);
        let hash = parse_hash(&hex_str).unwrap();
        assert_eq!(hash, Hash256::from_bytes([0xAA; 32]));
    }

    #[test]
    fn parse_hash_zero() {
        let hex_str = "00".repeat(32);
        let hash = parse_hash(&hex_str).unwrap();
        assert_eq!(hash, Hash256::ZERO);
    }

    #[test]
    fn parse_hash_wrong_length() {
        let err = parse_hash("abcdef").unwrap_err();
        assert!(err.message().contains("64 hex characters"));
    }

    #[test]
    fn parse_hash_invalid_hex() {
        let hex_str = "zz".repeat(32);
        let err = parse_hash(&hex_str).unwrap_err();
        assert!(err.message().contains("invalid hex"));
    }

    #[test]
    fn block_json_from_stored_block() {
        let block = StoredBlock {
            num: 42,
            checksum: Hash256::from_bytes([0xAA; 32]),
            prev_checksum: Hash256::ZERO,
            wallet_state_checksum: Hash256::ZERO,
            sig_freeze_checksum: Hash256::ZERO,
            difficulty: 5,
            pow_field: vec![],
            tx_ids: vec![vec![1, 2]],
            signatures: vec![],
            timestamp: 1_000_000,
            version: 11,
            last_super_block_checksum: None,
            last_super_block_num: 0,
            super_block_segments: vec![],
            compacted_sigs: false,
            block_proposer: None,
        };
        let json = BlockJson::from(block);
        assert_eq!(json.num, 42);
        assert_eq!(json.tx_count, 1);
        assert!(!json.is_super_block);
    }

    #[test]
    fn node_info_json_serializes() {
        let info = NodeInfoJson { tip: Some(100), blocks_applied: 100, blocks_reverted: 0 };
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"tip\":100"));
    }

    #[test]
    fn node_info_json_serializes_null_tip() {
        let info = NodeInfoJson { tip: None, blocks_applied: 0, blocks_reverted: 0 };
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"tip\":null"));
    }
}
