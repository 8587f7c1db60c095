//! Wire message types for inventory reconciliation.
//!
//! Advertisements (lightweight hints that a peer possesses an object) are
//! broadcast over gossipsub as encoded [`InventoryItem`]s. Once a local
//! reconciliation decision calls for fetching the concrete object, a typed
//! [`InventoryRequest`] is sent point-to-point and answered with an
//! [`InventoryResponse`]. Integers are LEB128 varints and byte strings are
//! varint-length-prefixed, except `GetPresence`'s address field, which is
//! prefixed with a 4-byte little-endian `i32` length (a legacy format kept
//! bit-for-bit).

use rill_core::adapters::{InventoryItem, PresenceEntry, PresenceInfo};
use rill_core::address::Address;
use rill_core::types::Hash256;
use rill_core::varint::{read_length_prefixed, read_varint, write_length_prefixed, write_varint};

/// Gossipsub topic advertisements are published to.
pub const INVENTORY_TOPIC: &str = "/rill/inventory-advertise/1";

/// libp2p request-response protocol name for concrete inventory fetches.
pub const REQ_RESP_PROTOCOL: &str = "/rill/inventory-fetch/1";

/// Maximum size of a gossiped advertisement.
pub const MAX_MESSAGE_SIZE: usize = 1024;

/// Maximum size of an inventory fetch request.
pub const MAX_REQUEST_SIZE: usize = 8 * 1024;

/// Maximum size of an inventory fetch response (room for one full block).
pub const MAX_RESPONSE_SIZE: usize = 4 * 1024 * 1024;

/// Protocol codes identifying a request's payload shape, passed as the
/// `code` argument to [`rill_core::adapters::PeerLink::send`].
pub const CODE_GET_BLOCK: u32 = 1;
pub const CODE_GET_TRANSACTION: u32 = 2;
pub const CODE_GET_PRESENCE: u32 = 3;
pub const CODE_GET_KEEP_ALIVE: u32 = 4;
pub const CODE_GET_BLOCK_SIGNATURE: u32 = 5;

/// `include_tx` value requesting a block with its full transaction set.
pub const INCLUDE_TX_FULL: u8 = 2;
/// `include_tx` value requesting a block with no transactions attached.
pub const INCLUDE_TX_NONE: u8 = 0;

/// Encode an [`InventoryItem`] advertisement for gossip.
pub fn encode_inventory_item(item: &InventoryItem) -> Vec<u8> {
    let mut out = Vec::new();
    match item {
        InventoryItem::Block(num) => {
            out.push(1);
            write_varint(*num, &mut out);
        }
        InventoryItem::Transaction(id) => {
            out.push(2);
            write_length_prefixed(id, &mut out);
        }
        InventoryItem::KeepAlive { address, device, last_seen } => {
            out.push(3);
            write_length_prefixed(address.as_bytes(), &mut out);
            write_length_prefixed(device, &mut out);
            out.extend_from_slice(&last_seen.to_le_bytes());
        }
        InventoryItem::BlockSignature { num, hash, signer } => {
            out.push(4);
            write_varint(*num, &mut out);
            out.extend_from_slice(hash.as_bytes());
            write_length_prefixed(signer.as_bytes(), &mut out);
        }
    }
    out
}

/// Decode an [`InventoryItem`] advertisement received over gossip.
pub fn decode_inventory_item(buf: &[u8]) -> Option<InventoryItem> {
    let (&tag, rest) = buf.split_first()?;
    match tag {
        1 => {
            let (num, _) = read_varint(rest)?;
            Some(InventoryItem::Block(num))
        }
        2 => {
            let (id, _) = read_length_prefixed(rest)?;
            Some(InventoryItem::Transaction(id.to_vec()))
        }
        3 => {
            let (addr, n1) = read_length_prefixed(rest)?;
            let (device, n2) = read_length_prefixed(&rest[n1..])?;
            let ts = rest.get(n1 + n2..n1 + n2 + 8)?;
            let last_seen = i64::from_le_bytes(ts.try_into().ok()?);
            let address = Address::new(addr.to_vec()).ok()?;
            Some(InventoryItem::KeepAlive { address, device: device.to_vec(), last_seen })
        }
        4 => {
            let (num, n1) = read_varint(rest)?;
            let hash_bytes = rest.get(n1..n1 + 32)?;
            let hash = Hash256::from_bytes(hash_bytes.try_into().ok()?);
            let (signer, _) = read_length_prefixed(&rest[n1 + 32..])?;
            let signer = Address::new(signer.to_vec()).ok()?;
            Some(InventoryItem::BlockSignature { num, hash, signer })
        }
        _ => None,
    }
}

/// A concrete fetch request, point-to-point to the peer that advertised it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryRequest {
    GetBlock { next_height: u64, include_tx: u8, latest_only: bool },
    GetTransaction { legacy_tx_id: Vec<u8> },
    GetPresence { addr: Vec<u8> },
    GetKeepAlive { addr: Vec<u8>, device: Vec<u8> },
    GetBlockSignature { block_num: u64, addr: Vec<u8> },
}

impl InventoryRequest {
    /// The protocol code this request is sent under.
    pub fn code(&self) -> u32 {
        match self {
            Self::GetBlock { .. } => CODE_GET_BLOCK,
            Self::GetTransaction { .. } => CODE_GET_TRANSACTION,
            Self::GetPresence { .. } => CODE_GET_PRESENCE,
            Self::GetKeepAlive { .. } => CODE_GET_KEEP_ALIVE,
            Self::GetBlockSignature { .. } => CODE_GET_BLOCK_SIGNATURE,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Self::GetBlock { next_height, include_tx, latest_only } => {
                write_varint(*next_height, &mut out);
                out.push(*include_tx);
                out.push(u8::from(*latest_only));
            }
            Self::GetTransaction { legacy_tx_id } => {
                write_length_prefixed(legacy_tx_id, &mut out);
                out.extend_from_slice(&0u64.to_le_bytes());
            }
            Self::GetPresence { addr } => {
                out.extend_from_slice(&(addr.len() as i32).to_le_bytes());
                out.extend_from_slice(addr);
            }
            Self::GetKeepAlive { addr, device } => {
                write_length_prefixed(addr, &mut out);
                write_length_prefixed(device, &mut out);
            }
            Self::GetBlockSignature { block_num, addr } => {
                write_varint(*block_num, &mut out);
                write_length_prefixed(addr, &mut out);
            }
        }
        out
    }

    pub fn decode(code: u32, buf: &[u8]) -> Option<Self> {
        match code {
            CODE_GET_BLOCK => {
                let (next_height, n1) = read_varint(buf)?;
                let include_tx = *buf.get(n1)?;
                let latest_only = *buf.get(n1 + 1)? != 0;
                Some(Self::GetBlock { next_height, include_tx, latest_only })
            }
            CODE_GET_TRANSACTION => {
                let (id, _) = read_length_prefixed(buf)?;
                Some(Self::GetTransaction { legacy_tx_id: id.to_vec() })
            }
            CODE_GET_PRESENCE => {
                if buf.len() < 4 {
                    return None;
                }
                let len = i32::from_le_bytes(buf[0..4].try_into().ok()?) as usize;
                let addr = buf.get(4..4 + len)?.to_vec();
                Some(Self::GetPresence { addr })
            }
            CODE_GET_KEEP_ALIVE => {
                let (addr, n1) = read_length_prefixed(buf)?;
                let (device, _) = read_length_prefixed(&buf[n1..])?;
                Some(Self::GetKeepAlive { addr: addr.to_vec(), device: device.to_vec() })
            }
            CODE_GET_BLOCK_SIGNATURE => {
                let (block_num, n1) = read_varint(buf)?;
                let (addr, _) = read_length_prefixed(&buf[n1..])?;
                Some(Self::GetBlockSignature { block_num, addr: addr.to_vec() })
            }
            _ => None,
        }
    }
}

/// The libp2p request-response `Request` type: a code plus its raw payload,
/// framed as `code (4 bytes LE) | payload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRequest {
    pub code: u32,
    pub payload: Vec<u8>,
}

impl WireRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.payload.len());
        out.extend_from_slice(&self.code.to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < 4 {
            return None;
        }
        let code = u32::from_le_bytes(buf[0..4].try_into().ok()?);
        Some(Self { code, payload: buf[4..].to_vec() })
    }
}

fn encode_opt_bytes(data: &Option<Vec<u8>>, out: &mut Vec<u8>) {
    match data {
        None => out.push(0),
        Some(bytes) => {
            out.push(1);
            write_length_prefixed(bytes, out);
        }
    }
}

fn decode_opt_bytes(buf: &[u8]) -> Option<Option<Vec<u8>>> {
    let (&present, rest) = buf.split_first()?;
    if present == 0 {
        return Some(None);
    }
    let (bytes, _) = read_length_prefixed(rest)?;
    Some(Some(bytes.to_vec()))
}

/// Response to a point-to-point [`InventoryRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryResponse {
    Block(Option<Vec<u8>>),
    Transaction(Option<Vec<u8>>),
    Presence(Option<PresenceInfo>),
    KeepAliveAck,
    BlockSignature(Option<Vec<u8>>),
}

impl InventoryResponse {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Self::Block(data) => {
                out.push(1);
                encode_opt_bytes(data, &mut out);
            }
            Self::Transaction(data) => {
                out.push(2);
                encode_opt_bytes(data, &mut out);
            }
            Self::Presence(info) => {
                out.push(3);
                match info {
                    None => out.push(0),
                    Some(info) => {
                        out.push(1);
                        write_varint(info.addresses.len() as u64, &mut out);
                        for entry in &info.addresses {
                            write_length_prefixed(&entry.device, &mut out);
                            out.extend_from_slice(&entry.last_seen_time.to_le_bytes());
                        }
                    }
                }
            }
            Self::KeepAliveAck => out.push(4),
            Self::BlockSignature(sig) => {
                out.push(5);
                encode_opt_bytes(sig, &mut out);
            }
        }
        out
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        let (&tag, rest) = buf.split_first()?;
        match tag {
            1 => Some(Self::Block(decode_opt_bytes(rest)?)),
            2 => Some(Self::Transaction(decode_opt_bytes(rest)?)),
            3 => {
                let present = *rest.first()?;
                if present == 0 {
                    return Some(Self::Presence(None));
                }
                let mut pos = 1;
                let (count, n) = read_varint(&rest[pos..])?;
                pos += n;
                let mut addresses = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let (device, n1) = read_length_prefixed(&rest[pos..])?;
                    pos += n1;
                    let ts = rest.get(pos..pos + 8)?;
                    let last_seen_time = i64::from_le_bytes(ts.try_into().ok()?);
                    pos += 8;
                    addresses.push(PresenceEntry { device: device.to_vec(), last_seen_time });
                }
                Some(Self::Presence(Some(PresenceInfo { addresses })))
            }
            4 => Some(Self::KeepAliveAck),
            5 => Some(Self::BlockSignature(decode_opt_bytes(rest)?)),
            _ => None,
        }
    }
}

/// Codec for the inventory fetch request-response protocol: a 4-byte
/// big-endian length prefix followed by the encoded payload, in both
/// directions.
#[derive(Debug, Clone, Default)]
pub struct RillCodec;

#[async_trait::async_trait]
impl libp2p::request_response::Codec for RillCodec {
    type Protocol = libp2p::StreamProtocol;
    type Request = WireRequest;
    type Response = InventoryResponse;

    async fn read_request<T>(
        &mut self,
        _protocol: &Self::Protocol,
        io: &mut T,
    ) -> std::io::Result<Self::Request>
    where
        T: libp2p::futures::AsyncRead + Unpin + Send,
    {
        use libp2p::futures::AsyncReadExt;
        let mut len_buf = [0u8; 4];
        io.read_exact(&mut len_buf).await?;
        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_REQUEST_SIZE {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "request too large"));
        }
        let mut buf = vec![0u8; len];
        io.read_exact(&mut buf).await?;
        WireRequest::decode(&buf)
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidData, "malformed request"))
    }

    async fn read_response<T>(
        &mut self,
        _protocol: &Self::Protocol,
        io: &mut T,
    ) -> std::io::Result<Self::Response>
    where
        T: libp2p::futures::AsyncRead + Unpin + Send,
    {
        use libp2p::futures::AsyncReadExt;
        let mut len_buf = [0u8; 4];
        io.read_exact(&mut len_buf).await?;
        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_RESPONSE_SIZE {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "response too large"));
        }
        let mut buf = vec![0u8; len];
        io.read_exact(&mut buf).await?;
        InventoryResponse::decode(&buf)
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidData, "malformed response"))
    }

    async fn write_request<T>(
        &mut self,
        _protocol: &Self::Protocol,
        io: &mut T,
        req: Self::Request,
    ) -> std::io::Result<()>
    where
        T: libp2p::futures::AsyncWrite + Unpin + Send,
    {
        use libp2p::futures::AsyncWriteExt;
        let buf = req.encode();
        if buf.len() > MAX_REQUEST_SIZE {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "request too large"));
        }
        io.write_all(&(buf.len() as u32).to_be_bytes()).await?;
        io.write_all(&buf).await?;
        Ok(())
    }

    async fn write_response<T>(
        &mut self,
        _protocol: &Self::Protocol,
        io: &mut T,
        resp: Self::Response,
    ) -> std::io::Result<()>
    where
        T: libp2p::futures::AsyncWrite + Unpin + Send,
    {
        use libp2p::futures::AsyncWriteExt;
        let buf = resp.encode();
        if buf.len() > MAX_RESPONSE_SIZE {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "response too large"));
        }
        io.write_all(&(buf.len() as u32).to_be_bytes()).await?;
        io.write_all(&buf).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inventory_item_block_roundtrip() {
        let item = InventoryItem::Block(42);
        let encoded = encode_inventory_item(&item);
        assert_eq!(decode_inventory_item(&encoded), Some(item));
    }

    #[test]
    fn inventory_item_transaction_roundtrip() {
        let item = InventoryItem::Transaction(vec![1, 2, 3, 4]);
        let encoded = encode_inventory_item(&item);
        assert_eq!(decode_inventory_item(&encoded), Some(item));
    }

    #[test]
    fn inventory_item_keep_alive_roundtrip() {
        let item = InventoryItem::KeepAlive {
            address: Address::new(vec![9, 9, 9]).unwrap(),
            device: b"phone-1".to_vec(),
            last_seen: 1_700_000_000,
        };
        let encoded = encode_inventory_item(&item);
        assert_eq!(decode_inventory_item(&encoded), Some(item));
    }

    #[test]
    fn inventory_item_block_signature_roundtrip() {
        let item = InventoryItem::BlockSignature {
            num: 100,
            hash: Hash256([0xAB; 32]),
            signer: Address::new(vec![1, 2, 3]).unwrap(),
        };
        let encoded = encode_inventory_item(&item);
        assert_eq!(decode_inventory_item(&encoded), Some(item));
    }

    #[test]
    fn decode_inventory_item_unknown_tag_fails() {
        assert_eq!(decode_inventory_item(&[0xFF]), None);
    }

    #[test]
    fn get_block_request_roundtrip() {
        let req = InventoryRequest::GetBlock { next_height: 7, include_tx: INCLUDE_TX_FULL, latest_only: true };
        let encoded = req.encode();
        assert_eq!(InventoryRequest::decode(req.code(), &encoded), Some(req));
    }

    #[test]
    fn get_transaction_request_roundtrip() {
        let req = InventoryRequest::GetTransaction { legacy_tx_id: b"legacy-id".to_vec() };
        let encoded = req.encode();
        assert_eq!(InventoryRequest::decode(req.code(), &encoded), Some(req));
    }

    #[test]
    fn get_presence_request_roundtrip() {
        let req = InventoryRequest::GetPresence { addr: vec![1, 2, 3, 4, 5] };
        let encoded = req.encode();
        assert_eq!(InventoryRequest::decode(req.code(), &encoded), Some(req));
    }

    #[test]
    fn get_presence_uses_i32_length_prefix() {
        let req = InventoryRequest::GetPresence { addr: vec![0xAA; 10] };
        let encoded = req.encode();
        assert_eq!(i32::from_le_bytes(encoded[0..4].try_into().unwrap()), 10);
    }

    #[test]
    fn get_keep_alive_request_roundtrip() {
        let req = InventoryRequest::GetKeepAlive { addr: vec![1, 2], device: b"dev".to_vec() };
        let encoded = req.encode();
        assert_eq!(InventoryRequest::decode(req.code(), &encoded), Some(req));
    }

    #[test]
    fn get_block_signature_request_roundtrip() {
        let req = InventoryRequest::GetBlockSignature { block_num: 9000, addr: vec![7, 7, 7] };
        let encoded = req.encode();
        assert_eq!(InventoryRequest::decode(req.code(), &encoded), Some(req));
    }

    #[test]
    fn wire_request_roundtrip() {
        let req = WireRequest { code: CODE_GET_BLOCK, payload: vec![1, 2, 3] };
        let encoded = req.encode();
        assert_eq!(WireRequest::decode(&encoded), Some(req));
    }

    #[test]
    fn wire_request_too_short_fails() {
        assert_eq!(WireRequest::decode(&[1, 2]), None);
    }

    #[test]
    fn inventory_response_block_roundtrip() {
        let resp = InventoryResponse::Block(Some(vec![1, 2, 3]));
        let encoded = resp.encode();
        assert_eq!(InventoryResponse::decode(&encoded), Some(resp));
    }

    #[test]
    fn inventory_response_block_absent_roundtrip() {
        let resp = InventoryResponse::Block(None);
        let encoded = resp.encode();
        assert_eq!(InventoryResponse::decode(&encoded), Some(resp));
    }

    #[test]
    fn inventory_response_presence_roundtrip() {
        let resp = InventoryResponse::Presence(Some(PresenceInfo {
            addresses: vec![PresenceEntry { device: b"dev".to_vec(), last_seen_time: 123 }],
        }));
        let encoded = resp.encode();
        assert_eq!(InventoryResponse::decode(&encoded), Some(resp));
    }

    #[test]
    fn inventory_response_presence_absent_roundtrip() {
        let resp = InventoryResponse::Presence(None);
        let encoded = resp.encode();
        assert_eq!(InventoryResponse::decode(&encoded), Some(resp));
    }

    #[test]
    fn inventory_response_keep_alive_ack_roundtrip() {
        let resp = InventoryResponse::KeepAliveAck;
        let encoded = resp.encode();
        assert_eq!(InventoryResponse::decode(&encoded), Some(resp));
    }

    #[test]
    fn inventory_response_block_signature_roundtrip() {
        let resp = InventoryResponse::BlockSignature(Some(vec![0xAA; 64]));
        let encoded = resp.encode();
        assert_eq!(InventoryResponse::decode(&encoded), Some(resp));
    }
}
