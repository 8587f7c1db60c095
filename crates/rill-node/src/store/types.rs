//! Row types persisted by the shard store, mirroring the stored-block and
//! stored-transaction field lists, plus their positional byte encodings
//! (the value bytes written under each shard's `blocks`/`transactions`
//! column family).

use std::str::FromStr;

use rill_core::address::Address;
use rill_core::types::Hash256;
use rust_decimal::Decimal;

use super::encoding::{
    decode_addr_amount_list, decode_signatures_field, decode_super_block_segments,
    decode_tx_ids_field, encode_addr_amount_list, encode_signatures_field,
    encode_super_block_segments, encode_tx_ids_field, shuffle, unshuffle,
};

fn write_i32(v: i32, out: &mut Vec<u8>) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn read_i32(buf: &[u8], pos: &mut usize) -> i32 {
    let v = i32::from_le_bytes(buf[*pos..*pos + 4].try_into().unwrap());
    *pos += 4;
    v
}

fn write_u64(v: u64, out: &mut Vec<u8>) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn read_u64(buf: &[u8], pos: &mut usize) -> u64 {
    let v = u64::from_le_bytes(buf[*pos..*pos + 8].try_into().unwrap());
    *pos += 8;
    v
}

fn write_i64(v: i64, out: &mut Vec<u8>) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn read_i64(buf: &[u8], pos: &mut usize) -> i64 {
    let v = i64::from_le_bytes(buf[*pos..*pos + 8].try_into().unwrap());
    *pos += 8;
    v
}

fn write_bytes_field(bytes: &[u8], out: &mut Vec<u8>) {
    write_i32(bytes.len() as i32, out);
    out.extend_from_slice(bytes);
}

fn read_bytes_field<'a>(buf: &'a [u8], pos: &mut usize) -> &'a [u8] {
    let len = read_i32(buf, pos) as usize;
    let bytes = &buf[*pos..*pos + len];
    *pos += len;
    bytes
}

fn write_text_field(s: &str, out: &mut Vec<u8>) {
    write_bytes_field(s.as_bytes(), out);
}

fn read_text_field(buf: &[u8], pos: &mut usize) -> String {
    String::from_utf8_lossy(read_bytes_field(buf, pos)).into_owned()
}

fn write_hash(h: &Hash256, out: &mut Vec<u8>) {
    out.extend_from_slice(h.as_bytes());
}

fn read_hash(buf: &[u8], pos: &mut usize) -> Hash256 {
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&buf[*pos..*pos + 32]);
    *pos += 32;
    Hash256::from_bytes(bytes)
}

fn write_decimal(d: Decimal, out: &mut Vec<u8>) {
    write_text_field(&d.to_string(), out);
}

fn read_decimal(buf: &[u8], pos: &mut usize) -> Decimal {
    Decimal::from_str(&read_text_field(buf, pos)).unwrap_or(Decimal::ZERO)
}

fn write_option_hash(h: Option<&Hash256>, out: &mut Vec<u8>) {
    match h {
        Some(h) => {
            out.push(1);
            write_hash(h, out);
        }
        None => out.push(0),
    }
}

fn read_option_hash(buf: &[u8], pos: &mut usize) -> Option<Hash256> {
    let present = buf[*pos];
    *pos += 1;
    if present == 1 {
        Some(read_hash(buf, pos))
    } else {
        None
    }
}

fn write_option_bytes(b: Option<&[u8]>, out: &mut Vec<u8>) {
    match b {
        Some(b) if !b.is_empty() => write_bytes_field(b, out),
        _ => write_i32(0, out),
    }
}

fn read_option_bytes(buf: &[u8], pos: &mut usize) -> Option<Vec<u8>> {
    let bytes = read_bytes_field(buf, pos);
    if bytes.is_empty() {
        None
    } else {
        Some(bytes.to_vec())
    }
}

/// One row of `blocks`: a fully applied block's persisted metadata, mirroring
/// `spec.md`'s stored-block field list field-for-field.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredBlock {
    pub num: u64,
    pub checksum: Hash256,
    pub prev_checksum: Hash256,
    pub wallet_state_checksum: Hash256,
    pub sig_freeze_checksum: Hash256,
    pub difficulty: u64,
    pub pow_field: Vec<u8>,
    pub tx_ids: Vec<Vec<u8>>,
    pub signatures: Vec<(Option<Vec<u8>>, Vec<u8>)>,
    pub timestamp: i64,
    pub version: u32,
    pub last_super_block_checksum: Option<Hash256>,
    pub last_super_block_num: u64,
    pub super_block_segments: Vec<(u64, Hash256)>,
    pub compacted_sigs: bool,
    pub block_proposer: Option<Address>,
}

impl StoredBlock {
    pub fn is_super_block(&self) -> bool {
        self.last_super_block_checksum.is_some()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_u64(self.num, &mut out);
        write_hash(&self.checksum, &mut out);
        write_hash(&self.prev_checksum, &mut out);
        write_hash(&self.wallet_state_checksum, &mut out);
        write_hash(&self.sig_freeze_checksum, &mut out);
        write_u64(self.difficulty, &mut out);
        write_bytes_field(&self.pow_field, &mut out);
        write_text_field(&encode_tx_ids_field(&self.tx_ids), &mut out);
        write_text_field(&encode_signatures_field(&self.signatures), &mut out);
        write_i64(self.timestamp, &mut out);
        write_i32(self.version as i32, &mut out);
        write_option_hash(self.last_super_block_checksum.as_ref(), &mut out);
        write_u64(self.last_super_block_num, &mut out);
        write_bytes_field(&encode_super_block_segments(&self.super_block_segments), &mut out);
        out.push(self.compacted_sigs as u8);
        write_option_bytes(self.block_proposer.as_ref().map(|a| a.as_bytes()), &mut out);
        out
    }

    pub fn decode(buf: &[u8]) -> Self {
        let mut pos = 0usize;
        let num = read_u64(buf, &mut pos);
        let checksum = read_hash(buf, &mut pos);
        let prev_checksum = read_hash(buf, &mut pos);
        let wallet_state_checksum = read_hash(buf, &mut pos);
        let sig_freeze_checksum = read_hash(buf, &mut pos);
        let difficulty = read_u64(buf, &mut pos);
        let pow_field = read_bytes_field(buf, &mut pos).to_vec();
        let tx_ids = decode_tx_ids_field(&read_text_field(buf, &mut pos));
        let signatures = decode_signatures_field(&read_text_field(buf, &mut pos));
        let timestamp = read_i64(buf, &mut pos);
        let version = read_i32(buf, &mut pos) as u32;
        let last_super_block_checksum = read_option_hash(buf, &mut pos);
        let last_super_block_num = read_u64(buf, &mut pos);
        let super_block_segments = decode_super_block_segments(read_bytes_field(buf, &mut pos));
        let compacted_sigs = buf[pos] != 0;
        pos += 1;
        let block_proposer = read_option_bytes(buf, &mut pos).and_then(|b| Address::new(b).ok());

        Self {
            num,
            checksum,
            prev_checksum,
            wallet_state_checksum,
            sig_freeze_checksum,
            difficulty,
            pow_field,
            tx_ids,
            signatures,
            timestamp,
            version,
            last_super_block_checksum,
            last_super_block_num,
            super_block_segments,
            compacted_sigs,
            block_proposer,
        }
    }
}

/// One row of `transactions`, mirroring `spec.md`'s stored-transaction field
/// list field-for-field. `data` is byte-reversed ("shuffled") on encode and
/// un-reversed on decode, a storage obfuscation convention with no
/// cryptographic purpose.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredTransaction {
    pub id: Vec<u8>,
    pub tx_type: u32,
    pub amount: Decimal,
    pub fee: Decimal,
    pub to_list: Vec<(Address, Decimal)>,
    pub from_list: Vec<(Address, Decimal)>,
    pub data_checksum: Option<Hash256>,
    pub data: Option<Vec<u8>>,
    pub block_height: u64,
    pub nonce: u32,
    pub timestamp: i64,
    pub checksum: Hash256,
    pub signature: Vec<u8>,
    pub pubkey: Option<Vec<u8>>,
    pub applied: u64,
    pub version: u32,
}

impl StoredTransaction {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_bytes_field(&self.id, &mut out);
        write_i32(self.tx_type as i32, &mut out);
        write_decimal(self.amount, &mut out);
        write_decimal(self.fee, &mut out);
        write_text_field(&encode_addr_amount_list(&self.to_list), &mut out);
        write_text_field(&encode_addr_amount_list(&self.from_list), &mut out);
        write_option_hash(self.data_checksum.as_ref(), &mut out);
        let shuffled = self.data.as_deref().map(shuffle);
        write_option_bytes(shuffled.as_deref(), &mut out);
        write_u64(self.block_height, &mut out);
        write_i32(self.nonce as i32, &mut out);
        write_i64(self.timestamp, &mut out);
        write_hash(&self.checksum, &mut out);
        write_bytes_field(&self.signature, &mut out);
        write_option_bytes(self.pubkey.as_deref(), &mut out);
        write_u64(self.applied, &mut out);
        write_i32(self.version as i32, &mut out);
        out
    }

    pub fn decode(buf: &[u8]) -> Self {
        let mut pos = 0usize;
        let id = read_bytes_field(buf, &mut pos).to_vec();
        let tx_type = read_i32(buf, &mut pos) as u32;
        let amount = read_decimal(buf, &mut pos);
        let fee = read_decimal(buf, &mut pos);
        let to_list = decode_addr_amount_list(&read_text_field(buf, &mut pos));
        let from_list = decode_addr_amount_list(&read_text_field(buf, &mut pos));
        let data_checksum = read_option_hash(buf, &mut pos);
        let data = read_option_bytes(buf, &mut pos).map(|b| unshuffle(&b));
        let block_height = read_u64(buf, &mut pos);
        let nonce = read_i32(buf, &mut pos) as u32;
        let timestamp = read_i64(buf, &mut pos);
        let checksum = read_hash(buf, &mut pos);
        let signature = read_bytes_field(buf, &mut pos).to_vec();
        let pubkey = read_option_bytes(buf, &mut pos);
        let applied = read_u64(buf, &mut pos);
        let version = read_i32(buf, &mut pos) as u32;

        Self {
            id,
            tx_type,
            amount,
            fee,
            to_list,
            from_list,
            data_checksum,
            data,
            block_height,
            nonce,
            timestamp,
            checksum,
            signature,
            pubkey,
            applied,
            version,
        }
    }
}
