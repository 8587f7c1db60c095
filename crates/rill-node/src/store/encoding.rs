//! Wire/row encoding conventions for the shard store: the delimited text
//! fields and the byte-reversal "shuffle" convention, preserved bit-for-bit
//! since other nodes on the network depend on them, not for any
//! cryptographic purpose.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use rill_core::address::Address;
use rill_core::constants::{ABSENT_PUBKEY_MARKER, LIST_FIELD_SEP, PAIR_FIELD_SEP};
use rill_core::types::Hash256;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Byte-reverse a data blob before writing it to the store. Self-inverse:
/// calling this twice returns the original bytes. No cryptographic purpose;
/// a storage obfuscation convention that must be preserved exactly.
pub fn shuffle(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    out.reverse();
    out
}

/// Inverse of [`shuffle`] — provided separately for call-site clarity even
/// though the operation is identical.
pub fn unshuffle(data: &[u8]) -> Vec<u8> {
    shuffle(data)
}

/// Encode a set of transaction ids as the delimited `transactions` text
/// field: a leading separator, then each id's base64 legacy form joined by
/// `||`.
pub fn encode_tx_ids_field(ids: &[Vec<u8>]) -> String {
    let mut out = String::new();
    for id in ids {
        out.push_str(LIST_FIELD_SEP);
        out.push_str(&BASE64.encode(id));
    }
    out
}

/// Decode a `transactions` text field back into binary transaction ids.
/// Splits on `||`, skipping the leading empty element.
pub fn decode_tx_ids_field(field: &str) -> Vec<Vec<u8>> {
    field
        .split(LIST_FIELD_SEP)
        .filter(|s| !s.is_empty())
        .filter_map(|s| BASE64.decode(s).ok())
        .collect()
}

/// Encode the ordered `(pubkey?, signature)` list as the delimited
/// `signatures` text field. An absent pubkey is written as the literal `0`.
pub fn encode_signatures_field(signatures: &[(Option<Vec<u8>>, Vec<u8>)]) -> String {
    let mut out = String::new();
    for (pubkey, signature) in signatures {
        out.push_str(LIST_FIELD_SEP);
        match pubkey {
            Some(pk) => out.push_str(&BASE64.encode(pk)),
            None => out.push_str(ABSENT_PUBKEY_MARKER),
        }
        out.push(PAIR_FIELD_SEP);
        out.push_str(&BASE64.encode(signature));
    }
    out
}

/// Decode a `signatures` text field back into `(pubkey?, signature)` pairs.
/// Duplicate signatures from the same signer (identified by pubkey bytes)
/// are filtered, keeping the first occurrence — a field written by another
/// node is not trusted to have deduped on its own.
pub fn decode_signatures_field(field: &str) -> Vec<(Option<Vec<u8>>, Vec<u8>)> {
    let mut seen_signers: Vec<Vec<u8>> = Vec::new();
    field
        .split(LIST_FIELD_SEP)
        .filter(|s| !s.is_empty())
        .filter_map(|entry| {
            let (pk_part, sig_part) = entry.split_once(PAIR_FIELD_SEP)?;
            let pubkey = if pk_part == ABSENT_PUBKEY_MARKER {
                None
            } else {
                BASE64.decode(pk_part).ok()
            };
            if let Some(pk) = &pubkey {
                if seen_signers.contains(pk) {
                    return None;
                }
                seen_signers.push(pk.clone());
            }
            let signature = BASE64.decode(sig_part).ok()?;
            Some((pubkey, signature))
        })
        .collect()
}

/// Encode an ordered `(Address, Decimal)` map as the delimited
/// `toList`/`fromList` text field: `||addr_b58:amount_b64`.
pub fn encode_addr_amount_list(entries: &[(Address, Decimal)]) -> String {
    let mut out = String::new();
    for (addr, amount) in entries {
        out.push_str(LIST_FIELD_SEP);
        out.push_str(&addr.to_base58());
        out.push(PAIR_FIELD_SEP);
        out.push_str(&BASE64.encode(amount.to_string().as_bytes()));
    }
    out
}

/// Decode a `toList`/`fromList` text field back into `(Address, Decimal)` pairs.
pub fn decode_addr_amount_list(field: &str) -> Vec<(Address, Decimal)> {
    field
        .split(LIST_FIELD_SEP)
        .filter(|s| !s.is_empty())
        .filter_map(|entry| {
            let (addr_part, amount_part) = entry.split_once(PAIR_FIELD_SEP)?;
            let addr = Address::from_base58(addr_part).ok()?;
            let amount_bytes = BASE64.decode(amount_part).ok()?;
            let amount_str = String::from_utf8(amount_bytes).ok()?;
            let amount = Decimal::from_str(&amount_str).ok()?;
            Some((addr, amount))
        })
        .collect()
}

/// Encode the `super_block_segments` BLOB: `u64 num | i32 len | bytes checksum`
/// concatenated for each segment.
pub fn encode_super_block_segments(segments: &[(u64, Hash256)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (num, checksum) in segments {
        out.extend_from_slice(&num.to_le_bytes());
        out.extend_from_slice(&(checksum.as_bytes().len() as i32).to_le_bytes());
        out.extend_from_slice(checksum.as_bytes());
    }
    out
}

/// Decode the `super_block_segments` BLOB. `i` advances exactly `8 + 4 + len`
/// per segment; a malformed trailing fragment is dropped rather than erroring.
pub fn decode_super_block_segments(blob: &[u8]) -> Vec<(u64, Hash256)> {
    let mut segments = Vec::new();
    let mut i = 0usize;
    while i + 12 <= blob.len() {
        let num = u64::from_le_bytes(blob[i..i + 8].try_into().unwrap());
        let len = i32::from_le_bytes(blob[i + 8..i + 12].try_into().unwrap()) as usize;
        i += 12;
        if i + len > blob.len() || len != 32 {
            break;
        }
        let mut checksum = [0u8; 32];
        checksum.copy_from_slice(&blob[i..i + len]);
        segments.push((num, Hash256::from_bytes(checksum)));
        i += len;
    }
    segments
}
