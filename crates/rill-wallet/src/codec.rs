//! Positional little-endian framing shared by the wallet codec and the WSJ
//! entry codec: every byte-string field is preceded by an `i32` length
//! (`0` means absent, no bytes follow).

use rill_core::error::WsjError;

pub fn write_i32(value: i32, out: &mut Vec<u8>) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn read_i32(buf: &[u8]) -> Result<(i32, usize), WsjError> {
    let bytes: [u8; 4] = buf.get(..4).ok_or(WsjError::Truncated)?.try_into().unwrap();
    Ok((i32::from_le_bytes(bytes), 4))
}

/// Write an optional byte-string field: `i32 len | len bytes`, `len = 0`
/// meaning absent (an empty-but-present slice is indistinguishable from
/// absent, matching the wire contract).
pub fn write_bytes_field(field: Option<&[u8]>, out: &mut Vec<u8>) {
    match field {
        Some(bytes) if !bytes.is_empty() => {
            write_i32(bytes.len() as i32, out);
            out.extend_from_slice(bytes);
        }
        _ => write_i32(0, out),
    }
}

/// Read a length-prefixed optional byte-string field, returning the bytes
/// (`None` if the length was `0`) and the total bytes consumed.
pub fn read_bytes_field(buf: &[u8]) -> Result<(Option<Vec<u8>>, usize), WsjError> {
    let (len, prefix) = read_i32(buf)?;
    if len < 0 {
        return Err(WsjError::Truncated);
    }
    if len == 0 {
        return Ok((None, prefix));
    }
    let len = len as usize;
    let end = prefix.checked_add(len).ok_or(WsjError::Truncated)?;
    let bytes = buf.get(prefix..end).ok_or(WsjError::Truncated)?.to_vec();
    Ok((Some(bytes), end))
}
