//! WSJ entry: the seven tagged mutation kinds, their wire codec, and their
//! apply/revert effects against a [`WalletState`].
//!
//! Tags are fixed at 1–7 and must never be renumbered; they are written as
//! the first four bytes of every encoded entry.

use std::str::FromStr;

use rill_core::address::Address;
use rill_core::crypto::truncated_sha512;
use rill_core::error::{WalletStateError, WsjError};
use rill_core::types::Hash256;
use rust_decimal::Decimal;

use crate::codec::{read_bytes_field, read_i32, write_bytes_field, write_i32};
use crate::state::WalletState;
use crate::wallet::Wallet;

const TAG_BALANCE: i32 = 1;
const TAG_ALLOWED_SIGNER: i32 = 2;
const TAG_REQUIRED_SIGNATURES: i32 = 3;
const TAG_PUBKEY: i32 = 4;
const TAG_DATA: i32 = 5;
const TAG_CREATE: i32 = 6;
const TAG_DESTROY: i32 = 7;

/// One reversible wallet-state mutation. Every variant carries enough prior
/// state to reverse itself without consulting other entries.
#[derive(Clone, Debug, PartialEq)]
pub enum JournalEntry {
    Balance {
        target: Address,
        old_balance: Decimal,
        new_balance: Decimal,
    },
    /// `adjust_signers` is only meaningful (and only written to the wire)
    /// when `adding = false`. `Some(old_count)` carries the
    /// `required_signatures` value from just before the decrement, so
    /// revert restores it exactly instead of re-incrementing by one
    /// (which would not floor back to the pre-apply value).
    AllowedSigner {
        target: Address,
        signer: Address,
        adding: bool,
        adjust_signers: Option<u8>,
    },
    RequiredSignatures {
        target: Address,
        old_count: u8,
        new_count: u8,
    },
    Pubkey {
        target: Address,
        pubkey: Vec<u8>,
    },
    Data {
        target: Address,
        old_data: Option<Vec<u8>>,
        new_data: Option<Vec<u8>>,
    },
    Create {
        target: Address,
    },
    Destroy {
        target: Address,
        snapshot: Box<Wallet>,
    },
}

impl JournalEntry {
    /// The wallet this entry targets.
    pub fn target(&self) -> &Address {
        match self {
            JournalEntry::Balance { target, .. }
            | JournalEntry::AllowedSigner { target, .. }
            | JournalEntry::RequiredSignatures { target, .. }
            | JournalEntry::Pubkey { target, .. }
            | JournalEntry::Data { target, .. }
            | JournalEntry::Create { target }
            | JournalEntry::Destroy { target, .. } => target,
        }
    }

    /// Apply this entry's forward effect to `state`.
    pub fn apply(&self, state: &mut WalletState) -> Result<(), WsjError> {
        match self {
            JournalEntry::Balance { target, new_balance, .. } => {
                state.set_balance_internal(target, *new_balance)?;
            }
            JournalEntry::AllowedSigner {
                target,
                signer,
                adding,
                adjust_signers,
            } => {
                state.add_allowed_signer_internal(target, signer.clone(), *adding, false)?;
                if !*adding && adjust_signers.is_some() {
                    decrement_required_signatures(state, target)?;
                }
            }
            JournalEntry::RequiredSignatures { target, new_count, .. } => {
                state.set_required_signatures_internal(target, *new_count)?;
            }
            JournalEntry::Pubkey { target, pubkey } => {
                state.set_pubkey_internal(target, Some(pubkey.clone()), false)?;
            }
            JournalEntry::Data { target, old_data, new_data } => {
                state.set_user_data_internal(target, new_data.clone(), old_data.clone())?;
            }
            JournalEntry::Create { .. } => {
                // No-op: the public `create_wallet` mutator already inserted
                // the wallet before this entry was appended.
            }
            JournalEntry::Destroy { target, .. } => {
                state.remove_wallet_internal(target)?;
            }
        }
        Ok(())
    }

    /// Apply this entry's reverse effect to `state`.
    pub fn revert(&self, state: &mut WalletState) -> Result<(), WsjError> {
        match self {
            JournalEntry::Balance { target, old_balance, .. } => {
                state.set_balance_internal(target, *old_balance)?;
            }
            JournalEntry::AllowedSigner {
                target,
                signer,
                adding,
                adjust_signers,
            } => {
                state.add_allowed_signer_internal(target, signer.clone(), *adding, true)?;
                if !*adding {
                    if let Some(old_count) = adjust_signers {
                        state.set_required_signatures_internal(target, *old_count)?;
                    }
                }
            }
            JournalEntry::RequiredSignatures { target, old_count, .. } => {
                state.set_required_signatures_internal(target, *old_count)?;
            }
            JournalEntry::Pubkey { target, .. } => {
                state.set_pubkey_internal(target, None, true)?;
            }
            JournalEntry::Data { target, old_data, new_data } => {
                state.set_user_data_internal(target, old_data.clone(), new_data.clone())?;
            }
            JournalEntry::Create { target } => {
                state.remove_wallet_internal(target)?;
            }
            JournalEntry::Destroy { target, snapshot } => {
                state.set_wallet_internal(target, (**snapshot).clone())?;
            }
        }
        Ok(())
    }

    /// Positional little-endian encoding: `i32 tag` followed by the
    /// variant's fields in the order listed above.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            JournalEntry::Balance { target, old_balance, new_balance } => {
                write_i32(TAG_BALANCE, &mut out);
                write_bytes_field(Some(target.as_bytes()), &mut out);
                write_decimal(*old_balance, &mut out);
                write_decimal(*new_balance, &mut out);
            }
            JournalEntry::AllowedSigner { target, signer, adding, adjust_signers } => {
                write_i32(TAG_ALLOWED_SIGNER, &mut out);
                write_bytes_field(Some(target.as_bytes()), &mut out);
                write_bytes_field(Some(signer.as_bytes()), &mut out);
                out.push(*adding as u8);
                if !*adding {
                    out.push(adjust_signers.is_some() as u8);
                    if let Some(old_count) = adjust_signers {
                        out.push(*old_count);
                    }
                }
            }
            JournalEntry::RequiredSignatures { target, old_count, new_count } => {
                write_i32(TAG_REQUIRED_SIGNATURES, &mut out);
                write_bytes_field(Some(target.as_bytes()), &mut out);
                out.push(*old_count);
                out.push(*new_count);
            }
            JournalEntry::Pubkey { target, pubkey } => {
                write_i32(TAG_PUBKEY, &mut out);
                write_bytes_field(Some(target.as_bytes()), &mut out);
                write_bytes_field(Some(pubkey), &mut out);
            }
            JournalEntry::Data { target, old_data, new_data } => {
                write_i32(TAG_DATA, &mut out);
                write_bytes_field(Some(target.as_bytes()), &mut out);
                // New-before-old on the wire; the decoder must match.
                write_bytes_field(new_data.as_deref(), &mut out);
                write_bytes_field(old_data.as_deref(), &mut out);
            }
            JournalEntry::Create { target } => {
                write_i32(TAG_CREATE, &mut out);
                write_bytes_field(Some(target.as_bytes()), &mut out);
            }
            JournalEntry::Destroy { target, snapshot } => {
                write_i32(TAG_DESTROY, &mut out);
                write_bytes_field(Some(target.as_bytes()), &mut out);
                write_bytes_field(Some(&snapshot.encode()), &mut out);
            }
        }
        out
    }

    /// Decode one entry from the front of `buf`, returning it and the
    /// number of bytes consumed.
    ///
    /// The source this protocol was distilled from has a `Data` decoder
    /// that mistakenly peeks the tag as `Pubkey`; that defect is not
    /// reproduced here — decoding always dispatches on the tag actually
    /// written.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), WsjError> {
        let (tag, mut pos) = read_i32(buf)?;

        let target = {
            let (bytes, n) = read_bytes_field(&buf[pos..])?;
            pos += n;
            Address::new(bytes.ok_or(WsjError::MissingTarget)?)
                .map_err(|_| WsjError::MissingTarget)?
        };

        let entry = match tag {
            TAG_BALANCE => {
                let (old_balance, n) = read_decimal(&buf[pos..])?;
                pos += n;
                let (new_balance, n) = read_decimal(&buf[pos..])?;
                pos += n;
                JournalEntry::Balance { target, old_balance, new_balance }
            }
            TAG_ALLOWED_SIGNER => {
                let (signer_bytes, n) = read_bytes_field(&buf[pos..])?;
                pos += n;
                let signer = Address::new(signer_bytes.ok_or(WsjError::Truncated)?)
                    .map_err(|_| WsjError::Truncated)?;
                let adding = *buf.get(pos).ok_or(WsjError::Truncated)? != 0;
                pos += 1;
                let adjust_signers = if !adding {
                    let present = *buf.get(pos).ok_or(WsjError::Truncated)? != 0;
                    pos += 1;
                    if present {
                        let old_count = *buf.get(pos).ok_or(WsjError::Truncated)?;
                        pos += 1;
                        Some(old_count)
                    } else {
                        None
                    }
                } else {
                    None
                };
                JournalEntry::AllowedSigner { target, signer, adding, adjust_signers }
            }
            TAG_REQUIRED_SIGNATURES => {
                let old_count = *buf.get(pos).ok_or(WsjError::Truncated)?;
                pos += 1;
                let new_count = *buf.get(pos).ok_or(WsjError::Truncated)?;
                pos += 1;
                JournalEntry::RequiredSignatures { target, old_count, new_count }
            }
            TAG_PUBKEY => {
                let (bytes, n) = read_bytes_field(&buf[pos..])?;
                pos += n;
                JournalEntry::Pubkey {
                    target,
                    pubkey: bytes.unwrap_or_default(),
                }
            }
            TAG_DATA => {
                let (new_data, n) = read_bytes_field(&buf[pos..])?;
                pos += n;
                let (old_data, n) = read_bytes_field(&buf[pos..])?;
                pos += n;
                JournalEntry::Data { target, old_data, new_data }
            }
            TAG_CREATE => JournalEntry::Create { target },
            TAG_DESTROY => {
                let (snapshot_bytes, n) = read_bytes_field(&buf[pos..])?;
                pos += n;
                let (wallet, _) = Wallet::decode(&snapshot_bytes.ok_or(WsjError::Truncated)?)?;
                JournalEntry::Destroy { target, snapshot: Box::new(wallet) }
            }
            other => return Err(WsjError::CorruptEntry { tag: other }),
        };

        Ok((entry, pos))
    }

    /// Audit/transport checksum: the first 32 bytes of `SHA-512` over the
    /// encoded entry. Never used for journal equality.
    pub fn checksum(&self) -> Hash256 {
        truncated_sha512(&self.encode())
    }
}

fn decrement_required_signatures(state: &mut WalletState, target: &Address) -> Result<(), WsjError> {
    let current = state.required_signatures_of(target)?;
    let decremented = current.saturating_sub(1).max(1);
    state.set_required_signatures_internal(target, decremented)
}

fn write_decimal(value: Decimal, out: &mut Vec<u8>) {
    write_bytes_field(Some(value.to_string().as_bytes()), out);
}

fn read_decimal(buf: &[u8]) -> Result<(Decimal, usize), WsjError> {
    let (bytes, n) = read_bytes_field(buf)?;
    let bytes = bytes.ok_or(WsjError::Truncated)?;
    let s = String::from_utf8(bytes).map_err(|_| WsjError::Truncated)?;
    let value = Decimal::from_str(&s).map_err(|_| WsjError::Truncated)?;
    Ok((value, n))
}

impl From<WalletStateError> for WsjError {
    fn from(e: WalletStateError) -> Self {
        WsjError::Wallet(e)
    }
}
