//! The `Wallet` record: balance, multisig configuration, and opaque data.

use std::collections::BTreeSet;
use std::str::FromStr;

use rill_core::address::Address;
use rust_decimal::Decimal;

use crate::codec::{read_bytes_field, read_i32, write_bytes_field, write_i32};
use rill_core::error::WsjError;

/// A wallet record: balance, optional signing key, multisig configuration,
/// and an opaque user-data blob.
///
/// Invariants (checked by every constructor and mutator):
/// `required_signatures >= 1` and `required_signatures <= allowed_signers.len() + 1`
/// (the wallet's own key counts toward the threshold).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Wallet {
    pub id: Address,
    pub balance: Decimal,
    pub public_key: Option<Vec<u8>>,
    pub allowed_signers: BTreeSet<Address>,
    pub required_signatures: u8,
    pub user_data: Option<Vec<u8>>,
}

impl Wallet {
    /// Create a fresh wallet with a zero balance, a single (implicit) signer,
    /// and no multisig configuration.
    pub fn new(id: Address) -> Self {
        Self {
            id,
            balance: Decimal::ZERO,
            public_key: None,
            allowed_signers: BTreeSet::new(),
            required_signatures: 1,
            user_data: None,
        }
    }

    /// Validate the multisig invariants. Called after any mutation that
    /// changes `allowed_signers` or `required_signatures`.
    pub fn check_invariants(&self) -> Result<(), rill_core::error::WalletStateError> {
        if self.required_signatures == 0 {
            return Err(rill_core::error::WalletStateError::RequiredSignaturesZero);
        }
        let max = (self.allowed_signers.len() as u8).saturating_add(1);
        if self.required_signatures > max {
            return Err(rill_core::error::WalletStateError::RequiredSignaturesTooHigh {
                required: self.required_signatures,
                max,
            });
        }
        Ok(())
    }

    /// Whether this wallet is eligible for pruning: zero balance, no
    /// multisig signers, no pubkey, and no user data. Pruning itself is not
    /// performed automatically anywhere in this crate.
    pub fn is_prunable(&self) -> bool {
        self.balance.is_zero()
            && self.allowed_signers.is_empty()
            && self.required_signatures == 1
            && self.public_key.is_none()
            && self.user_data.is_none()
    }

    /// Encode this wallet using its own positional little-endian codec, the
    /// same field order as the struct definition. Used to embed a full
    /// wallet snapshot inside a `Destroy` journal entry.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_bytes_field(Some(self.id.as_bytes()), &mut out);
        write_bytes_field(Some(self.balance.to_string().as_bytes()), &mut out);
        write_bytes_field(self.public_key.as_deref(), &mut out);
        write_i32(self.allowed_signers.len() as i32, &mut out);
        for signer in &self.allowed_signers {
            write_bytes_field(Some(signer.as_bytes()), &mut out);
        }
        out.push(self.required_signatures);
        write_bytes_field(self.user_data.as_deref(), &mut out);
        out
    }

    /// Decode a wallet previously written by [`Wallet::encode`]. Returns the
    /// wallet and the number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), WsjError> {
        let mut pos = 0usize;

        let (id_bytes, n) = read_bytes_field(&buf[pos..])?;
        pos += n;
        let id = Address::new(id_bytes.ok_or(WsjError::MissingTarget)?)
            .map_err(|_| WsjError::MissingTarget)?;

        let (balance_bytes, n) = read_bytes_field(&buf[pos..])?;
        pos += n;
        let balance_str = String::from_utf8(balance_bytes.ok_or(WsjError::Truncated)?)
            .map_err(|_| WsjError::Truncated)?;
        let balance = Decimal::from_str(&balance_str).map_err(|_| WsjError::Truncated)?;

        let (public_key, n) = read_bytes_field(&buf[pos..])?;
        pos += n;

        let (count, n) = read_i32(&buf[pos..])?;
        pos += n;
        let mut allowed_signers = BTreeSet::new();
        for _ in 0..count {
            let (signer_bytes, n) = read_bytes_field(&buf[pos..])?;
            pos += n;
            let signer = Address::new(signer_bytes.ok_or(WsjError::Truncated)?)
                .map_err(|_| WsjError::Truncated)?;
            allowed_signers.insert(signer);
        }

        let required_signatures = *buf.get(pos).ok_or(WsjError::Truncated)?;
        pos += 1;

        let (user_data, n) = read_bytes_field(&buf[pos..])?;
        pos += n;

        Ok((
            Self {
                id,
                balance,
                public_key,
                allowed_signers,
                required_signatures,
                user_data,
            },
            pos,
        ))
    }
}
