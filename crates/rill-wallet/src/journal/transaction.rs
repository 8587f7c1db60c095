//! A WSJ transaction: an ordered batch of entries sharing a transaction
//! number.

use std::collections::HashSet;

use rill_core::address::Address;
use rill_core::constants::AFFECTED_WALLETS_VERSION_CUTOFF;
use rill_core::error::WsjError;

use crate::codec::write_i32;
use crate::journal::entry::JournalEntry;
use crate::state::WalletState;

#[derive(Clone, Debug, PartialEq)]
pub struct JournalTransaction {
    pub number: u64,
    pub entries: Vec<JournalEntry>,
}

impl JournalTransaction {
    pub fn new(number: u64) -> Self {
        Self { number, entries: Vec::new() }
    }

    /// Append an entry to the end of this transaction, preserving order.
    pub fn append(&mut self, entry: JournalEntry) {
        self.entries.push(entry);
    }

    /// Apply every entry in insertion order. Stops at the first failure and
    /// returns `false` without reverting anything already applied; the
    /// caller is responsible for calling [`Self::revert`] on a
    /// partially-applied transaction.
    pub fn apply(&self, state: &mut WalletState) -> bool {
        for entry in &self.entries {
            if let Err(err) = entry.apply(state) {
                tracing::warn!(transaction = self.number, ?err, "journal entry apply failed");
                return false;
            }
        }
        true
    }

    /// Revert every entry in reverse insertion order. Unlike [`Self::apply`],
    /// this is best-effort: a failing entry is logged and skipped, and every
    /// entry is always attempted. Always returns `true`.
    pub fn revert(&self, state: &mut WalletState) -> bool {
        for entry in self.entries.iter().rev() {
            if let Err(err) = entry.revert(state) {
                tracing::warn!(transaction = self.number, ?err, "journal entry revert failed");
            }
        }
        true
    }

    /// The distinct wallets touched by this transaction, dispatched on
    /// `block_version`: legacy blocks (`< 10`) sort and dedup; current
    /// blocks (`>= 10`) dedup while preserving first-occurrence order. These
    /// are two separate code paths rather than a single "maybe sort" flag,
    /// since the two orderings are both load-bearing for different block
    /// versions and must never be silently conflated.
    pub fn affected_wallets(&self, block_version: u32) -> Vec<Address> {
        if block_version < AFFECTED_WALLETS_VERSION_CUTOFF {
            self.affected_wallets_sorted()
        } else {
            self.affected_wallets_ordered()
        }
    }

    fn affected_wallets_sorted(&self) -> Vec<Address> {
        let mut wallets: Vec<Address> = self.entries.iter().map(|e| e.target().clone()).collect();
        wallets.sort();
        wallets.dedup();
        wallets
    }

    fn affected_wallets_ordered(&self) -> Vec<Address> {
        let mut seen = HashSet::new();
        let mut wallets = Vec::new();
        for entry in &self.entries {
            let target = entry.target();
            if seen.insert(target.clone()) {
                wallets.push(target.clone());
            }
        }
        wallets
    }

    /// Binary layout: `u64 number | i32 count | entries...`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.number.to_le_bytes());
        write_i32(self.entries.len() as i32, &mut out);
        for entry in &self.entries {
            out.extend_from_slice(&entry.encode());
        }
        out
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize), WsjError> {
        let number_bytes: [u8; 8] = buf.get(..8).ok_or(WsjError::Truncated)?.try_into().unwrap();
        let number = u64::from_le_bytes(number_bytes);
        let mut pos = 8;

        let (count, n) = crate::codec::read_i32(&buf[pos..])?;
        pos += n;
        if count < 0 {
            return Err(WsjError::Truncated);
        }

        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (entry, n) = JournalEntry::decode(&buf[pos..])?;
            pos += n;
            entries.push(entry);
        }

        Ok((Self { number, entries }, pos))
    }
}
