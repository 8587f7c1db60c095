//! The wallet-state journal (WSJ): reversible entries and transactions that
//! mediate every wallet-state change applied during block processing.

pub mod entry;
pub mod transaction;

pub use entry::JournalEntry;
pub use transaction::JournalTransaction;
