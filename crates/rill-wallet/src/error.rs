//! Wallet error types.
//!
//! The wallet-state journal and wallet codec raise [`WsjError`] and
//! [`WalletStateError`] directly (defined in `rill-core` so `rill-node` and
//! `rill-network` can construct and match on them without depending on this
//! crate); they are re-exported here for callers that only need
//! `rill-wallet`.

pub use rill_core::error::{WalletStateError, WsjError};
