//! Error types for the Rill protocol.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,
    #[error("invalid base58: {0}")]
    InvalidBase58(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key bytes")]
    InvalidPublicKey,
    #[error("invalid signature bytes")]
    InvalidSignature,
    #[error("signature verification failed")]
    VerificationFailed,
}

/// Errors constructing or mutating an in-memory [`Wallet`](crate::wallet::Wallet).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletStateError {
    #[error("required_signatures must be at least 1")]
    RequiredSignaturesZero,
    #[error(
        "required_signatures {required} exceeds allowed_signers.len()+1 ({max})"
    )]
    RequiredSignaturesTooHigh { required: u8, max: u8 },
    #[error("wallet {0} not found")]
    NotFound(String),
    #[error("wallet {0} already exists")]
    AlreadyExists(String),
}

/// Errors applying or reverting a wallet-state journal entry or transaction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WsjError {
    #[error("corrupt journal entry: unknown tag {tag}")]
    CorruptEntry { tag: i32 },
    #[error("journal entry targets a wallet that does not exist")]
    MissingTarget,
    #[error("wallet state diverged: expected {expected}, actual {actual}")]
    DivergentState { expected: String, actual: String },
    #[error("truncated journal entry")]
    Truncated,
    #[error(transparent)]
    Wallet(#[from] WalletStateError),
}

/// Errors from the sharded block store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("shard for block {0} is not present")]
    ShardAbsent(u64),
    #[error("block {0} not found")]
    BlockNotFound(u64),
    #[error("transaction {0} not found")]
    TransactionNotFound(String),
    #[error("super-block {0} not found")]
    SuperBlockNotFound(u64),
    #[error("malformed stored record: {0}")]
    Malformed(String),
    #[error("io: {0}")]
    Io(String),
}

/// Errors from inventory reconciliation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("peer link error: {0}")]
    PeerLink(String),
    #[error("presence registry error: {0}")]
    Presence(String),
}

#[derive(Error, Debug)]
pub enum RillError {
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    WalletState(#[from] WalletStateError),
    #[error(transparent)]
    Wsj(#[from] WsjError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Inventory(#[from] InventoryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wsj_error_from_wallet_error() {
        let e: WsjError = WalletStateError::RequiredSignaturesZero.into();
        assert!(matches!(e, WsjError::Wallet(WalletStateError::RequiredSignaturesZero)));
    }

    #[test]
    fn rill_error_from_store_error() {
        let e: RillError = StoreError::ShardAbsent(7).into();
        assert!(format!("{e}").contains('7'));
    }

    #[test]
    fn error_display_nonempty() {
        assert!(!format!("{}", AddressError::Empty).is_empty());
        assert!(!format!("{}", WsjError::Truncated).is_empty());
    }
}
