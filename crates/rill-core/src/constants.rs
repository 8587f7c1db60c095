//! Protocol constants for the wallet-state journal and block store.

/// Block number after which `affected_wallets` switches from the legacy
/// sorted-and-deduplicated mode to the order-preserving mode.
pub const AFFECTED_WALLETS_VERSION_CUTOFF: u32 = 10;

/// Number of blocks held in a single shard database (`shard = floor(n / MAX) * MAX`).
pub const MAX_BLOCKS_PER_DB: u64 = 1000;

/// Number of blocks beyond a transaction's declared height within which the
/// transaction may still reside; bounds the forward shard scan when looking
/// up a transaction by id whose containing block is not yet known.
pub const REDACTED_WINDOW: u64 = 5;

/// Shard connections idle longer than this are evicted on the next `seek`.
pub const SHARD_IDLE_SECS: u64 = 60;

/// Hard cap on the number of open shard connections kept in the cache.
pub const SHARD_CACHE_CAP: usize = 50;

/// Window (in blocks behind tip) within which a `BlockSignature`
/// advertisement is eligible for fetch: `tip - SIGNATURE_WINDOW < num <= tip + 1`.
pub const SIGNATURE_WINDOW: u64 = 5;

pub const DEFAULT_RPC_PORT: u16 = 18332;
pub const DEFAULT_P2P_PORT: u16 = 18333;

pub const MAGIC_BYTES: [u8; 4] = [0x52, 0x49, 0x4C, 0x4C]; // "RILL"

/// Separator used for the delimited `transactions` and `signatures` text
/// fields in a stored block row (leading separator present).
pub const LIST_FIELD_SEP: &str = "||";

/// Separator between a signature list entry's pubkey and signature, and
/// between a to/from list entry's address and amount.
pub const PAIR_FIELD_SEP: char = ':';

/// Literal placeholder written in the signature list when a signature has
/// no accompanying public key.
pub const ABSENT_PUBKEY_MARKER: &str = "0";
