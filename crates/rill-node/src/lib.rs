//! # rill-node — wallet state, the sharded block store, and RPC
//!
//! Composes the subsystems of a Rill full node:
//! - [`store`] — the sharded RocksDB block/transaction store and the
//!   super-block side database
//! - [`chain_view`] — the [`rill_core::adapters::ChainView`] implementation
//!   consumed by inventory reconciliation in `rill-network`
//! - [`node::Node`] — wallet state plus the block store, with the WSJ
//!   apply/revert orchestration around block application
//! - [`rpc`] — a read-only JSON-RPC server for external queries
//! - [`config::NodeConfig`] — node configuration

pub mod chain_view;
pub mod config;
pub mod node;
pub mod rpc;
pub mod store;

pub use chain_view::NodeChainView;
pub use config::NodeConfig;
pub use node::Node;
pub use rpc::start_rpc_server;
pub use store::BlockStore;
