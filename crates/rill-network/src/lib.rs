//! # rill-network — P2P layer using libp2p.
//!
//! Gossips lightweight inventory advertisements (does a peer have this
//! block, transaction, presence update, or signature?) over Gossipsub,
//! and fetches the concrete object point-to-point via request-response
//! once [`inventory::reconcile`] decides it's worth pulling. Kademlia
//! handles peer routing, Noise encrypts TCP/Yamux, and mDNS discovers
//! peers on a local network.
//!
//! The main entry point is [`service::NetworkNode::start`], which spawns a
//! background swarm task and returns a handle plus event/query channels.

pub mod behaviour;
pub mod config;
pub mod inventory;
pub mod peer_scoring;
pub mod presence;
pub mod protocol;
pub mod rate_limiter;
pub mod service;

pub use config::NetworkConfig;
pub use inventory::reconcile;
pub use peer_scoring::{BAN_DURATION, BAN_THRESHOLD, PeerScore, PeerScoreBoard};
pub use presence::PresenceRegistry;
pub use protocol::{
    InventoryRequest, InventoryResponse, RillCodec, WireRequest, INVENTORY_TOPIC, REQ_RESP_PROTOCOL,
};
pub use rate_limiter::{PeerRateLimits, RateLimiter};
pub use service::{InventoryQuery, NetworkEvent, NetworkNode, NetworkPeerLink};
