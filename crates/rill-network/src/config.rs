//! Network configuration for the Rill P2P layer.

use rill_core::constants::DEFAULT_P2P_PORT;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the P2P network node.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// IP address to listen on.
    pub listen_addr: String,
    /// TCP port to listen on.
    pub listen_port: u16,
    /// Bootstrap peer multiaddresses to connect on startup.
    pub bootstrap_peers: Vec<String>,
    /// Enable mDNS peer discovery (useful for local/testnet).
    pub enable_mdns: bool,
    /// Gossipsub heartbeat interval.
    pub gossipsub_heartbeat: Duration,
    /// Maximum number of connected peers.
    pub max_peers: usize,
    /// Timeout for outbound dial attempts.
    pub dial_timeout: Duration,
    /// Path to the persisted node identity key. A fresh keypair is
    /// generated and saved here if the file doesn't exist yet; `None`
    /// generates an ephemeral keypair on every start.
    pub node_key_path: Option<PathBuf>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: DEFAULT_P2P_PORT,
            bootstrap_peers: Vec::new(),
            enable_mdns: true,
            gossipsub_heartbeat: Duration::from_secs(1),
            max_peers: 50,
            dial_timeout: Duration::from_secs(10),
            node_key_path: None,
        }
    }
}

impl NetworkConfig {
    /// Configuration preset for testnet: mDNS enabled, no bootstrap peers.
    pub fn testnet() -> Self {
        Self {
            enable_mdns: true,
            ..Self::default()
        }
    }

    /// Configuration preset for mainnet: mDNS disabled, well-known bootstrap peers.
    pub fn mainnet() -> Self {
        Self {
            enable_mdns: false,
            ..Self::default()
        }
    }

    /// Build the libp2p multiaddr string for the configured listen address and port.
    pub fn listen_multiaddr(&self) -> String {
        format!("/ip4/{}/tcp/{}", self.listen_addr, self.listen_port)
    }
}
