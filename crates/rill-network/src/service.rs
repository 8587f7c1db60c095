//! The libp2p-backed network node: gossips inventory advertisements and
//! answers/sends concrete fetch requests.
//!
//! Uses a command-channel architecture: the [`NetworkNode`] sends commands
//! over an mpsc channel to a background swarm task running on tokio.
//! This bridges the synchronous [`rill_core::adapters::PeerLink`] interface
//! with async libp2p.

use crate::behaviour::{self, RillBehaviour, PROTOCOL_VERSION};
use crate::config::NetworkConfig;
use crate::protocol::{
    decode_inventory_item, encode_inventory_item, InventoryRequest, InventoryResponse, RillCodec, WireRequest,
    INVENTORY_TOPIC, REQ_RESP_PROTOCOL,
};
use libp2p::gossipsub::{self, IdentTopic};
use libp2p::identity::Keypair;
use libp2p::kad;
use libp2p::multiaddr::Protocol;
use libp2p::request_response;
use libp2p::swarm::SwarmEvent;
use libp2p::{identify, mdns, Multiaddr, PeerId, StreamProtocol, SwarmBuilder};
use rill_core::adapters::{InventoryItem, PeerLink};
use rill_core::error::InventoryError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// A concrete fetch request forwarded from a peer's request-response
/// request. The node answers it from local state and replies via
/// [`Command::SendResponse`].
pub struct InventoryQuery {
    /// The decoded request. `None` if the payload didn't decode under its
    /// claimed code (the caller should just drop the channel).
    pub request: Option<InventoryRequest>,
    /// The peer that sent the request.
    pub peer: PeerId,
    /// The libp2p response channel to send the response back.
    pub response_channel: request_response::ResponseChannel<InventoryResponse>,
}

/// Commands sent from [`NetworkNode`] to the background swarm task.
#[derive(Debug)]
enum Command {
    /// Publish an encoded advertisement to the inventory gossip topic.
    Advertise(Vec<u8>),
    /// Dial a remote peer address (used by connect_peer).
    Dial(Multiaddr),
    /// Send a fetch request to a specific peer.
    SendRequest { peer: PeerId, code: u32, payload: Vec<u8> },
    /// Send a response back to a peer via their response channel.
    SendResponse {
        channel: request_response::ResponseChannel<InventoryResponse>,
        response: InventoryResponse,
    },
    /// Shut down the swarm event loop.
    Shutdown,
}

/// Events emitted by the network layer for consumption by higher layers.
#[derive(Debug, Clone)]
pub enum NetworkEvent {
    /// A peer advertised possession of an inventory item.
    InventoryAdvertised { item: InventoryItem, from: PeerId },
    /// A new peer connected.
    PeerConnected(PeerId),
    /// A peer disconnected.
    PeerDisconnected(PeerId),
    /// A response was received to one of our outgoing fetch requests.
    RequestResponse { peer: PeerId, response: InventoryResponse },
}

/// Shared atomic state between the [`NetworkNode`] handle and the swarm task.
struct SharedState {
    /// Number of currently connected peers (approximate).
    peer_count: AtomicUsize,
    /// Whether the swarm event loop is still running.
    running: AtomicBool,
}

/// P2P network node: advertises and reconciles inventory with peers.
///
/// Created via [`NetworkNode::start`], which spawns a background tokio task
/// running the libp2p swarm event loop. Methods on this struct send commands
/// to that task over an unbounded mpsc channel.
pub struct NetworkNode {
    command_tx: mpsc::UnboundedSender<Command>,
    state: Arc<SharedState>,
    local_peer_id: PeerId,
}

impl std::fmt::Debug for NetworkNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkNode")
            .field("peer_id", &self.local_peer_id)
            .field("peer_count", &self.state.peer_count.load(Ordering::Relaxed))
            .field("running", &self.state.running.load(Ordering::Relaxed))
            .finish()
    }
}

/// Load an Ed25519 keypair from a file, or generate and save a new one.
///
/// The file stores the raw 32-byte Ed25519 secret key (seed).  On load,
/// the keypair is reconstructed deterministically from that seed, so the
/// peer ID remains stable across node restarts.
///
/// If the file does not exist, a fresh keypair is generated, the 32-byte
/// secret is written to the file, and the keypair is returned.  The file
/// is created with mode `0o600` on Unix so that only the owning user can
/// read it.
fn load_or_generate_keypair(path: &std::path::Path) -> Result<Keypair, String> {
    use std::io::{Read, Write};

    if path.exists() {
        let mut file = std::fs::File::open(path)
            .map_err(|e| format!("failed to open node key file '{}': {e}", path.display()))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| format!("failed to read node key file '{}': {e}", path.display()))?;
        let keypair = Keypair::ed25519_from_bytes(bytes)
            .map_err(|e| format!("invalid node key in '{}': {e}", path.display()))?;
        info!(path = %path.display(), "loaded existing node identity key");
        Ok(keypair)
    } else {
        let keypair = Keypair::generate_ed25519();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create directory '{}': {e}", parent.display()))?;
        }

        let ed_keypair = keypair.clone().try_into_ed25519().map_err(|e| format!("keypair is not Ed25519: {e}"))?;
        let secret_bytes: Vec<u8> = ed_keypair.secret().as_ref().to_vec();

        let mut file =
            std::fs::File::create(path).map_err(|e| format!("failed to create node key file '{}': {e}", path.display()))?;
        file.write_all(&secret_bytes)
            .map_err(|e| format!("failed to write node key file '{}': {e}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| format!("failed to set permissions on '{}': {e}", path.display()))?;
        }

        info!(path = %path.display(), "generated new node identity key");
        Ok(keypair)
    }
}

impl NetworkNode {
    /// Start the network node, returning a handle, event receiver, and query receiver.
    ///
    /// Spawns a background tokio task that runs the libp2p swarm event loop.
    /// The returned [`broadcast::Receiver`] receives [`NetworkEvent`]s from
    /// peers. The returned [`mpsc::UnboundedReceiver<InventoryQuery>`]
    /// receives fetch requests that need to be answered from local state.
    pub async fn start(
        config: NetworkConfig,
    ) -> Result<(Self, broadcast::Receiver<NetworkEvent>, mpsc::UnboundedReceiver<InventoryQuery>), String> {
        let keypair = match &config.node_key_path {
            Some(path) => load_or_generate_keypair(path)?,
            None => Keypair::generate_ed25519(),
        };
        let local_peer_id = PeerId::from(keypair.public());
        info!(%local_peer_id, "starting network node");

        let gossipsub = behaviour::build_gossipsub(config.gossipsub_heartbeat)?;

        let kad_config = kad::Config::new(StreamProtocol::new("/rill/kad/1.0.0"));
        let store = kad::store::MemoryStore::new(local_peer_id);
        let kademlia = kad::Behaviour::with_config(local_peer_id, store, kad_config);

        let identify = identify::Behaviour::new(identify::Config::new(PROTOCOL_VERSION.to_string(), keypair.public()));

        let mdns = if config.enable_mdns {
            Some(mdns::tokio::Behaviour::new(mdns::Config::default(), local_peer_id).map_err(|e| format!("mDNS error: {e}"))?)
        } else {
            None
        };

        let req_resp_config = request_response::Config::default().with_request_timeout(Duration::from_secs(30));
        let req_resp = request_response::Behaviour::with_codec(
            RillCodec,
            [(StreamProtocol::new(REQ_RESP_PROTOCOL), request_response::ProtocolSupport::Full)],
            req_resp_config,
        );

        let behaviour =
            RillBehaviour { gossipsub, kademlia, identify, mdns: mdns.into(), request_response: req_resp };

        let mut swarm = SwarmBuilder::with_existing_identity(keypair)
            .with_tokio()
            .with_tcp(libp2p::tcp::Config::default(), libp2p::noise::Config::new, libp2p::yamux::Config::default)
            .map_err(|e| format!("TCP transport error: {e}"))?
            .with_behaviour(|_| Ok(behaviour))
            .map_err(|e| format!("behaviour error: {e}"))?
            .build();

        let inventory_topic = IdentTopic::new(INVENTORY_TOPIC);
        swarm
            .behaviour_mut()
            .gossipsub
            .subscribe(&inventory_topic)
            .map_err(|e| format!("subscribe inventory: {e}"))?;

        let listen_addr: Multiaddr = config.listen_multiaddr().parse().map_err(|e| format!("invalid listen addr: {e}"))?;
        swarm.listen_on(listen_addr).map_err(|e| format!("listen error: {e}"))?;

        for peer_addr in &config.bootstrap_peers {
            if let Ok(addr) = peer_addr.parse::<Multiaddr>() {
                if let Some(Protocol::P2p(peer_id)) = addr.iter().last() {
                    swarm.behaviour_mut().kademlia.add_address(&peer_id, addr.clone());
                }
                let _ = swarm.dial(addr);
            }
        }

        if !config.bootstrap_peers.is_empty() {
            let _ = swarm.behaviour_mut().kademlia.bootstrap();
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = broadcast::channel(256);
        let (query_tx, query_rx) = mpsc::unbounded_channel();

        let state = Arc::new(SharedState { peer_count: AtomicUsize::new(0), running: AtomicBool::new(true) });

        let state_clone = Arc::clone(&state);
        tokio::spawn(async move {
            swarm_event_loop(swarm, command_rx, event_tx, query_tx, state_clone).await;
        });

        let node = NetworkNode { command_tx, state, local_peer_id };

        Ok((node, event_rx, query_rx))
    }

    /// The local peer ID assigned to this node.
    pub fn local_peer_id(&self) -> &PeerId {
        &self.local_peer_id
    }

    /// Whether the background swarm event loop is still running.
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Relaxed)
    }

    /// Whether this node has any connected peers.
    pub fn is_connected(&self) -> bool {
        self.state.peer_count.load(Ordering::Relaxed) > 0
    }

    /// Number of currently connected peers.
    pub fn peer_count(&self) -> usize {
        self.state.peer_count.load(Ordering::Relaxed)
    }

    /// Request the swarm to shut down gracefully.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(Command::Shutdown);
    }

    /// Dial a remote peer by multiaddr.
    pub fn connect_peer(&self, addr: Multiaddr) -> Result<(), InventoryError> {
        self.command_tx.send(Command::Dial(addr)).map_err(|_| InventoryError::PeerLink("swarm task stopped".into()))
    }

    /// Broadcast an inventory advertisement to all connected peers.
    pub fn advertise(&self, item: &InventoryItem) -> Result<(), InventoryError> {
        let data = encode_inventory_item(item);
        self.command_tx
            .send(Command::Advertise(data))
            .map_err(|_| InventoryError::PeerLink("swarm task stopped".into()))
    }

    /// Send a response back to a peer via their response channel.
    pub fn send_response(
        &self,
        channel: request_response::ResponseChannel<InventoryResponse>,
        response: InventoryResponse,
    ) -> Result<(), InventoryError> {
        self.command_tx
            .send(Command::SendResponse { channel, response })
            .map_err(|_| InventoryError::PeerLink("swarm task stopped".into()))
    }

    /// A [`PeerLink`] adapter that sends fetch requests to `peer` through
    /// this node's swarm task.
    pub fn peer_link(&self, peer: PeerId) -> NetworkPeerLink {
        NetworkPeerLink { peer, command_tx: self.command_tx.clone() }
    }
}

/// A [`PeerLink`] implementation bound to one remote peer, handed to
/// inventory reconciliation so it can send a typed fetch request.
pub struct NetworkPeerLink {
    peer: PeerId,
    command_tx: mpsc::UnboundedSender<Command>,
}

impl PeerLink for NetworkPeerLink {
    fn send(&self, code: u32, bytes: Vec<u8>) -> Result<(), InventoryError> {
        self.command_tx
            .send(Command::SendRequest { peer: self.peer, code, payload: bytes })
            .map_err(|_| InventoryError::PeerLink("swarm task stopped".into()))
    }
}

/// Background task running the libp2p swarm event loop.
///
/// Receives commands from [`NetworkNode`] and emits [`NetworkEvent`]s to
/// subscribers via the broadcast channel. Forwards fetch requests to the
/// node via the query channel for processing.
async fn swarm_event_loop(
    mut swarm: libp2p::Swarm<RillBehaviour>,
    mut command_rx: mpsc::UnboundedReceiver<Command>,
    event_tx: broadcast::Sender<NetworkEvent>,
    query_tx: mpsc::UnboundedSender<InventoryQuery>,
    state: Arc<SharedState>,
) {
    loop {
        tokio::select! {
            cmd = command_rx.recv() => {
                match cmd {
                    Some(Command::Advertise(data)) => {
                        let topic = IdentTopic::new(INVENTORY_TOPIC);
                        if let Err(e) = swarm.behaviour_mut().gossipsub.publish(topic, data) {
                            debug!("gossipsub publish error: {e}");
                        }
                    }
                    Some(Command::Dial(addr)) => {
                        if let Err(e) = swarm.dial(addr) {
                            debug!("dial error: {e}");
                        }
                    }
                    Some(Command::SendRequest { peer, code, payload }) => {
                        let request = WireRequest { code, payload };
                        let _ = swarm.behaviour_mut().request_response.send_request(&peer, request);
                    }
                    Some(Command::SendResponse { channel, response }) => {
                        let _ = swarm.behaviour_mut().request_response.send_response(channel, response);
                    }
                    Some(Command::Shutdown) | None => {
                        info!("shutting down swarm event loop");
                        state.running.store(false, Ordering::Relaxed);
                        break;
                    }
                }
            }
            event = swarm.next() => {
                let Some(event) = event else {
                    state.running.store(false, Ordering::Relaxed);
                    break;
                };

                match event {
                    SwarmEvent::Behaviour(behaviour::RillBehaviourEvent::Gossipsub(
                        gossipsub::Event::Message { propagation_source, message, .. },
                    )) => {
                        if let Some(item) = decode_inventory_item(&message.data) {
                            let _ = event_tx.send(NetworkEvent::InventoryAdvertised { item, from: propagation_source });
                        } else {
                            debug!("failed to decode inventory advertisement");
                        }
                    }

                    SwarmEvent::Behaviour(behaviour::RillBehaviourEvent::RequestResponse(event)) => {
                        match event {
                            request_response::Event::Message { peer, message } => {
                                match message {
                                    request_response::Message::Request { request, channel, .. } => {
                                        debug!(%peer, "received fetch request");
                                        let decoded = InventoryRequest::decode(request.code, &request.payload);
                                        let query = InventoryQuery { request: decoded, peer, response_channel: channel };
                                        if let Err(e) = query_tx.send(query) {
                                            debug!("failed to forward inventory query: {e}");
                                        }
                                    }
                                    request_response::Message::Response { response, .. } => {
                                        debug!(%peer, "received fetch response");
                                        let _ = event_tx.send(NetworkEvent::RequestResponse { peer, response });
                                    }
                                }
                            }
                            request_response::Event::OutboundFailure { peer, error, .. } => {
                                warn!(%peer, %error, "outbound request failed");
                            }
                            request_response::Event::InboundFailure { peer, error, .. } => {
                                warn!(%peer, %error, "inbound request failed");
                            }
                            request_response::Event::ResponseSent { .. } => {}
                        }
                    }

                    SwarmEvent::Behaviour(behaviour::RillBehaviourEvent::Mdns(
                        mdns::Event::Discovered(peers),
                    )) => {
                        for (peer_id, addr) in peers {
                            debug!(%peer_id, %addr, "mDNS discovered peer");
                            swarm.behaviour_mut().kademlia.add_address(&peer_id, addr);
                        }
                    }

                    SwarmEvent::Behaviour(behaviour::RillBehaviourEvent::Mdns(
                        mdns::Event::Expired(peers),
                    )) => {
                        for (peer_id, addr) in peers {
                            debug!(%peer_id, %addr, "mDNS peer expired");
                        }
                    }

                    SwarmEvent::Behaviour(behaviour::RillBehaviourEvent::Identify(
                        identify::Event::Received { peer_id, info, .. },
                    )) => {
                        debug!(%peer_id, "identify received");
                        for addr in info.listen_addrs {
                            swarm.behaviour_mut().kademlia.add_address(&peer_id, addr);
                        }
                    }

                    SwarmEvent::ConnectionEstablished { peer_id, .. } => {
                        let count = state.peer_count.fetch_add(1, Ordering::Relaxed) + 1;
                        info!(%peer_id, count, "peer connected");
                        let _ = event_tx.send(NetworkEvent::PeerConnected(peer_id));
                    }

                    SwarmEvent::ConnectionClosed { peer_id, .. } => {
                        let prev = state.peer_count.load(Ordering::Relaxed);
                        if prev > 0 {
                            state.peer_count.fetch_sub(1, Ordering::Relaxed);
                        }
                        let count = state.peer_count.load(Ordering::Relaxed);
                        info!(%peer_id, count, "peer disconnected");
                        let _ = event_tx.send(NetworkEvent::PeerDisconnected(peer_id));
                    }

                    SwarmEvent::NewListenAddr { address, .. } => {
                        info!(%address, "listening on");
                    }

                    SwarmEvent::ListenerError { error, .. } => {
                        error!(%error, "listener error");
                    }

                    _ => {}
                }
            }
        }
    }
}

use libp2p::futures::StreamExt;
