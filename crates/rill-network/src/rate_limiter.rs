//! Per-peer rate limiting using a sliding window approach.
//!
//! Tracks how many inventory advertisements and how many concrete fetch
//! requests each peer has sent within the last 60 seconds. When a peer
//! exceeds the configured limit the check method returns `false`,
//! signalling the caller to drop or penalize the peer.
//!
//! # Design
//!
//! Each peer has a [`PeerRateLimits`] record that holds two
//! [`VecDeque`](std::collections::VecDeque)s of [`Instant`](std::time::Instant)
//! timestamps — one per message category.  On every check the deque is first
//! pruned to remove entries older than 60 seconds, then the remaining length is
//! compared against the configured limit.  Recording a message appends the
//! current timestamp.

use libp2p::PeerId;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::protocol::MAX_MESSAGE_SIZE;

/// The sliding window duration — 60 seconds.
const WINDOW: Duration = Duration::from_secs(60);

/// Maximum inventory advertisements accepted from one peer per minute.
pub const RATE_LIMIT_ADVERTISEMENTS_PER_MIN: u64 = 120;

/// Maximum concrete fetch requests accepted from one peer per minute.
pub const RATE_LIMIT_REQUESTS_PER_MIN: u64 = 60;

/// Per-peer timestamp queues for the two rate-limited message categories.
#[derive(Debug, Clone)]
pub struct PeerRateLimits {
    /// Timestamps of recent inventory advertisements from this peer.
    pub advertisements: VecDeque<Instant>,
    /// Timestamps of recent fetch requests from this peer.
    pub requests: VecDeque<Instant>,
}

impl PeerRateLimits {
    fn new() -> Self {
        Self { advertisements: VecDeque::new(), requests: VecDeque::new() }
    }

    /// Remove timestamps older than [`WINDOW`] from a queue.
    fn prune(queue: &mut VecDeque<Instant>) {
        let cutoff = Instant::now() - WINDOW;
        while queue.front().is_some_and(|t| *t <= cutoff) {
            queue.pop_front();
        }
    }
}

/// Manages sliding-window rate limits for all connected peers.
///
/// # Usage
///
/// Before processing a message, call the appropriate `check_*` method.  If it
/// returns `false` the peer has exceeded its rate limit and the message should
/// be discarded (and the peer possibly penalized).  After deciding to process
/// the message call the corresponding `record_*` method to register the event.
///
/// Combining check + record in one step would couple rate limiting to processing
/// outcomes; keeping them separate gives callers the flexibility to record only
/// messages that pass validation.
pub struct RateLimiter {
    peers: HashMap<PeerId, PeerRateLimits>,
}

impl RateLimiter {
    /// Create an empty rate limiter.
    pub fn new() -> Self {
        Self {
            peers: HashMap::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Check methods — return `true` if the peer is within its limit.
    // -------------------------------------------------------------------------

    /// Returns `true` if the peer has not exceeded the advertisement rate limit.
    ///
    /// Prunes stale entries before checking so the window always reflects the
    /// last 60 seconds.
    pub fn check_advertisement(&mut self, peer: &PeerId) -> bool {
        let entry = self.peers.entry(*peer).or_insert_with(PeerRateLimits::new);
        PeerRateLimits::prune(&mut entry.advertisements);
        let ok = entry.advertisements.len() < RATE_LIMIT_ADVERTISEMENTS_PER_MIN as usize;
        if !ok {
            debug!(%peer, count = entry.advertisements.len(), limit = RATE_LIMIT_ADVERTISEMENTS_PER_MIN,
                "rate_limiter: advertisement rate limit exceeded");
        }
        ok
    }

    /// Returns `true` if the peer has not exceeded the fetch-request rate limit.
    pub fn check_request(&mut self, peer: &PeerId) -> bool {
        let entry = self.peers.entry(*peer).or_insert_with(PeerRateLimits::new);
        PeerRateLimits::prune(&mut entry.requests);
        let ok = entry.requests.len() < RATE_LIMIT_REQUESTS_PER_MIN as usize;
        if !ok {
            debug!(%peer, count = entry.requests.len(), limit = RATE_LIMIT_REQUESTS_PER_MIN,
                "rate_limiter: request rate limit exceeded");
        }
        ok
    }

    // -------------------------------------------------------------------------
    // Record methods — call after deciding to process a message.
    // -------------------------------------------------------------------------

    /// Record an inventory advertisement from this peer.
    pub fn record_advertisement(&mut self, peer: &PeerId) {
        self.peers
            .entry(*peer)
            .or_insert_with(PeerRateLimits::new)
            .advertisements
            .push_back(Instant::now());
        debug!(%peer, "rate_limiter: advertisement recorded");
    }

    /// Record a fetch request from this peer.
    pub fn record_request(&mut self, peer: &PeerId) {
        self.peers
            .entry(*peer)
            .or_insert_with(PeerRateLimits::new)
            .requests
            .push_back(Instant::now());
        debug!(%peer, "rate_limiter: request recorded");
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Remove all rate-limit state for a peer.
    ///
    /// Call this when a peer disconnects to free memory.
    pub fn remove_peer(&mut self, peer: &PeerId) {
        if self.peers.remove(peer).is_some() {
            debug!(%peer, "rate_limiter: peer removed");
        }
    }

    // -------------------------------------------------------------------------
    // Static helpers
    // -------------------------------------------------------------------------

    /// Returns `true` if `size` is within the allowed maximum message size.
    ///
    /// Messages larger than [`MAX_MESSAGE_SIZE`] must be rejected before
    /// deserialization to prevent memory exhaustion attacks.
    pub fn check_message_size(size: usize) -> bool {
        size <= MAX_MESSAGE_SIZE
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
