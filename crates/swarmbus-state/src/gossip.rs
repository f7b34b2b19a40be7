//! Gossip engine: versioned key/value anti-entropy.
//!
//! `start` stamps a new version and checksum, stores locally and returns
//! the immediate propagation messages. A periodic `round` picks a random
//! subset (min(fanout, peer count)) of peers per known key and produces
//! unicast state updates. Incoming state is adopted only when its version
//! is strictly greater than the local one; equal or lower versions are
//! dropped silently. There is no vector-clock ordering, so concurrent
//! writers race and the higher version wins.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use swarmbus_protocol::{
    EventBus, Message, MessageType, NodeId, SwarmEvent, GOSSIP_FANOUT,
};

/// One versioned entry in the gossip store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GossipState {
    pub key: String,
    /// Monotonic per key. Last writer wins on strictly greater versions.
    pub version: u64,
    pub data: serde_json::Value,
    /// hex(SHA-256(data)), re-verified on receipt.
    pub checksum: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct GossipConfig {
    /// Peers contacted per key per round.
    pub fanout: usize,
    /// Seed for reproducible peer sampling (None = entropy).
    pub seed: Option<u64>,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            fanout: GOSSIP_FANOUT,
            seed: None,
        }
    }
}

pub struct GossipEngine {
    node_id: NodeId,
    config: GossipConfig,
    states: HashMap<String, GossipState>,
    rng: StdRng,
    bus: EventBus,
}

impl GossipEngine {
    pub fn new(node_id: NodeId, config: GossipConfig, bus: EventBus) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            node_id,
            config,
            states: HashMap::new(),
            rng,
            bus,
        }
    }

    /// Publish new state under `key` and return the immediate propagation
    /// messages for a random peer subset.
    pub fn start(
        &mut self,
        key: impl Into<String>,
        data: serde_json::Value,
        peers: &[NodeId],
        now: DateTime<Utc>,
    ) -> Vec<Message> {
        let key = key.into();
        let version = self.states.get(&key).map(|s| s.version + 1).unwrap_or(1);
        let state = GossipState {
            key: key.clone(),
            version,
            checksum: state_checksum(&data),
            data,
            updated_at: now,
        };
        self.states.insert(key.clone(), state.clone());

        debug!(key = %key, version, "gossip state published");
        self.bus.publish(SwarmEvent::GossipStarted { key, version });

        self.messages_for(&state, peers)
    }

    /// One anti-entropy round: per known key, unicast the current state to
    /// a random peer subset.
    pub fn round(&mut self, peers: &[NodeId]) -> Vec<Message> {
        if peers.is_empty() || self.states.is_empty() {
            return Vec::new();
        }
        let states: Vec<GossipState> = self.states.values().cloned().collect();
        let mut out = Vec::new();
        for state in states {
            out.extend(self.messages_for(&state, peers));
        }
        out
    }

    /// Apply state received from a peer. Adopts only strictly greater
    /// versions; returns whether the local store changed.
    pub fn apply_remote(&mut self, incoming: GossipState) -> bool {
        if state_checksum(&incoming.data) != incoming.checksum {
            warn!(key = %incoming.key, version = incoming.version, "gossip checksum mismatch, dropped");
            return false;
        }
        match self.states.get(&incoming.key) {
            Some(local) if incoming.version <= local.version => {
                debug!(
                    key = %incoming.key,
                    local_version = local.version,
                    incoming_version = incoming.version,
                    "stale gossip ignored"
                );
                false
            }
            _ => {
                debug!(key = %incoming.key, version = incoming.version, "gossip state adopted");
                self.states.insert(incoming.key.clone(), incoming);
                true
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&GossipState> {
        self.states.get(key)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn messages_for(&mut self, state: &GossipState, peers: &[NodeId]) -> Vec<Message> {
        let fanout = self.config.fanout.min(peers.len());
        if fanout == 0 {
            return Vec::new();
        }
        let payload = match serde_json::to_value(state) {
            Ok(v) => v,
            Err(e) => {
                warn!(key = %state.key, error = %e, "gossip state not serializable");
                return Vec::new();
            }
        };
        peers
            .choose_multiple(&mut self.rng, fanout)
            .map(|peer| {
                Message::new(
                    MessageType::Gossip,
                    self.node_id.clone(),
                    vec![peer.clone()],
                    payload.clone(),
                )
            })
            .collect()
    }
}

/// Content checksum of a state value.
pub fn state_checksum(data: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(data).unwrap_or_default());
    hex::encode(hasher.finalize())
}
