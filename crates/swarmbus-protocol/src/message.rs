//! Message envelope and routing/compression/encryption/QoS configuration.
//!
//! Every swarm communication travels in a [`Message`] envelope carrying a
//! SHA-256 checksum over (sender, recipients, payload, timestamp). The
//! checksum is verified on receipt; mismatched messages are dropped, not
//! delivered. TTL-expired messages are purged from queues and history and
//! never redelivered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::constants::{COMPRESSION_THRESHOLD_BYTES, DEFAULT_RELIABILITY, DEFAULT_TTL_MS};
use crate::identity::NodeId;

/// Delivery semantics of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Broadcast,
    Multicast,
    Unicast,
    Gossip,
    Heartbeat,
    Consensus,
    Election,
    Data,
    Control,
}

/// Message priority classes, lowest to highest.
///
/// Queues drain in strict priority order: a lower class only progresses
/// once every higher class is empty for that tick.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum MessagePriority {
    Background,
    Low,
    #[default]
    Normal,
    High,
    Emergency,
}

impl MessagePriority {
    /// All priorities, highest first. Drain order for the router.
    pub const DESCENDING: [MessagePriority; 5] = [
        MessagePriority::Emergency,
        MessagePriority::High,
        MessagePriority::Normal,
        MessagePriority::Low,
        MessagePriority::Background,
    ];

    /// Queue band index: 0 = emergency, 4 = background.
    pub fn band(&self) -> usize {
        match self {
            MessagePriority::Emergency => 0,
            MessagePriority::High => 1,
            MessagePriority::Normal => 2,
            MessagePriority::Low => 3,
            MessagePriority::Background => 4,
        }
    }
}

/// How a message is routed to its recipients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoutingStrategy {
    /// Send straight to the recipient list.
    Direct,
    /// Let the router pick per message type (the default).
    #[default]
    Adaptive,
    /// Fan out along the spanning tree.
    Tree,
    /// Flood to every known node.
    Flood,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub strategy: RoutingStrategy,
    pub max_hops: u32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            strategy: RoutingStrategy::Adaptive,
            max_hops: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    None,
    #[default]
    Gzip,
}

/// Compression settings. `applied` is set by the codec when the payload
/// was actually compressed, so the inbound path knows to reverse it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub algorithm: CompressionAlgorithm,
    pub threshold_bytes: usize,
    #[serde(default)]
    pub applied: bool,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            algorithm: CompressionAlgorithm::Gzip,
            threshold_bytes: COMPRESSION_THRESHOLD_BYTES,
            applied: false,
        }
    }
}

/// Encryption settings. The scheme names a [cipher] registered with the
/// router's codec; "null" is the identity cipher.
///
/// [cipher]: https://docs.rs/swarmbus-routing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionConfig {
    pub scheme: String,
    #[serde(default)]
    pub applied: bool,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            scheme: "null".to_string(),
            applied: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QosConfig {
    /// Target delivery reliability in [0, 1].
    pub reliability: f64,
    /// Whether FIFO ordering within the priority band is required.
    pub ordered: bool,
}

impl Default for QosConfig {
    fn default() -> Self {
        Self {
            reliability: DEFAULT_RELIABILITY,
            ordered: true,
        }
    }
}

/// Top-level message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub message_type: MessageType,
    pub sender: NodeId,
    pub recipients: Vec<NodeId>,
    pub payload: serde_json::Value,
    pub priority: MessagePriority,
    pub timestamp: DateTime<Utc>,
    pub ttl_ms: u64,
    /// hex(SHA-256(sender, recipients, payload, timestamp))
    pub checksum: String,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub compression: CompressionConfig,
    #[serde(default)]
    pub encryption: EncryptionConfig,
    #[serde(default)]
    pub qos: QosConfig,
}

impl Message {
    /// Build a message with defaults filled in and the checksum computed.
    pub fn new(
        message_type: MessageType,
        sender: NodeId,
        recipients: Vec<NodeId>,
        payload: serde_json::Value,
    ) -> Self {
        let timestamp = Utc::now();
        let checksum = compute_checksum(&sender, &recipients, &payload, &timestamp);
        Self {
            id: Uuid::new_v4().to_string(),
            message_type,
            sender,
            recipients,
            payload,
            priority: MessagePriority::Normal,
            timestamp,
            ttl_ms: DEFAULT_TTL_MS,
            checksum,
            routing: RoutingConfig::default(),
            compression: CompressionConfig::default(),
            encryption: EncryptionConfig::default(),
            qos: QosConfig::default(),
        }
    }

    pub fn with_priority(mut self, priority: MessagePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    /// Whether the TTL has elapsed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.timestamp);
        age.num_milliseconds() > self.ttl_ms as i64
    }

    /// Recompute the checksum and compare against the carried one.
    pub fn verify_checksum(&self) -> bool {
        let expected =
            compute_checksum(&self.sender, &self.recipients, &self.payload, &self.timestamp);
        expected == self.checksum
    }

    /// Restamp the checksum after the payload was transformed by the codec.
    pub fn reseal(&mut self) {
        self.checksum =
            compute_checksum(&self.sender, &self.recipients, &self.payload, &self.timestamp);
    }
}

/// Deterministic checksum over the delivery-relevant envelope fields.
///
/// Any single-field change (sender, recipient list, payload bytes or
/// timestamp) produces a different digest.
pub fn compute_checksum(
    sender: &NodeId,
    recipients: &[NodeId],
    payload: &serde_json::Value,
    timestamp: &DateTime<Utc>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sender.as_str().as_bytes());
    for recipient in recipients {
        hasher.update(b"|");
        hasher.update(recipient.as_str().as_bytes());
    }
    hasher.update(b"|");
    hasher.update(serde_json::to_vec(payload).unwrap_or_default());
    hasher.update(b"|");
    hasher.update(timestamp.timestamp_millis().to_be_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample() -> Message {
        Message::new(
            MessageType::Data,
            NodeId::from("node-a"),
            vec![NodeId::from("node-b")],
            serde_json::json!({"k": "v"}),
        )
    }

    #[test]
    fn test_checksum_deterministic() {
        let msg = sample();
        let again = compute_checksum(&msg.sender, &msg.recipients, &msg.payload, &msg.timestamp);
        assert_eq!(msg.checksum, again);
        assert!(msg.verify_checksum());
    }

    #[test]
    fn test_checksum_changes_per_field() {
        let msg = sample();
        let base = msg.checksum.clone();

        let sender_changed =
            compute_checksum(&NodeId::from("node-x"), &msg.recipients, &msg.payload, &msg.timestamp);
        assert_ne!(base, sender_changed);

        let recipients_changed = compute_checksum(
            &msg.sender,
            &[NodeId::from("node-c")],
            &msg.payload,
            &msg.timestamp,
        );
        assert_ne!(base, recipients_changed);

        let payload_changed = compute_checksum(
            &msg.sender,
            &msg.recipients,
            &serde_json::json!({"k": "other"}),
            &msg.timestamp,
        );
        assert_ne!(base, payload_changed);

        let later = msg.timestamp + Duration::milliseconds(1);
        let timestamp_changed =
            compute_checksum(&msg.sender, &msg.recipients, &msg.payload, &later);
        assert_ne!(base, timestamp_changed);
    }

    #[test]
    fn test_tampered_payload_fails_verification() {
        let mut msg = sample();
        msg.payload = serde_json::json!({"k": "tampered"});
        assert!(!msg.verify_checksum());
        msg.reseal();
        assert!(msg.verify_checksum());
    }

    #[test]
    fn test_ttl_expiry() {
        let msg = sample().with_ttl_ms(1_000);
        assert!(!msg.is_expired(msg.timestamp + Duration::milliseconds(999)));
        assert!(msg.is_expired(msg.timestamp + Duration::milliseconds(1_001)));
    }

    #[test]
    fn test_priority_band_order() {
        let bands: Vec<usize> = MessagePriority::DESCENDING.iter().map(|p| p.band()).collect();
        assert_eq!(bands, vec![0, 1, 2, 3, 4]);
        assert!(MessagePriority::Emergency > MessagePriority::Background);
    }

    #[test]
    fn test_envelope_serialization_roundtrip() {
        let msg = sample().with_priority(MessagePriority::High);
        let json = serde_json::to_string(&msg).unwrap();
        let restored: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.id, msg.id);
        assert_eq!(restored.priority, MessagePriority::High);
        assert_eq!(restored.message_type, MessageType::Data);
        assert!(restored.verify_checksum());
    }
}
