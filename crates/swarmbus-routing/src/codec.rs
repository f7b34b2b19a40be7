//! Payload codec: gzip compression and a pluggable cipher seam.
//!
//! Outbound order is serialize, compress, encrypt; inbound reverses it.
//! Compression failures downgrade to an uncompressed send; cipher failures
//! are hard errors. Transformed payloads travel as `{"blob": <base64>}`
//! and the `applied` flags on the envelope tell the inbound path what to
//! undo.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, warn};

use swarmbus_protocol::{CompressionAlgorithm, Message};

use crate::error::RoutingError;

/// Symmetric payload cipher. Implementations are registered with the codec
/// under their `name()` and selected per message via the envelope's
/// encryption scheme. No concrete cipher ships in-tree; deployments
/// register their own.
pub trait PayloadCipher: Send + Sync {
    fn name(&self) -> &str;
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, RoutingError>;
    fn open(&self, ciphertext: &[u8]) -> Result<Vec<u8>, RoutingError>;
}

/// Identity cipher, the default scheme ("null").
pub struct NullCipher;

impl PayloadCipher for NullCipher {
    fn name(&self) -> &str {
        "null"
    }

    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, RoutingError> {
        Ok(plaintext.to_vec())
    }

    fn open(&self, ciphertext: &[u8]) -> Result<Vec<u8>, RoutingError> {
        Ok(ciphertext.to_vec())
    }
}

pub struct MessageCodec {
    ciphers: HashMap<String, Arc<dyn PayloadCipher>>,
}

impl MessageCodec {
    pub fn new() -> Self {
        let mut codec = Self {
            ciphers: HashMap::new(),
        };
        codec.register_cipher(Arc::new(NullCipher));
        codec
    }

    pub fn register_cipher(&mut self, cipher: Arc<dyn PayloadCipher>) {
        self.ciphers.insert(cipher.name().to_string(), cipher);
    }

    fn cipher_for(&self, scheme: &str) -> Result<&Arc<dyn PayloadCipher>, RoutingError> {
        self.ciphers
            .get(scheme)
            .ok_or_else(|| RoutingError::Codec(format!("unknown cipher scheme '{scheme}'")))
    }

    /// Transform the payload for the wire. Sets the `applied` flags and
    /// leaves the payload untouched when neither transform fires.
    pub fn encode(&self, message: &mut Message) -> Result<(), RoutingError> {
        let raw = serde_json::to_vec(&message.payload)
            .map_err(|e| RoutingError::Codec(format!("payload serialization: {e}")))?;

        let mut data = raw;
        let mut compressed = false;
        if message.compression.algorithm == CompressionAlgorithm::Gzip
            && data.len() > message.compression.threshold_bytes
        {
            match gzip_compress(&data) {
                Ok(smaller) if smaller.len() < data.len() => {
                    debug!(
                        message_id = %message.id,
                        before = data.len(),
                        after = smaller.len(),
                        "payload compressed"
                    );
                    data = smaller;
                    compressed = true;
                }
                Ok(_) => {}
                Err(e) => {
                    // Compression is best-effort; fall back to plaintext.
                    warn!(message_id = %message.id, error = %e, "compression skipped");
                }
            }
        }

        let cipher = self.cipher_for(&message.encryption.scheme)?;
        let mut encrypted = false;
        if cipher.name() != "null" {
            data = cipher.seal(&data)?;
            encrypted = true;
        }

        if compressed || encrypted {
            message.payload = serde_json::json!({ "blob": BASE64.encode(&data) });
            message.compression.applied = compressed;
            message.encryption.applied = encrypted;
        }
        Ok(())
    }

    /// Reverse the wire transforms: decrypt, then decompress.
    pub fn decode(&self, message: &mut Message) -> Result<(), RoutingError> {
        if !message.compression.applied && !message.encryption.applied {
            return Ok(());
        }

        let blob = message
            .payload
            .get("blob")
            .and_then(|v| v.as_str())
            .ok_or_else(|| RoutingError::Codec("encoded payload missing blob".to_string()))?;
        let mut data = BASE64
            .decode(blob)
            .map_err(|e| RoutingError::Codec(format!("base64 decode: {e}")))?;

        if message.encryption.applied {
            let cipher = self.cipher_for(&message.encryption.scheme)?;
            data = cipher.open(&data)?;
        }
        if message.compression.applied {
            data = gzip_decompress(&data)
                .map_err(|e| RoutingError::Codec(format!("gzip decode: {e}")))?;
        }

        message.payload = serde_json::from_slice(&data)
            .map_err(|e| RoutingError::Codec(format!("payload deserialization: {e}")))?;
        message.compression.applied = false;
        message.encryption.applied = false;
        Ok(())
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn gzip_compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn gzip_decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmbus_protocol::{MessageType, NodeId};

    fn message_with_payload(payload: serde_json::Value) -> Message {
        Message::new(
            MessageType::Data,
            NodeId::from("a"),
            vec![NodeId::from("b")],
            payload,
        )
    }

    #[test]
    fn test_small_payload_not_compressed() {
        let codec = MessageCodec::new();
        let mut msg = message_with_payload(serde_json::json!({"tiny": true}));
        codec.encode(&mut msg).unwrap();
        assert!(!msg.compression.applied);
        assert_eq!(msg.payload["tiny"], true);
    }

    #[test]
    fn test_large_payload_roundtrip() {
        let codec = MessageCodec::new();
        let text = "swarm ".repeat(1_000);
        let original = serde_json::json!({ "text": text });
        let mut msg = message_with_payload(original.clone());

        codec.encode(&mut msg).unwrap();
        assert!(msg.compression.applied);
        assert!(msg.payload.get("blob").is_some());

        codec.decode(&mut msg).unwrap();
        assert!(!msg.compression.applied);
        assert_eq!(msg.payload, original);
    }

    #[test]
    fn test_unknown_cipher_scheme_is_error() {
        let codec = MessageCodec::new();
        let mut msg = message_with_payload(serde_json::json!({}));
        msg.encryption.scheme = "chacha".to_string();
        assert!(matches!(codec.encode(&mut msg), Err(RoutingError::Codec(_))));
    }

    #[test]
    fn test_registered_cipher_applies() {
        struct XorCipher;
        impl PayloadCipher for XorCipher {
            fn name(&self) -> &str {
                "xor-test"
            }
            fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, RoutingError> {
                Ok(plaintext.iter().map(|b| b ^ 0x5a).collect())
            }
            fn open(&self, ciphertext: &[u8]) -> Result<Vec<u8>, RoutingError> {
                self.seal(ciphertext)
            }
        }

        let mut codec = MessageCodec::new();
        codec.register_cipher(Arc::new(XorCipher));

        let original = serde_json::json!({"secret": 42});
        let mut msg = message_with_payload(original.clone());
        msg.encryption.scheme = "xor-test".to_string();

        codec.encode(&mut msg).unwrap();
        assert!(msg.encryption.applied);
        assert_ne!(msg.payload, original);

        codec.decode(&mut msg).unwrap();
        assert_eq!(msg.payload, original);
    }
}
