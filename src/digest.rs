//! Content hashing
//!
//! All hashes are BLAKE3 rendered as 64 lowercase hex characters. Raw payloads
//! kept inside the IR are hex-encoded so IR files stay valid UTF-8.

use crate::{Error, Result};

/// Lowercase hex content hash of a byte payload
pub fn content_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Lowercase hex content hash of a text
pub fn text_hash(text: &str) -> String {
    content_hash(text.as_bytes())
}

/// Encode a raw payload for storage in an attribute bag
pub fn encode_payload(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decode a payload previously produced by [`encode_payload`]
pub fn decode_payload(encoded: &str) -> Result<Vec<u8>> {
    hex::decode(encoded).map_err(|e| Error::parse("ir", format!("corrupt raw payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_lowercase_hex() {
        let hash = content_hash(b"In the beginning");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert_eq!(hash, text_hash("In the beginning"));
    }

    #[test]
    fn test_payload_roundtrip() {
        let raw = b"\x00\x01<osis/>\xff";
        assert_eq!(decode_payload(&encode_payload(raw)).unwrap(), raw);
        assert!(decode_payload("zz").is_err());
    }
}
