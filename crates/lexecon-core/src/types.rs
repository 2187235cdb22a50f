use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Unix timestamp in milliseconds, UTC. Always supplied by a [`crate::Clock`].
pub type TimestampMs = i64;

// ── Hash32 ───────────────────────────────────────────────────────────────────

/// 32-byte SHA-256 digest. Serialized everywhere as 64 lowercase hex chars:
/// content addresses, policy version hashes, ledger entry hashes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The all-zero hash used as the genesis entry's previous hash.
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash32({}…)", &self.to_hex()[..16])
    }
}

impl Serialize for Hash32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash32::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ── SignatureBytes ───────────────────────────────────────────────────────────

/// Raw signature bytes (64 for Ed25519, 512 for RSA-4096), hex on the wire.
#[derive(Clone, PartialEq, Eq)]
pub struct SignatureBytes(pub Vec<u8>);

impl SignatureBytes {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        Ok(Self(hex::decode(s)?))
    }
}

impl fmt::Debug for SignatureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureBytes({}b)", self.0.len())
    }
}

impl Serialize for SignatureBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SignatureBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        SignatureBytes::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ── SigAlgorithm ─────────────────────────────────────────────────────────────

/// Signature algorithm attribute carried by every signed object.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SigAlgorithm {
    /// Ed25519 — the node identity algorithm.
    Ed25519,
    /// RSA-4096 PKCS#1 v1.5 over SHA-256 — artifact producer signatures
    /// where external verifiers cannot consume Ed25519.
    Rsa4096,
}

impl fmt::Display for SigAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigAlgorithm::Ed25519 => write!(f, "ed25519"),
            SigAlgorithm::Rsa4096 => write!(f, "rsa4096"),
        }
    }
}

// ── TermId ───────────────────────────────────────────────────────────────────

/// Identifier of a term in a policy graph. Also used for the actor, action,
/// tool, resource and data-class fields of a request, which are resolved
/// against the policy's terms at evaluation time.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TermId(pub String);

impl TermId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TermId({})", self.0)
    }
}

impl From<&str> for TermId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ── DecisionId ───────────────────────────────────────────────────────────────

/// Time-sortable globally unique decision identifier (UUID v7).
///
/// The timestamp component comes from the injected clock so that id order
/// follows gateway time, not ambient wall-clock.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionId(pub uuid::Uuid);

impl DecisionId {
    /// Mint a new v7 id whose timestamp bits are `now_ms`.
    pub fn generate(now_ms: TimestampMs) -> Self {
        let secs = now_ms.div_euclid(1000) as u64;
        let nanos = (now_ms.rem_euclid(1000) as u32) * 1_000_000;
        let ts = uuid::Timestamp::from_unix(uuid::NoContext, secs, nanos);
        Self(uuid::Uuid::new_v7(ts))
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(uuid::Uuid::parse_str(s)?))
    }
}

impl fmt::Display for DecisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for DecisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DecisionId({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash32_hex_round_trip() {
        let h = Hash32::from_bytes([0xab; 32]);
        assert_eq!(h.to_hex().len(), 64);
        assert_eq!(Hash32::from_hex(&h.to_hex()).unwrap(), h);
    }

    #[test]
    fn hash32_rejects_wrong_length() {
        assert!(Hash32::from_hex("abcd").is_err());
    }

    #[test]
    fn zero_hash_is_64_zero_chars() {
        assert_eq!(Hash32::zero().to_hex(), "0".repeat(64));
    }

    #[test]
    fn decision_ids_sort_by_time() {
        let a = DecisionId::generate(1_700_000_000_000);
        let b = DecisionId::generate(1_700_000_001_000);
        assert!(a < b);
    }

    #[test]
    fn hash32_serde_is_hex_string() {
        let h = Hash32::from_bytes([1u8; 32]);
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"{}\"", h.to_hex()));
        let back: Hash32 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }
}
