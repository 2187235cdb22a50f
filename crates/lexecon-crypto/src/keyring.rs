use crate::hash::fingerprint;
use crate::identity::verify_with_key;
use ed25519_dalek::VerifyingKey;
use lexecon_core::{LexeconError, SignatureBytes};
use std::collections::HashMap;
use std::path::Path;

/// Trusted issuer public keys, indexed by fingerprint.
///
/// Ledger and bundle verification resolve the `issuer` field of a signed
/// object through this ring; an absent fingerprint is `UnknownIssuer`, a
/// present one with a bad signature is `VerificationFailed`.
#[derive(Default)]
pub struct KeyRing {
    keys: HashMap<String, VerifyingKey>,
}

impl KeyRing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust a key; returns its fingerprint.
    pub fn trust(&mut self, key: VerifyingKey) -> String {
        let fp = fingerprint(key.as_bytes());
        self.keys.insert(fp.clone(), key);
        fp
    }

    /// Trust a key given its raw 32 public key bytes.
    pub fn trust_bytes(&mut self, public_key_bytes: &[u8]) -> Result<String, LexeconError> {
        let arr: [u8; 32] = public_key_bytes
            .try_into()
            .map_err(|_| LexeconError::KeyMaterialError("public key must be 32 bytes".into()))?;
        let key = VerifyingKey::from_bytes(&arr)
            .map_err(|e| LexeconError::KeyMaterialError(format!("invalid public key: {e}")))?;
        Ok(self.trust(key))
    }

    pub fn contains(&self, issuer: &str) -> bool {
        self.keys.contains_key(issuer)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Verify `signature` over `message` under the key fingerprinted by
    /// `issuer`.
    pub fn verify(
        &self,
        issuer: &str,
        message: &[u8],
        signature: &SignatureBytes,
    ) -> Result<(), LexeconError> {
        let key = self
            .keys
            .get(issuer)
            .ok_or_else(|| LexeconError::UnknownIssuer(issuer.to_string()))?;
        verify_with_key(key, message, signature)
    }

    /// Load a ring from a JSON file holding an array of hex public keys.
    pub fn load(path: &Path) -> Result<Self, LexeconError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| LexeconError::KeyMaterialError(format!("reading key ring: {e}")))?;
        let hexes: Vec<String> = serde_json::from_str(&raw)
            .map_err(|e| LexeconError::KeyMaterialError(format!("parsing key ring: {e}")))?;
        let mut ring = Self::new();
        for h in &hexes {
            let bytes = hex::decode(h)
                .map_err(|e| LexeconError::KeyMaterialError(format!("bad public key hex: {e}")))?;
            ring.trust_bytes(&bytes)?;
        }
        Ok(ring)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::NodeIdentity;

    #[test]
    fn verify_through_ring() {
        let id = NodeIdentity::generate();
        let mut ring = KeyRing::new();
        let fp = ring.trust(id.verifying_key());
        assert_eq!(fp, id.node_id());

        let sig = id.sign(b"msg");
        ring.verify(id.node_id(), b"msg", &sig).unwrap();
    }

    #[test]
    fn unknown_issuer_is_distinct_from_bad_signature() {
        let id = NodeIdentity::generate();
        let sig = id.sign(b"msg");

        let empty = KeyRing::new();
        assert!(matches!(
            empty.verify(id.node_id(), b"msg", &sig).unwrap_err(),
            LexeconError::UnknownIssuer(_)
        ));

        let mut ring = KeyRing::new();
        ring.trust(id.verifying_key());
        assert!(matches!(
            ring.verify(id.node_id(), b"other", &sig).unwrap_err(),
            LexeconError::VerificationFailed(_)
        ));
    }

    #[test]
    fn ring_file_round_trip() {
        let id = NodeIdentity::generate();
        let path = std::env::temp_dir().join(format!("lexecon_ring_{}", std::process::id()));
        let json = serde_json::to_string(&vec![hex::encode(id.public_key_bytes())]).unwrap();
        std::fs::write(&path, json).unwrap();

        let ring = KeyRing::load(&path).unwrap();
        assert!(ring.contains(id.node_id()));
        let _ = std::fs::remove_file(&path);
    }
}
