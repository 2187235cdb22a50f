use crate::hash::fingerprint;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use lexecon_core::{LexeconError, SignatureBytes};
use rand::rngs::OsRng;

/// A node's Ed25519 signing identity.
///
/// The node id is the hex SHA-256 fingerprint of the public key; it
/// appears as `issuer` on every object this identity signs. The secret
/// key is zeroized on drop by the underlying `SigningKey`.
pub struct NodeIdentity {
    signing_key: SigningKey,
    node_id: String,
}

impl NodeIdentity {
    /// Generate a fresh identity.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self::from_signing_key(signing_key)
    }

    /// Restore an identity from raw secret key bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, LexeconError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| LexeconError::KeyMaterialError("secret key must be 32 bytes".into()))?;
        Ok(Self::from_signing_key(SigningKey::from_bytes(&arr)))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let node_id = fingerprint(signing_key.verifying_key().as_bytes());
        Self {
            signing_key,
            node_id,
        }
    }

    /// The public-key fingerprint identifying this node.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn secret_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Sign raw bytes. Callers pass canonical bytes or hash bytes, never a
    /// language value.
    pub fn sign(&self, message: &[u8]) -> SignatureBytes {
        SignatureBytes(self.signing_key.sign(message).to_bytes().to_vec())
    }
}

impl std::fmt::Debug for NodeIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeIdentity({}…)", &self.node_id[..16])
    }
}

/// Verify an Ed25519 signature under a raw 32-byte public key.
pub fn verify(
    public_key_bytes: &[u8],
    message: &[u8],
    signature: &SignatureBytes,
) -> Result<(), LexeconError> {
    let arr: [u8; 32] = public_key_bytes
        .try_into()
        .map_err(|_| LexeconError::KeyMaterialError("public key must be 32 bytes".into()))?;
    let key = VerifyingKey::from_bytes(&arr)
        .map_err(|e| LexeconError::KeyMaterialError(format!("invalid public key: {e}")))?;
    verify_with_key(&key, message, signature)
}

/// Verify an Ed25519 signature under an already-parsed key.
pub fn verify_with_key(
    key: &VerifyingKey,
    message: &[u8],
    signature: &SignatureBytes,
) -> Result<(), LexeconError> {
    let sig = Signature::from_slice(signature.as_bytes())
        .map_err(|e| LexeconError::VerificationFailed(format!("malformed signature: {e}")))?;
    key.verify_strict(message, &sig)
        .map_err(|_| LexeconError::VerificationFailed("ed25519 signature mismatch".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_round_trip() {
        let id = NodeIdentity::generate();
        let sig = id.sign(b"canonical bytes");
        assert_eq!(sig.as_bytes().len(), 64);
        verify(&id.public_key_bytes(), b"canonical bytes", &sig).unwrap();
    }

    #[test]
    fn tampered_message_fails() {
        let id = NodeIdentity::generate();
        let sig = id.sign(b"original");
        let err = verify(&id.public_key_bytes(), b"tampered", &sig).unwrap_err();
        assert!(matches!(err, LexeconError::VerificationFailed(_)));
    }

    #[test]
    fn restored_identity_has_same_node_id() {
        let id = NodeIdentity::generate();
        let restored = NodeIdentity::from_secret_bytes(&id.secret_key_bytes()).unwrap();
        assert_eq!(id.node_id(), restored.node_id());
    }

    #[test]
    fn node_id_is_pubkey_fingerprint() {
        let id = NodeIdentity::generate();
        assert_eq!(id.node_id(), fingerprint(&id.public_key_bytes()));
        assert_eq!(id.node_id().len(), 64);
    }

    #[test]
    fn wrong_length_secret_is_key_material_error() {
        let err = NodeIdentity::from_secret_bytes(&[1u8; 16]).unwrap_err();
        assert!(matches!(err, LexeconError::KeyMaterialError(_)));
    }
}
