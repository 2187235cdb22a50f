use crate::hash::fingerprint;
use lexecon_core::{LexeconError, SigAlgorithm, SignatureBytes};
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

/// RSA-4096 key size for artifact signing.
pub const RSA_ARTIFACT_KEY_BITS: usize = 4096;

/// Secondary signer for evidence artifacts, where external verifiers
/// require RSA interoperability. PKCS#1 v1.5 over SHA-256.
///
/// The node's decision/ledger path is Ed25519 only; this signer never
/// touches the chain.
pub struct RsaArtifactSigner {
    private_key: RsaPrivateKey,
    signing_key: SigningKey<Sha256>,
    key_fingerprint: String,
}

impl RsaArtifactSigner {
    /// Generate a fresh RSA-4096 signer. Key generation is slow; call once
    /// at provisioning time, then persist.
    pub fn generate() -> Result<Self, LexeconError> {
        Self::generate_with_bits(RSA_ARTIFACT_KEY_BITS)
    }

    /// Generate with an explicit key size. Smaller sizes exist for tests
    /// only; production provisioning uses [`RsaArtifactSigner::generate`].
    pub fn generate_with_bits(bits: usize) -> Result<Self, LexeconError> {
        let private_key = RsaPrivateKey::new(&mut rand::rngs::OsRng, bits)
            .map_err(|e| LexeconError::KeyMaterialError(format!("rsa keygen: {e}")))?;
        Self::from_private_key(private_key)
    }

    /// Restore a signer from PKCS#8 DER bytes.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, LexeconError> {
        let private_key = RsaPrivateKey::from_pkcs8_der(der)
            .map_err(|e| LexeconError::KeyMaterialError(format!("rsa pkcs8: {e}")))?;
        Self::from_private_key(private_key)
    }

    fn from_private_key(private_key: RsaPrivateKey) -> Result<Self, LexeconError> {
        let key_fingerprint = public_key_fingerprint(&private_key.to_public_key())?;
        let signing_key = SigningKey::<Sha256>::new(private_key.clone());
        Ok(Self {
            private_key,
            signing_key,
            key_fingerprint,
        })
    }

    /// Fingerprint of the public key (SHA-256 over its SPKI DER).
    pub fn key_fingerprint(&self) -> &str {
        &self.key_fingerprint
    }

    pub fn algorithm(&self) -> SigAlgorithm {
        SigAlgorithm::Rsa4096
    }

    pub fn public_key(&self) -> RsaPublicKey {
        self.private_key.to_public_key()
    }

    /// Export the private key as PKCS#8 DER for persistence.
    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>, LexeconError> {
        Ok(self
            .private_key
            .to_pkcs8_der()
            .map_err(|e| LexeconError::KeyMaterialError(format!("rsa pkcs8 export: {e}")))?
            .as_bytes()
            .to_vec())
    }

    /// Sign raw bytes (canonical bytes or a content hash).
    pub fn sign(&self, message: &[u8]) -> SignatureBytes {
        SignatureBytes(self.signing_key.sign(message).to_vec())
    }
}

impl std::fmt::Debug for RsaArtifactSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RsaArtifactSigner({}…)", &self.key_fingerprint[..16])
    }
}

/// SHA-256 fingerprint over the public key's SPKI DER encoding.
pub fn public_key_fingerprint(key: &RsaPublicKey) -> Result<String, LexeconError> {
    let der = key
        .to_public_key_der()
        .map_err(|e| LexeconError::KeyMaterialError(format!("rsa spki: {e}")))?;
    Ok(fingerprint(der.as_bytes()))
}

/// Verify an RSA PKCS#1 v1.5 / SHA-256 signature.
pub fn verify(
    key: &RsaPublicKey,
    message: &[u8],
    signature: &SignatureBytes,
) -> Result<(), LexeconError> {
    let sig = Signature::try_from(signature.as_bytes())
        .map_err(|e| LexeconError::VerificationFailed(format!("malformed rsa signature: {e}")))?;
    VerifyingKey::<Sha256>::new(key.clone())
        .verify(message, &sig)
        .map_err(|_| LexeconError::VerificationFailed("rsa signature mismatch".into()))
}
