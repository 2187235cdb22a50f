use lexecon_core::{Hash32, LexeconError};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// SHA-256 of arbitrary bytes.
pub fn sha256(data: &[u8]) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Hash32::from_bytes(hasher.finalize().into())
}

/// SHA-256 of a value's canonical serialization. Every content hash in the
/// gateway (policy versions, ledger entries, checksums) goes through here.
pub fn hash_canonical<T: Serialize>(value: &T) -> Result<Hash32, LexeconError> {
    let bytes = lexecon_codec::canonical_bytes(value)
        .map_err(|e| LexeconError::CanonicalEncodingError(e.to_string()))?;
    Ok(sha256(&bytes))
}

/// Public-key fingerprint: lowercase hex of SHA-256 over the raw public
/// key bytes. Used as the node id on every signed object.
pub fn fingerprint(public_key_bytes: &[u8]) -> String {
    sha256(public_key_bytes).to_hex()
}
