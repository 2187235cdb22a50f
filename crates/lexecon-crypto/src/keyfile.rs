use crate::identity::NodeIdentity;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use lexecon_core::LexeconError;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use zeroize::Zeroizing;

/// On-disk key envelope. The secret is stored either as plain hex or as a
/// ChaCha20-Poly1305 ciphertext under a passphrase-derived key.
#[derive(Serialize, Deserialize)]
struct KeyFile {
    algorithm: String,
    encrypted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    salt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nonce: Option<String>,
    /// Hex of the raw secret (plain) or of the AEAD ciphertext (encrypted).
    secret: String,
}

const KEYFILE_ALGORITHM: &str = "ed25519";

fn derive_key(passphrase: &str, salt: &[u8]) -> Key {
    let mut hasher = Sha256::new();
    hasher.update(passphrase.as_bytes());
    hasher.update(salt);
    Key::from(<[u8; 32]>::from(hasher.finalize()))
}

/// Write an identity's secret key to `path` in plain hex.
pub fn save_plain(identity: &NodeIdentity, path: &Path) -> Result<(), LexeconError> {
    let file = KeyFile {
        algorithm: KEYFILE_ALGORITHM.into(),
        encrypted: false,
        salt: None,
        nonce: None,
        secret: hex::encode(identity.secret_key_bytes()),
    };
    write_keyfile(&file, path)
}

/// Write an identity's secret key to `path`, encrypted under `passphrase`.
pub fn save_encrypted(
    identity: &NodeIdentity,
    path: &Path,
    passphrase: &str,
) -> Result<(), LexeconError> {
    let mut salt = [0u8; 16];
    let mut nonce_bytes = [0u8; 12];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let cipher = ChaCha20Poly1305::new(&derive_key(passphrase, &salt));
    let secret = Zeroizing::new(identity.secret_key_bytes());
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), secret.as_slice())
        .map_err(|_| LexeconError::KeyMaterialError("key encryption failed".into()))?;

    let file = KeyFile {
        algorithm: KEYFILE_ALGORITHM.into(),
        encrypted: true,
        salt: Some(hex::encode(salt)),
        nonce: Some(hex::encode(nonce_bytes)),
        secret: hex::encode(ciphertext),
    };
    write_keyfile(&file, path)
}

/// Load an identity from `path`. `passphrase` is required iff the file is
/// encrypted; a wrong passphrase or a corrupt file fails with
/// `KeyMaterialError`.
pub fn load(path: &Path, passphrase: Option<&str>) -> Result<NodeIdentity, LexeconError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| LexeconError::KeyMaterialError(format!("reading key file: {e}")))?;
    let file: KeyFile = serde_json::from_str(&raw)
        .map_err(|e| LexeconError::KeyMaterialError(format!("parsing key file: {e}")))?;

    if file.algorithm != KEYFILE_ALGORITHM {
        return Err(LexeconError::KeyMaterialError(format!(
            "unsupported key algorithm: {}",
            file.algorithm
        )));
    }

    let secret_or_ct = hex::decode(&file.secret)
        .map_err(|e| LexeconError::KeyMaterialError(format!("bad secret hex: {e}")))?;

    if !file.encrypted {
        return NodeIdentity::from_secret_bytes(&secret_or_ct);
    }

    let passphrase = passphrase.ok_or_else(|| {
        LexeconError::KeyMaterialError("key file is encrypted; passphrase required".into())
    })?;
    let salt = file
        .salt
        .as_deref()
        .and_then(|s| hex::decode(s).ok())
        .ok_or_else(|| LexeconError::KeyMaterialError("missing or bad salt".into()))?;
    let nonce = file
        .nonce
        .as_deref()
        .and_then(|s| hex::decode(s).ok())
        .filter(|n| n.len() == 12)
        .ok_or_else(|| LexeconError::KeyMaterialError("missing or bad nonce".into()))?;

    let cipher = ChaCha20Poly1305::new(&derive_key(passphrase, &salt));
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(Nonce::from_slice(&nonce), secret_or_ct.as_slice())
            .map_err(|_| {
                LexeconError::KeyMaterialError("wrong passphrase or corrupt key file".into())
            })?,
    );
    NodeIdentity::from_secret_bytes(&plaintext)
}

fn write_keyfile(file: &KeyFile, path: &Path) -> Result<(), LexeconError> {
    let json = serde_json::to_string_pretty(file)
        .map_err(|e| LexeconError::Serialization(e.to_string()))?;
    std::fs::write(path, json)
        .map_err(|e| LexeconError::KeyMaterialError(format!("writing key file: {e}")))
}
