//! lexecon-crypto
//!
//! Node identity and signing primitives: Ed25519 keypairs with SHA-256
//! public-key fingerprints, passphrase-encrypted key files, a trusted key
//! ring for verification, and the secondary RSA-4096 artifact signer for
//! external verifiers. Everything signed here is canonical bytes produced
//! by lexecon-codec; no structure is ever signed directly.

pub mod hash;
pub mod identity;
pub mod keyfile;
pub mod keyring;
pub mod rsa_signer;

pub use hash::{hash_canonical, sha256};
pub use identity::NodeIdentity;
pub use keyring::KeyRing;
pub use rsa_signer::RsaArtifactSigner;
