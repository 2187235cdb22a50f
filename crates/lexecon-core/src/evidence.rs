use crate::config::RetentionConfig;
use crate::constants::MS_PER_DAY;
use crate::types::{Hash32, SigAlgorithm, SignatureBytes, TimestampMs};
use serde::{Deserialize, Serialize};

// ── Categories and retention ─────────────────────────────────────────────────

/// What an evidence artifact records.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactCategory {
    DecisionLog,
    PolicySnapshot,
    Attestation,
    Screenshot,
    AuditTrail,
    ExternalReport,
}

impl ArtifactCategory {
    /// Stable key used for the category secondary index.
    pub fn index_key(&self) -> &'static str {
        match self {
            ArtifactCategory::DecisionLog => "decision_log",
            ArtifactCategory::PolicySnapshot => "policy_snapshot",
            ArtifactCategory::Attestation => "attestation",
            ArtifactCategory::Screenshot => "screenshot",
            ArtifactCategory::AuditTrail => "audit_trail",
            ArtifactCategory::ExternalReport => "external_report",
        }
    }
}

/// Drives the anonymization sweep: how long artifact content outlives its
/// creation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetentionClass {
    /// High-risk material kept for the regulatory horizon.
    Regulatory,
    Standard,
    Ephemeral,
}

impl RetentionClass {
    /// When content under this class expires, given its creation time.
    pub fn expires_at(&self, created_at: TimestampMs, cfg: &RetentionConfig) -> TimestampMs {
        let days = match self {
            RetentionClass::Regulatory => cfg.regulatory_days,
            RetentionClass::Standard => cfg.standard_days,
            RetentionClass::Ephemeral => cfg.ephemeral_days,
        };
        created_at + days as i64 * MS_PER_DAY
    }
}

// ── Artifact metadata ────────────────────────────────────────────────────────

/// Optional producer signature over the artifact content hash, for
/// external verifiers.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProducerSignature {
    pub algorithm: SigAlgorithm,
    /// Fingerprint of the producer's public key.
    pub key_fingerprint: String,
    pub signature: SignatureBytes,
}

/// Metadata for one content-addressed artifact. The content itself lives
/// in a separate blob table; after anonymization the blob is gone and this
/// record (hash, category, timestamps, linkages) is all that remains.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ArtifactMeta {
    /// SHA-256 of the content; the primary key. Duplicate content
    /// collapses onto one artifact with merged linkages.
    pub id: Hash32,
    pub category: ArtifactCategory,
    pub size: u64,
    pub retention_class: RetentionClass,
    // No skip attribute: this struct is bincode-encoded in the store, and
    // bincode requires every field present.
    #[serde(default)]
    pub producer_signature: Option<ProducerSignature>,
    /// Decisions this artifact is linked to.
    pub linked_decisions: Vec<String>,
    pub created_at: TimestampMs,
    /// True once the sweep has replaced the content with this metadata.
    #[serde(default)]
    pub anonymized: bool,
}
