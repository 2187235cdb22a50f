use crate::types::{Hash32, SignatureBytes, TimestampMs};
use serde::{Deserialize, Serialize};
use std::fmt;

// ── EventType ────────────────────────────────────────────────────────────────

/// What a ledger entry records.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Seq 0 only; previous hash is all zeros.
    Genesis,
    Decision,
    PolicyLoaded,
    ArtifactAnonymized,
    ExportCreated,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Genesis => write!(f, "GENESIS"),
            EventType::Decision => write!(f, "DECISION"),
            EventType::PolicyLoaded => write!(f, "POLICY_LOADED"),
            EventType::ArtifactAnonymized => write!(f, "ARTIFACT_ANONYMIZED"),
            EventType::ExportCreated => write!(f, "EXPORT_CREATED"),
        }
    }
}

// ── LedgerEntry ──────────────────────────────────────────────────────────────

/// One link in the hash chain.
///
/// `hash = SHA-256(canonical(all fields except hash and signature))`, and
/// the issuer signature covers the hash bytes. Entry n's `prev_hash`
/// equals entry n-1's `hash`; never mutated, never deleted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    pub seq: u64,
    pub event_type: EventType,
    pub timestamp: TimestampMs,
    pub payload: serde_json::Value,
    pub prev_hash: Hash32,
    pub hash: Hash32,
    /// Fingerprint of the signing node's public key.
    pub issuer: String,
    pub signature: SignatureBytes,
}

/// The hashed portion of an entry: everything except `hash` and
/// `signature`.
#[derive(Serialize)]
pub struct LedgerEntryBody<'a> {
    pub seq: u64,
    pub event_type: EventType,
    pub timestamp: TimestampMs,
    pub payload: &'a serde_json::Value,
    pub prev_hash: &'a Hash32,
    pub issuer: &'a str,
}

impl LedgerEntry {
    /// Extract the hashed body view.
    pub fn body(&self) -> LedgerEntryBody<'_> {
        LedgerEntryBody {
            seq: self.seq,
            event_type: self.event_type,
            timestamp: self.timestamp,
            payload: &self.payload,
            prev_hash: &self.prev_hash,
            issuer: &self.issuer,
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.seq == 0 && self.prev_hash.is_zero()
    }
}

// ── VerifyReport ─────────────────────────────────────────────────────────────

/// Why chain verification stopped.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VerifyFailure {
    /// Recomputed content hash differs from the stored one.
    HashMismatch,
    /// `prev_hash` does not equal the predecessor's hash.
    BrokenChain,
    /// Issuer signature does not verify over the entry hash.
    BadSignature,
    /// A sequence number in the requested range is absent.
    MissingEntry,
    /// The issuer fingerprint is not in the trusted key ring.
    UnknownIssuer,
}

impl fmt::Display for VerifyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyFailure::HashMismatch => write!(f, "hash_mismatch"),
            VerifyFailure::BrokenChain => write!(f, "broken_chain"),
            VerifyFailure::BadSignature => write!(f, "bad_signature"),
            VerifyFailure::MissingEntry => write!(f, "missing_entry"),
            VerifyFailure::UnknownIssuer => write!(f, "unknown_issuer"),
        }
    }
}

/// Result of walking a chain slice. Verification never throws; corruption
/// is reported, with the first offending sequence number pinned.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VerifyReport {
    pub valid: bool,
    pub entries_checked: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_bad_seq: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<VerifyFailure>,
}

impl VerifyReport {
    pub fn intact(entries_checked: u64) -> Self {
        Self {
            valid: true,
            entries_checked,
            first_bad_seq: None,
            reason: None,
        }
    }

    pub fn broken(entries_checked: u64, seq: u64, reason: VerifyFailure) -> Self {
        Self {
            valid: false,
            entries_checked,
            first_bad_seq: Some(seq),
            reason: Some(reason),
        }
    }
}
