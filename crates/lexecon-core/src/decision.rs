use crate::error::LexeconError;
use crate::types::{DecisionId, Hash32, SigAlgorithm, SignatureBytes, TimestampMs};
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Outcome ──────────────────────────────────────────────────────────────────

/// Adjudication result. `DENY` and `ESCALATE` are successful responses,
/// not errors.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Permit,
    Deny,
    Escalate,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Permit => write!(f, "PERMIT"),
            Outcome::Deny => write!(f, "DENY"),
            Outcome::Escalate => write!(f, "ESCALATE"),
        }
    }
}

// ── Reason trace ─────────────────────────────────────────────────────────────

/// What kind of rule a trace entry cites.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TraceKind {
    Permits,
    Forbids,
    Requires,
    /// The mode rule applied after relation matching.
    Mode,
}

/// One inspected rule that influenced the outcome. The ordered list of
/// these is part of the signed decision.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TraceEntry {
    pub relation_id: String,
    pub kind: TraceKind,
    pub matched: bool,
    pub note: String,
}

// ── Decision ─────────────────────────────────────────────────────────────────

/// A signed, ledger-anchored adjudication.
///
/// The signature covers the canonical serialization of every field except
/// `signature` and `ledger_entry_hash`; the ledger entry then commits the
/// fully assembled object (minus the entry hash, which only exists once the
/// entry does) and its hash is written back here.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Decision {
    pub decision_id: DecisionId,
    pub request_id: String,
    pub outcome: Outcome,
    /// Short machine token, e.g. `permit_matched`, `forbidden`,
    /// `not_permitted`, `requires_human`, `missing_requirement`,
    /// `risk_critical`, `malformed_request`.
    pub reason: String,
    pub reason_trace: Vec<TraceEntry>,
    pub policy_version_hash: Hash32,
    /// Wire-encoded capability token; present iff `outcome` is `PERMIT`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability_token: Option<String>,
    /// Absent only on the recorded deny for a malformed request, which
    /// cannot be risk-scored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score_id: Option<String>,
    pub evidence_artifact_ids: Vec<Hash32>,
    pub ledger_entry_hash: Hash32,
    pub issuer_id: String,
    pub issued_at: TimestampMs,
    pub signature_algorithm: SigAlgorithm,
    pub signature: SignatureBytes,
}

/// The fields covered by the decision signature: everything except the
/// signature itself and the ledger entry hash (which does not exist yet at
/// signing time).
#[derive(Serialize)]
pub struct DecisionBody<'a> {
    pub decision_id: &'a DecisionId,
    pub request_id: &'a str,
    pub outcome: Outcome,
    pub reason: &'a str,
    pub reason_trace: &'a [TraceEntry],
    pub policy_version_hash: &'a Hash32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_score_id: Option<&'a str>,
    pub evidence_artifact_ids: &'a [Hash32],
    pub issuer_id: &'a str,
    pub issued_at: TimestampMs,
    pub signature_algorithm: SigAlgorithm,
}

impl Decision {
    /// Extract the signed body view.
    pub fn body(&self) -> DecisionBody<'_> {
        DecisionBody {
            decision_id: &self.decision_id,
            request_id: &self.request_id,
            outcome: self.outcome,
            reason: &self.reason,
            reason_trace: &self.reason_trace,
            policy_version_hash: &self.policy_version_hash,
            capability_token: self.capability_token.as_deref(),
            risk_score_id: self.risk_score_id.as_deref(),
            evidence_artifact_ids: &self.evidence_artifact_ids,
            issuer_id: &self.issuer_id,
            issued_at: self.issued_at,
            signature_algorithm: self.signature_algorithm,
        }
    }

    /// The ledger payload: the assembled signed object minus the entry
    /// hash, which is only known once the ledger has committed it.
    pub fn ledger_payload(&self) -> Result<serde_json::Value, LexeconError> {
        let mut value = serde_json::to_value(self)
            .map_err(|e| LexeconError::CanonicalEncodingError(e.to_string()))?;
        if let Some(map) = value.as_object_mut() {
            map.remove("ledger_entry_hash");
        }
        Ok(value)
    }

    /// Core invariant: a decision is `PERMIT` with a token, or not-`PERMIT`
    /// with no token.
    pub fn token_invariant_holds(&self) -> bool {
        (self.outcome == Outcome::Permit) == self.capability_token.is_some()
    }
}
