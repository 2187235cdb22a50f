use crate::constants::{RISK_HIGH_MAX, RISK_LOW_MAX, RISK_MEDIUM_MAX};
use crate::types::{Hash32, SigAlgorithm, SignatureBytes, TimestampMs};
use serde::{Deserialize, Serialize};
use std::fmt;

// ── RiskLevel ────────────────────────────────────────────────────────────────

/// Quantized overall risk. Boundaries are inclusive on the lower level:
/// 25.0 is LOW, 25.0001 is MEDIUM.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_overall(overall: f64) -> Self {
        if overall <= RISK_LOW_MAX {
            RiskLevel::Low
        } else if overall <= RISK_MEDIUM_MAX {
            RiskLevel::Medium
        } else if overall <= RISK_HIGH_MAX {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
            RiskLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

// ── Dimensions ───────────────────────────────────────────────────────────────

/// The six dimension scores, each in [0, 100].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct RiskScores {
    pub action_sensitivity: f64,
    pub resource_sensitivity: f64,
    pub data_class_exposure: f64,
    pub actor_history: f64,
    pub context_anomaly: f64,
    pub declared_intent: f64,
}

/// Per-dimension weights from the policy bundle. Part of the policy hash,
/// so changing a weight produces a new policy version.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RiskWeights {
    pub action_sensitivity: f64,
    pub resource_sensitivity: f64,
    pub data_class_exposure: f64,
    pub actor_history: f64,
    pub context_anomaly: f64,
    pub declared_intent: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            action_sensitivity: 1.0,
            resource_sensitivity: 1.0,
            data_class_exposure: 1.0,
            actor_history: 1.0,
            context_anomaly: 1.0,
            declared_intent: 1.0,
        }
    }
}

impl RiskWeights {
    pub fn total(&self) -> f64 {
        self.action_sensitivity
            + self.resource_sensitivity
            + self.data_class_exposure
            + self.actor_history
            + self.context_anomaly
            + self.declared_intent
    }
}

// ── RiskRecord ───────────────────────────────────────────────────────────────

/// Signed, append-only scoring record referenced by a decision.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RiskRecord {
    /// Time-sortable record id (UUID v7).
    pub risk_id: String,
    pub request_id: String,
    pub scores: RiskScores,
    /// Weighted mean of the dimension scores.
    pub overall: f64,
    pub level: RiskLevel,
    pub policy_version_hash: Hash32,
    pub computed_at: TimestampMs,
    pub issuer: String,
    pub signature_algorithm: SigAlgorithm,
    pub signature: SignatureBytes,
}

/// The signed portion of a risk record: everything except `signature`.
#[derive(Serialize)]
pub struct RiskRecordBody<'a> {
    pub risk_id: &'a str,
    pub request_id: &'a str,
    pub scores: &'a RiskScores,
    pub overall: f64,
    pub level: RiskLevel,
    pub policy_version_hash: &'a Hash32,
    pub computed_at: TimestampMs,
    pub issuer: &'a str,
    pub signature_algorithm: SigAlgorithm,
}

impl RiskRecord {
    pub fn body(&self) -> RiskRecordBody<'_> {
        RiskRecordBody {
            risk_id: &self.risk_id,
            request_id: &self.request_id,
            scores: &self.scores,
            overall: self.overall,
            level: self.level,
            policy_version_hash: &self.policy_version_hash,
            computed_at: self.computed_at,
            issuer: &self.issuer,
            signature_algorithm: self.signature_algorithm,
        }
    }
}
