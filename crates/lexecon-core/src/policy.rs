use crate::risk::RiskWeights;
use crate::types::TermId;
use serde::{Deserialize, Serialize};
use std::fmt;

// ── TermCategory ─────────────────────────────────────────────────────────────

/// What kind of node a term is in the policy graph.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TermCategory {
    Actor,
    Action,
    Resource,
    DataClass,
    Context,
}

// ── Term ─────────────────────────────────────────────────────────────────────

/// A node in the policy graph. Unique by `id` within a policy.
///
/// Attributes are free-form JSON consumed by the risk engine; the ones it
/// reads are `sensitivity` (0–100) and `trust` (0–100). Non-integer numeric
/// attribute values use string form so the bundle hash never depends on
/// float formatting.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Term {
    pub id: TermId,
    pub category: TermCategory,
    pub label: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl Term {
    /// Integer attribute lookup, clamped to 0–100. Returns `None` when the
    /// attribute is absent or not an integer.
    pub fn attr_score(&self, key: &str) -> Option<u8> {
        self.attributes
            .get(key)
            .and_then(|v| v.as_i64())
            .map(|n| n.clamp(0, 100) as u8)
    }
}

// ── Relation ─────────────────────────────────────────────────────────────────

/// Typed directed edge between terms.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Permits,
    Forbids,
    Requires,
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationKind::Permits => write!(f, "permits"),
            RelationKind::Forbids => write!(f, "forbids"),
            RelationKind::Requires => write!(f, "requires"),
        }
    }
}

/// A permits / forbids / requires edge. Unique by the 4-tuple
/// (kind, subject, action, object).
///
/// `constraint` names a context key that must be boolean `true` in the
/// request: a constrained `permits`/`forbids` only matches when the key
/// holds, and a `requires` is satisfied only when the key holds.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Relation {
    #[serde(rename = "type")]
    pub kind: RelationKind,
    pub subject: TermId,
    pub action: TermId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<TermId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
}

impl Relation {
    /// Stable human-readable id derived from the uniqueness 4-tuple; cited
    /// in reason traces.
    pub fn relation_id(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.kind,
            self.subject,
            self.action,
            self.object.as_ref().map(|o| o.as_str()).unwrap_or("*")
        )
    }

    /// Sort key matching the canonical relation order used by the policy hash.
    pub fn sort_key(&self) -> (RelationKind, &str, &str, &str) {
        (
            self.kind,
            self.subject.as_str(),
            self.action.as_str(),
            self.object.as_ref().map(|o| o.as_str()).unwrap_or(""),
        )
    }
}

// ── PolicyMode ───────────────────────────────────────────────────────────────

/// Evaluation discipline applied after forbid matching.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyMode {
    /// Permit unless a forbid matched.
    Permissive,
    /// Permit only when a permit relation matched.
    Strict,
    /// Permit only when a permit matched and the caller risk hint is low;
    /// everything else escalates to a human.
    Paranoid,
}

impl fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyMode::Permissive => write!(f, "PERMISSIVE"),
            PolicyMode::Strict => write!(f, "STRICT"),
            PolicyMode::Paranoid => write!(f, "PARANOID"),
        }
    }
}

// ── PolicyBundle ─────────────────────────────────────────────────────────────

/// The administrator-supplied policy load input (§6 wire format):
/// `{mode, terms, relations, risk_weights}`. Validated and compiled into an
/// immutable `Policy` by the policy crate; the bundle's canonical hash is
/// the policy version.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PolicyBundle {
    pub mode: PolicyMode,
    pub terms: Vec<Term>,
    pub relations: Vec<Relation>,
    #[serde(default)]
    pub risk_weights: RiskWeights,
}
