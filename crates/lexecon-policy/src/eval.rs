use crate::bundle::Policy;
use lexecon_core::decision::{Outcome, TraceEntry, TraceKind};
use lexecon_core::policy::{PolicyMode, Relation, RelationKind};
use lexecon_core::request::DecisionRequest;

/// Result of one policy evaluation. Deterministic: equal canonical inputs
/// produce an identical outcome, reason and trace.
#[derive(Clone, Debug, PartialEq)]
pub struct EvalOutcome {
    pub outcome: Outcome,
    pub reason: String,
    pub trace: Vec<TraceEntry>,
}

/// Evaluate a request against a policy under its mode.
///
/// Evaluation never fails: unknown actors, actions or objects simply match
/// no relation, and the mode decides what that means. Relations are
/// inspected in canonical order — forbids, then permits, then requires —
/// so the trace is reproducible.
pub fn evaluate(policy: &Policy, request: &DecisionRequest, paranoid_hint_max: u8) -> EvalOutcome {
    let mut trace = Vec::new();

    // ── Forbids: any satisfied forbid wins immediately ───────────────────────
    for relation in policy.candidates(RelationKind::Forbids, &request.actor, &request.action) {
        let matched = relation_matches(relation, request);
        trace.push(trace_entry(relation, TraceKind::Forbids, matched, request));
        if matched {
            return EvalOutcome {
                outcome: Outcome::Deny,
                reason: "forbidden".into(),
                trace,
            };
        }
    }

    // ── Permits ──────────────────────────────────────────────────────────────
    let mut permit_matched = false;
    let mut permit_candidates = 0usize;
    for relation in policy.candidates(RelationKind::Permits, &request.actor, &request.action) {
        permit_candidates += 1;
        let matched = relation_matches(relation, request);
        trace.push(trace_entry(relation, TraceKind::Permits, matched, request));
        permit_matched |= matched;
    }

    // ── Mode rule ────────────────────────────────────────────────────────────
    let (outcome, reason) = match policy.mode() {
        PolicyMode::Permissive => {
            if permit_matched {
                (Outcome::Permit, "permit_matched")
            } else {
                (Outcome::Permit, "permissive_default")
            }
        }
        PolicyMode::Strict => {
            if permit_matched {
                (Outcome::Permit, "permit_matched")
            } else {
                (Outcome::Deny, "not_permitted")
            }
        }
        PolicyMode::Paranoid => {
            if request.risk_hint > paranoid_hint_max {
                (Outcome::Escalate, "requires_human")
            } else if permit_matched {
                (Outcome::Permit, "permit_matched")
            } else if permit_candidates == 0 {
                // No explicit permit rules govern this pair; the low-hint
                // baseline is permissive.
                (Outcome::Permit, "permissive_default")
            } else {
                (Outcome::Escalate, "requires_human")
            }
        }
    };
    trace.push(TraceEntry {
        relation_id: format!("mode:{}", policy.mode()),
        kind: TraceKind::Mode,
        matched: outcome == Outcome::Permit,
        note: format!("mode {} yields {}", policy.mode(), outcome),
    });

    if outcome != Outcome::Permit {
        return EvalOutcome {
            outcome,
            reason: reason.into(),
            trace,
        };
    }

    // ── Requires: an unsatisfied requirement downgrades a permit ─────────────
    let mut missing_requirement = false;
    for relation in policy.candidates(RelationKind::Requires, &request.actor, &request.action) {
        if !object_matches(relation, request) {
            continue;
        }
        let satisfied = match &relation.constraint {
            Some(key) => request.context_flag(key),
            None => true,
        };
        trace.push(trace_entry(relation, TraceKind::Requires, satisfied, request));
        missing_requirement |= !satisfied;
    }
    if missing_requirement {
        return EvalOutcome {
            outcome: Outcome::Escalate,
            reason: "missing_requirement".into(),
            trace,
        };
    }

    EvalOutcome {
        outcome: Outcome::Permit,
        reason: reason.into(),
        trace,
    }
}

/// Whether a permits/forbids relation applies to this request: object and
/// constraint must both hold.
fn relation_matches(relation: &Relation, request: &DecisionRequest) -> bool {
    if !object_matches(relation, request) {
        return false;
    }
    match &relation.constraint {
        Some(key) => request.context_flag(key),
        None => true,
    }
}

/// A relation with no object matches any object; one with an object
/// matches an equal resource or a data-class membership.
fn object_matches(relation: &Relation, request: &DecisionRequest) -> bool {
    match &relation.object {
        None => true,
        Some(object) => {
            request.resource.as_ref() == Some(object) || request.data_classes.contains(object)
        }
    }
}

fn trace_entry(
    relation: &Relation,
    kind: TraceKind,
    matched: bool,
    request: &DecisionRequest,
) -> TraceEntry {
    let note = match (kind, matched) {
        (TraceKind::Forbids, true) => match &relation.object {
            Some(object) if request.data_classes.contains(object) => {
                format!("data class {object} matched")
            }
            Some(object) => format!("object {object} matched"),
            None => "unconditional forbid".to_string(),
        },
        (TraceKind::Forbids, false) => "forbid did not apply".to_string(),
        (TraceKind::Permits, true) => "permit applies".to_string(),
        (TraceKind::Permits, false) => "permit did not apply".to_string(),
        (TraceKind::Requires, true) => "requirement satisfied".to_string(),
        (TraceKind::Requires, false) => format!(
            "requirement {} not satisfied",
            relation.constraint.as_deref().unwrap_or("(none)")
        ),
        (TraceKind::Mode, _) => String::new(),
    };
    TraceEntry {
        relation_id: relation.relation_id(),
        kind,
        matched,
        note,
    }
}
