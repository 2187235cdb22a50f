//! lexecon-risk
//!
//! Deterministic dimensional risk scoring. No learning, no randomness, no
//! time: the same request against the same policy always produces the same
//! six scores, overall value, and level. The weights come from the policy
//! bundle and are therefore part of the policy version hash.

use lexecon_core::policy::Term;
use lexecon_core::request::DecisionRequest;
use lexecon_core::risk::{RiskLevel, RiskScores, RiskWeights};
use lexecon_core::TermId;
use lexecon_policy::Policy;

/// Context keys the gateway understands; anything else counts toward the
/// anomaly dimension.
const RECOGNIZED_CONTEXT_KEYS: &[&str] = &["user_approval", "purpose", "session_id", "origin"];

/// Score assigned to a term the policy does not define.
const UNKNOWN_TERM_SCORE: f64 = 60.0;

/// Baseline for actions/resources that carry no sensitivity attribute.
const DEFAULT_SENSITIVITY: f64 = 40.0;

/// Baseline trust for actors without a trust attribute.
const DEFAULT_TRUST: f64 = 50.0;

/// Unsigned scoring output; the decision service wraps it into a signed
/// `RiskRecord`.
#[derive(Clone, Debug, PartialEq)]
pub struct RiskAssessment {
    pub scores: RiskScores,
    pub overall: f64,
    pub level: RiskLevel,
}

/// Score a request against the policy's term attributes under the
/// bundle's weights.
pub fn assess(policy: &Policy, request: &DecisionRequest) -> RiskAssessment {
    let scores = RiskScores {
        action_sensitivity: sensitivity_of(policy.term(&request.action)),
        resource_sensitivity: resource_sensitivity(policy, request),
        data_class_exposure: data_class_exposure(policy, request),
        actor_history: actor_history(policy.term(&request.actor)),
        context_anomaly: context_anomaly(request),
        declared_intent: declared_intent(request.risk_hint),
    };
    let overall = weighted_mean(&scores, policy.risk_weights());
    RiskAssessment {
        scores,
        overall,
        level: RiskLevel::from_overall(overall),
    }
}

/// `sensitivity` attribute of a term, or fixed defaults when the term is
/// unknown or unattributed.
fn sensitivity_of(term: Option<&Term>) -> f64 {
    match term {
        Some(t) => t
            .attr_score("sensitivity")
            .map(f64::from)
            .unwrap_or(DEFAULT_SENSITIVITY),
        None => UNKNOWN_TERM_SCORE,
    }
}

/// A request touching no resource scores low; an unknown resource scores
/// as unknown; a known one uses its sensitivity attribute.
fn resource_sensitivity(policy: &Policy, request: &DecisionRequest) -> f64 {
    match &request.resource {
        None => 10.0,
        Some(id) => sensitivity_of(policy.term(id)),
    }
}

/// Maximum sensitivity over the declared data classes; zero when none.
fn data_class_exposure(policy: &Policy, request: &DecisionRequest) -> f64 {
    request
        .data_classes
        .iter()
        .map(|id: &TermId| sensitivity_of(policy.term(id)))
        .fold(0.0, f64::max)
}

/// Inverse of the actor's declared trust attribute.
fn actor_history(term: Option<&Term>) -> f64 {
    match term {
        Some(t) => 100.0 - t.attr_score("trust").map(f64::from).unwrap_or(DEFAULT_TRUST),
        None => UNKNOWN_TERM_SCORE,
    }
}

/// Twelve points per unrecognized context key, capped at 100.
fn context_anomaly(request: &DecisionRequest) -> f64 {
    let unrecognized = request
        .context
        .keys()
        .filter(|k| !RECOGNIZED_CONTEXT_KEYS.contains(&k.as_str()))
        .count();
    (unrecognized as f64 * 12.0).min(100.0)
}

/// The caller's own hint, stretched over the scale: 1 → 0, 5 → 100.
fn declared_intent(risk_hint: u8) -> f64 {
    f64::from(risk_hint.saturating_sub(1)) * 25.0
}

fn weighted_mean(scores: &RiskScores, weights: &RiskWeights) -> f64 {
    let total = weights.total();
    if total == 0.0 {
        return 0.0;
    }
    (scores.action_sensitivity * weights.action_sensitivity
        + scores.resource_sensitivity * weights.resource_sensitivity
        + scores.data_class_exposure * weights.data_class_exposure
        + scores.actor_history * weights.actor_history
        + scores.context_anomaly * weights.context_anomaly
        + scores.declared_intent * weights.declared_intent)
        / total
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexecon_core::policy::PolicyBundle;
    use serde_json::json;

    fn policy(weights: serde_json::Value) -> Policy {
        let bundle: PolicyBundle = serde_json::from_value(json!({
            "mode": "STRICT",
            "terms": [
                {"id": "agent_a", "category": "actor", "label": "Agent A",
                 "attributes": {"trust": 90}},
                {"id": "deploy", "category": "action", "label": "Deploy",
                 "attributes": {"sensitivity": 80}},
                {"id": "read_public", "category": "action", "label": "Read public",
                 "attributes": {"sensitivity": 0}},
                {"id": "pii", "category": "data_class", "label": "Personal data",
                 "attributes": {"sensitivity": 100}},
                {"id": "prod_db", "category": "resource", "label": "Production DB",
                 "attributes": {"sensitivity": 70}}
            ],
            "relations": [],
            "risk_weights": weights
        }))
        .unwrap();
        Policy::load(bundle).unwrap()
    }

    fn request(v: serde_json::Value) -> DecisionRequest {
        DecisionRequest::from_value(v).unwrap()
    }

    #[test]
    fn benign_request_scores_low() {
        let p = policy(json!({}));
        let req = request(json!({
            "request_id": "r", "actor": "agent_a", "action": "read_public", "risk_hint": 1
        }));
        let a = assess(&p, &req);
        assert_eq!(a.level, RiskLevel::Low);
        assert_eq!(a.scores.declared_intent, 0.0);
        assert_eq!(a.scores.data_class_exposure, 0.0);
        assert_eq!(a.scores.actor_history, 10.0);
    }

    #[test]
    fn sensitive_everything_scores_critical() {
        let p = policy(json!({}));
        let req = request(json!({
            "request_id": "r", "actor": "stranger", "action": "deploy",
            "resource": "prod_db", "data_classes": ["pii"], "risk_hint": 5,
            "context": {"a": 1, "b": 2, "c": 3, "d": 4, "e": 5, "f": 6, "g": 7, "h": 8, "i": 9}
        }));
        let a = assess(&p, &req);
        // (80 + 70 + 100 + 60 + 100 + 100) / 6 = 85
        assert_eq!(a.overall, 85.0);
        assert_eq!(a.level, RiskLevel::Critical);
    }

    #[test]
    fn weights_skew_the_mean() {
        let p = policy(json!({
            "action_sensitivity": 0.0, "resource_sensitivity": 0.0,
            "data_class_exposure": 0.0, "actor_history": 0.0,
            "context_anomaly": 0.0, "declared_intent": 1.0
        }));
        let req = request(json!({
            "request_id": "r", "actor": "agent_a", "action": "deploy", "risk_hint": 5
        }));
        let a = assess(&p, &req);
        assert_eq!(a.overall, 100.0);
        assert_eq!(a.level, RiskLevel::Critical);
    }

    #[test]
    fn unknown_terms_use_the_unknown_score() {
        let p = policy(json!({}));
        let req = request(json!({
            "request_id": "r", "actor": "ghost", "action": "vanish", "risk_hint": 1
        }));
        let a = assess(&p, &req);
        assert_eq!(a.scores.action_sensitivity, UNKNOWN_TERM_SCORE);
        assert_eq!(a.scores.actor_history, UNKNOWN_TERM_SCORE);
    }

    #[test]
    fn assessment_is_deterministic() {
        let p = policy(json!({}));
        let req = request(json!({
            "request_id": "r", "actor": "agent_a", "action": "deploy",
            "data_classes": ["pii"], "risk_hint": 3, "context": {"purpose": "ci"}
        }));
        assert_eq!(assess(&p, &req), assess(&p, &req));
    }

    #[test]
    fn recognized_context_keys_are_not_anomalous() {
        let p = policy(json!({}));
        let req = request(json!({
            "request_id": "r", "actor": "agent_a", "action": "read_public", "risk_hint": 1,
            "context": {"user_approval": true, "purpose": "audit", "origin": "ci"}
        }));
        assert_eq!(assess(&p, &req).scores.context_anomaly, 0.0);
    }
}
