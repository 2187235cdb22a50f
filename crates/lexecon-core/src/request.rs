use crate::constants::{RISK_HINT_MAX, RISK_HINT_MIN};
use crate::error::LexeconError;
use crate::types::{TermId, TimestampMs};
use serde::{Deserialize, Serialize};

/// A proposed action submitted for adjudication. Created by a caller,
/// consumed exactly once by the decision service, then discarded.
///
/// Unknown JSON keys are stripped on parse; type mismatches surface as
/// `MalformedRequest`, which the service records as a `DENY` rather than
/// returning an error, so every request leaves an audit trace.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DecisionRequest {
    pub request_id: String,
    pub actor: TermId,
    pub action: TermId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<TermId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<TermId>,
    #[serde(default)]
    pub data_classes: Vec<TermId>,
    /// Caller's own risk estimate, 1 (benign) to 5 (dangerous).
    pub risk_hint: u8,
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
    /// Caller-supplied creation timestamp (Unix ms). Informational; the
    /// gateway's own clock stamps the decision.
    #[serde(default)]
    pub timestamp: TimestampMs,
}

impl DecisionRequest {
    /// Parse and normalize the §6 wire form.
    pub fn from_value(value: serde_json::Value) -> Result<Self, LexeconError> {
        let req: DecisionRequest = serde_json::from_value(value)
            .map_err(|e| LexeconError::MalformedRequest(e.to_string()))?;
        req.validate()?;
        Ok(req)
    }

    /// Field-level validation beyond what serde types enforce.
    pub fn validate(&self) -> Result<(), LexeconError> {
        if self.request_id.is_empty() {
            return Err(LexeconError::MalformedRequest(
                "request_id must not be empty".into(),
            ));
        }
        if self.actor.as_str().is_empty() || self.action.as_str().is_empty() {
            return Err(LexeconError::MalformedRequest(
                "actor and action must not be empty".into(),
            ));
        }
        if !(RISK_HINT_MIN..=RISK_HINT_MAX).contains(&self.risk_hint) {
            return Err(LexeconError::MalformedRequest(format!(
                "risk_hint must be in {}..={}, got {}",
                RISK_HINT_MIN, RISK_HINT_MAX, self.risk_hint
            )));
        }
        Ok(())
    }

    /// True when a boolean context flag is present and `true`.
    pub fn context_flag(&self, key: &str) -> bool {
        self.context.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> serde_json::Value {
        serde_json::json!({
            "request_id": "req-1",
            "actor": "agent_a",
            "action": "read_public",
            "risk_hint": 1
        })
    }

    #[test]
    fn minimal_request_parses() {
        let req = DecisionRequest::from_value(base()).unwrap();
        assert_eq!(req.actor, TermId::new("agent_a"));
        assert!(req.data_classes.is_empty());
        assert!(req.context.is_empty());
    }

    #[test]
    fn unknown_keys_are_stripped() {
        let mut v = base();
        v["totally_unknown"] = serde_json::json!({"nested": true});
        assert!(DecisionRequest::from_value(v).is_ok());
    }

    #[test]
    fn risk_hint_out_of_range_is_malformed() {
        let mut v = base();
        v["risk_hint"] = serde_json::json!(6);
        let err = DecisionRequest::from_value(v).unwrap_err();
        assert!(matches!(err, LexeconError::MalformedRequest(_)));
    }

    #[test]
    fn wrong_type_is_malformed() {
        let mut v = base();
        v["data_classes"] = serde_json::json!("pii");
        let err = DecisionRequest::from_value(v).unwrap_err();
        assert!(matches!(err, LexeconError::MalformedRequest(_)));
    }

    #[test]
    fn context_flag_reads_booleans_only() {
        let mut v = base();
        v["context"] = serde_json::json!({"user_approval": true, "purpose": "audit"});
        let req = DecisionRequest::from_value(v).unwrap();
        assert!(req.context_flag("user_approval"));
        assert!(!req.context_flag("purpose"));
        assert!(!req.context_flag("missing"));
    }
}
