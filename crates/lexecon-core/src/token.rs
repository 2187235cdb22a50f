use crate::types::{DecisionId, Hash32, TermId, TimestampMs};
use serde::{Deserialize, Serialize};

/// The signed body of a capability token.
///
/// Wire form is `base64url(canonical(body)) + "." + base64url(signature)`;
/// the token is the proof and is not stored anywhere by the gateway.
/// Validity window is half-open: `issued_at <= now < expires_at`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TokenBody {
    /// Time-sortable token id (UUID v7).
    pub token_id: String,
    /// The decision that minted this token.
    pub decision_id: DecisionId,
    /// Action the bearer is authorized to perform.
    pub action: TermId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<TermId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<TermId>,
    pub issued_at: TimestampMs,
    /// Strictly later than `issued_at`. A token queried at exactly this
    /// instant is already invalid.
    pub expires_at: TimestampMs,
    /// Policy version the token was minted under. Remains the anchor even
    /// after a newer policy is installed; the ledger records that this
    /// version existed.
    pub policy_version_hash: Hash32,
    /// Fingerprint of the minting node's public key.
    pub issuer: String,
}

impl TokenBody {
    /// Whether `now` falls inside the `[issued_at, expires_at)` window.
    pub fn is_live_at(&self, now: TimestampMs) -> bool {
        self.issued_at <= now && now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(issued: TimestampMs, expires: TimestampMs) -> TokenBody {
        TokenBody {
            token_id: "tok-1".into(),
            decision_id: DecisionId::generate(issued),
            action: "deploy".into(),
            tool: None,
            resource: None,
            issued_at: issued,
            expires_at: expires,
            policy_version_hash: Hash32::from_bytes([3u8; 32]),
            issuer: "node-a".into(),
        }
    }

    #[test]
    fn window_is_half_open() {
        let t = body(1_000, 2_000);
        assert!(!t.is_live_at(999));
        assert!(t.is_live_at(1_000));
        assert!(t.is_live_at(1_999));
        // Exactly expires_at is invalid.
        assert!(!t.is_live_at(2_000));
    }
}
