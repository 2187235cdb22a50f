//! lexecon-token
//!
//! Capability tokens: short-lived, scoped, cryptographically bound
//! authorizations minted by the decision service. The gateway stores no
//! tokens (the token is the proof) and does not prevent replay within
//! the TTL; downstream executors may track spent token ids if they need
//! single use.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use lexecon_core::constants::{TOKEN_DEFAULT_TTL_SECS, TOKEN_MAX_TTL_SECS};
use lexecon_core::token::TokenBody;
use lexecon_core::{
    DecisionId, Hash32, LexeconError, SignatureBytes, TermId, TimestampMs,
};
use lexecon_crypto::{KeyRing, NodeIdentity};

/// Where the verifier learns which policy versions have existed. The
/// ledger is the source of truth; a token minted under an older policy
/// stays valid until expiry because that policy's load is on the chain.
pub trait PolicyHashRegistry {
    fn is_known_policy(&self, hash: &Hash32) -> bool;
}

impl PolicyHashRegistry for Vec<Hash32> {
    fn is_known_policy(&self, hash: &Hash32) -> bool {
        self.contains(hash)
    }
}

/// A minted token: signed body plus detached signature.
#[derive(Clone, Debug, PartialEq)]
pub struct CapabilityToken {
    pub body: TokenBody,
    pub signature: SignatureBytes,
}

/// Mint parameters supplied by the decision service.
pub struct MintParams<'a> {
    pub decision_id: DecisionId,
    pub action: &'a TermId,
    pub tool: Option<&'a TermId>,
    pub resource: Option<&'a TermId>,
    /// Requested TTL; clamped to the hard maximum. `None` takes the
    /// default.
    pub ttl_secs: Option<u64>,
    pub policy_version_hash: Hash32,
}

/// Caller-presented execution context checked against token constraints.
#[derive(Default)]
pub struct VerifyContext<'a> {
    pub tool: Option<&'a TermId>,
    pub resource: Option<&'a TermId>,
}

/// Mint a token. TTL = min(requested or default, hard max); the signed
/// body pins the policy version hash the decision was evaluated under.
pub fn mint(
    identity: &NodeIdentity,
    params: MintParams<'_>,
    now: TimestampMs,
) -> Result<CapabilityToken, LexeconError> {
    let ttl = params
        .ttl_secs
        .unwrap_or(TOKEN_DEFAULT_TTL_SECS)
        .min(TOKEN_MAX_TTL_SECS);
    let body = TokenBody {
        token_id: new_token_id(now),
        decision_id: params.decision_id,
        action: params.action.clone(),
        tool: params.tool.cloned(),
        resource: params.resource.cloned(),
        issued_at: now,
        expires_at: now + (ttl as i64) * 1_000,
        policy_version_hash: params.policy_version_hash,
        issuer: identity.node_id().to_string(),
    };
    let canonical = lexecon_codec::canonical_bytes(&body)
        .map_err(|e| LexeconError::CanonicalEncodingError(e.to_string()))?;
    let signature = identity.sign(&canonical);
    Ok(CapabilityToken { body, signature })
}

impl CapabilityToken {
    /// Wire form: `base64url(canonical(body)) + "." + base64url(signature)`.
    pub fn wire(&self) -> Result<String, LexeconError> {
        let canonical = lexecon_codec::canonical_bytes(&self.body)
            .map_err(|e| LexeconError::CanonicalEncodingError(e.to_string()))?;
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(canonical),
            URL_SAFE_NO_PAD.encode(self.signature.as_bytes())
        ))
    }

    /// Parse the wire form without verifying anything.
    pub fn from_wire(wire: &str) -> Result<Self, LexeconError> {
        let (body_part, sig_part) = wire
            .split_once('.')
            .ok_or_else(|| LexeconError::VerificationFailed("malformed token wire form".into()))?;
        let body_bytes = URL_SAFE_NO_PAD
            .decode(body_part)
            .map_err(|e| LexeconError::VerificationFailed(format!("token body base64: {e}")))?;
        let sig_bytes = URL_SAFE_NO_PAD
            .decode(sig_part)
            .map_err(|e| LexeconError::VerificationFailed(format!("token signature base64: {e}")))?;
        let body: TokenBody = serde_json::from_slice(&body_bytes)
            .map_err(|e| LexeconError::VerificationFailed(format!("token body json: {e}")))?;
        Ok(Self {
            body,
            signature: SignatureBytes(sig_bytes),
        })
    }
}

/// Full verification: issuer signature, validity window, known policy
/// version, and tool/resource constraints against the presented context.
/// Returns the token body on success.
pub fn verify(
    wire: &str,
    keyring: &KeyRing,
    now: TimestampMs,
    policies: &dyn PolicyHashRegistry,
    context: &VerifyContext<'_>,
) -> Result<TokenBody, LexeconError> {
    let token = CapabilityToken::from_wire(wire)?;
    let canonical = lexecon_codec::canonical_bytes(&token.body)
        .map_err(|e| LexeconError::CanonicalEncodingError(e.to_string()))?;
    keyring.verify(&token.body.issuer, &canonical, &token.signature)?;

    if !token.body.is_live_at(now) {
        return Err(LexeconError::VerificationFailed("token expired".into()));
    }
    if !policies.is_known_policy(&token.body.policy_version_hash) {
        return Err(LexeconError::VerificationFailed(
            "token bound to unknown policy version".into(),
        ));
    }
    if let Some(tool) = &token.body.tool {
        if context.tool != Some(tool) {
            return Err(LexeconError::VerificationFailed(
                "token tool constraint mismatch".into(),
            ));
        }
    }
    if let Some(resource) = &token.body.resource {
        if context.resource != Some(resource) {
            return Err(LexeconError::VerificationFailed(
                "token resource constraint mismatch".into(),
            ));
        }
    }
    Ok(token.body)
}

fn new_token_id(now: TimestampMs) -> String {
    let secs = now.div_euclid(1000) as u64;
    let nanos = (now.rem_euclid(1000) as u32) * 1_000_000;
    uuid::Uuid::new_v7(uuid::Timestamp::from_unix(uuid::NoContext, secs, nanos)).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: TimestampMs = 1_700_000_000_000;

    fn setup() -> (NodeIdentity, KeyRing, Hash32) {
        let identity = NodeIdentity::generate();
        let mut ring = KeyRing::new();
        ring.trust(identity.verifying_key());
        (identity, ring, Hash32::from_bytes([7u8; 32]))
    }

    fn mint_simple(identity: &NodeIdentity, policy: Hash32, ttl: Option<u64>) -> CapabilityToken {
        let action = TermId::new("deploy");
        mint(
            identity,
            MintParams {
                decision_id: DecisionId::generate(NOW),
                action: &action,
                tool: None,
                resource: None,
                ttl_secs: ttl,
                policy_version_hash: policy,
            },
            NOW,
        )
        .unwrap()
    }

    #[test]
    fn wire_round_trip_verifies() {
        let (identity, ring, policy) = setup();
        let token = mint_simple(&identity, policy, None);
        let wire = token.wire().unwrap();

        let body = verify(&wire, &ring, NOW + 1_000, &vec![policy], &VerifyContext::default())
            .unwrap();
        assert_eq!(body, token.body);
        assert_eq!(body.expires_at - body.issued_at, 300_000);
    }

    #[test]
    fn default_and_max_ttl() {
        let (identity, _, policy) = setup();
        let default = mint_simple(&identity, policy, None);
        assert_eq!(default.body.expires_at, NOW + 300_000);

        // Requests above the hard ceiling are clamped.
        let greedy = mint_simple(&identity, policy, Some(86_400));
        assert_eq!(greedy.body.expires_at, NOW + 3_600_000);
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let (identity, ring, policy) = setup();
        let token = mint_simple(&identity, policy, Some(60));
        let wire = token.wire().unwrap();
        let expires = token.body.expires_at;

        assert!(verify(&wire, &ring, expires - 1, &vec![policy], &VerifyContext::default()).is_ok());
        let err = verify(&wire, &ring, expires, &vec![policy], &VerifyContext::default())
            .unwrap_err();
        assert!(matches!(err, LexeconError::VerificationFailed(_)));
    }

    #[test]
    fn tampered_body_fails_signature() {
        let (identity, ring, policy) = setup();
        let mut token = mint_simple(&identity, policy, None);
        token.body.action = TermId::new("escalate_privileges");
        let wire = token.wire().unwrap();
        assert!(verify(&wire, &ring, NOW, &vec![policy], &VerifyContext::default()).is_err());
    }

    #[test]
    fn survives_policy_swap_while_old_hash_is_known() {
        let (identity, ring, policy_v1) = setup();
        let policy_v2 = Hash32::from_bytes([8u8; 32]);
        let token = mint_simple(&identity, policy_v1, None);
        let wire = token.wire().unwrap();

        // After the swap the registry knows both versions; the token stays
        // bound to v1 and remains valid until TTL.
        let known = vec![policy_v1, policy_v2];
        let body = verify(&wire, &ring, NOW + 1, &known, &VerifyContext::default()).unwrap();
        assert_eq!(body.policy_version_hash, policy_v1);

        // A registry that never recorded v1 rejects it.
        let only_v2 = vec![policy_v2];
        assert!(verify(&wire, &ring, NOW + 1, &only_v2, &VerifyContext::default()).is_err());
    }

    #[test]
    fn tool_and_resource_constraints() {
        let (identity, ring, policy) = setup();
        let action = TermId::new("query");
        let tool = TermId::new("sql_client");
        let token = mint(
            &identity,
            MintParams {
                decision_id: DecisionId::generate(NOW),
                action: &action,
                tool: Some(&tool),
                resource: None,
                ttl_secs: None,
                policy_version_hash: policy,
            },
            NOW,
        )
        .unwrap();
        let wire = token.wire().unwrap();

        let matching = VerifyContext {
            tool: Some(&tool),
            resource: None,
        };
        assert!(verify(&wire, &ring, NOW, &vec![policy], &matching).is_ok());

        // Absent or different tool fails the constraint.
        assert!(verify(&wire, &ring, NOW, &vec![policy], &VerifyContext::default()).is_err());
        let other = TermId::new("shell");
        let mismatched = VerifyContext {
            tool: Some(&other),
            resource: None,
        };
        assert!(verify(&wire, &ring, NOW, &vec![policy], &mismatched).is_err());
    }

    #[test]
    fn unknown_issuer_fails() {
        let (identity, _, policy) = setup();
        let token = mint_simple(&identity, policy, None);
        let wire = token.wire().unwrap();
        let empty = KeyRing::new();
        let err = verify(&wire, &empty, NOW, &vec![policy], &VerifyContext::default())
            .unwrap_err();
        assert!(matches!(err, LexeconError::UnknownIssuer(_)));
    }
}
