use lexecon_core::config::GatewayConfig;
use lexecon_core::decision::{Decision, Outcome, TraceEntry, TraceKind};
use lexecon_core::evidence::{ArtifactCategory, RetentionClass};
use lexecon_core::ledger::EventType;
use lexecon_core::policy::PolicyBundle;
use lexecon_core::request::DecisionRequest;
use lexecon_core::risk::{RiskLevel, RiskRecord};
use lexecon_core::{
    Clock, DecisionId, Hash32, LexeconError, SigAlgorithm, SignatureBytes, TimestampMs,
};
use lexecon_crypto::NodeIdentity;
use lexecon_evidence::EvidenceStore;
use lexecon_ledger::LedgerHandle;
use lexecon_policy::{Policy, PolicySlot};
use lexecon_risk::RiskAssessment;
use lexecon_token::MintParams;
use std::sync::Arc;
use tracing::{info, warn};

use crate::store::GatewayStore;

/// Orchestrates one decision per request through the fixed pipeline.
///
/// Concurrency model: many `decide` calls run in parallel; the policy
/// slot hands each one an immutable snapshot, and the ledger handle
/// serializes the final appends through the single writer task. Either
/// the append succeeds and the caller gets the signed decision, or the
/// decision (and any minted token) is discarded.
pub struct DecisionService {
    identity: Arc<NodeIdentity>,
    clock: Arc<dyn Clock>,
    config: GatewayConfig,
    policies: PolicySlot,
    store: Arc<GatewayStore>,
    evidence: Arc<EvidenceStore>,
    ledger: LedgerHandle,
}

impl DecisionService {
    pub fn new(
        identity: Arc<NodeIdentity>,
        clock: Arc<dyn Clock>,
        config: GatewayConfig,
        store: Arc<GatewayStore>,
        evidence: Arc<EvidenceStore>,
        ledger: LedgerHandle,
    ) -> Self {
        Self {
            identity,
            clock,
            config,
            policies: PolicySlot::new(),
            store,
            evidence,
            ledger,
        }
    }

    pub fn node_id(&self) -> &str {
        self.identity.node_id()
    }

    pub fn store(&self) -> &Arc<GatewayStore> {
        &self.store
    }

    pub fn evidence(&self) -> &Arc<EvidenceStore> {
        &self.evidence
    }

    pub fn active_policy_hash(&self) -> Option<Hash32> {
        self.policies.current_hash()
    }

    /// Validate, hash, persist and publish a policy bundle. The snapshot
    /// and the POLICY_LOADED ledger entry land before the new version is
    /// installed, so a verifier can always anchor any served policy hash.
    pub async fn load_policy(
        &self,
        bundle_value: serde_json::Value,
    ) -> Result<Hash32, LexeconError> {
        let bundle: PolicyBundle = serde_json::from_value(bundle_value)
            .map_err(|e| LexeconError::PolicyMalformed(e.to_string()))?;
        let policy = Policy::load(bundle)?;
        let hash = policy.hash();

        let snapshot = policy.snapshot_value()?;
        let canonical = lexecon_codec::canonical(&snapshot);
        self.store.put_policy_snapshot(&hash, &canonical)?;
        self.store.flush()?;

        self.ledger
            .append(
                EventType::PolicyLoaded,
                serde_json::json!({
                    "policy_version_hash": hash,
                    "mode": policy.mode().to_string(),
                    "relations": policy.relations().len(),
                }),
            )
            .await
            .map_err(map_ledger_error)?;

        self.policies.install(policy);
        info!(policy_hash = %hash, "policy installed");
        Ok(hash)
    }

    /// Adjudicate one request (§6 wire form) with no caller deadline.
    pub async fn decide(&self, request: serde_json::Value) -> Result<Decision, LexeconError> {
        self.decide_with_deadline(request, None).await
    }

    /// Adjudicate with an optional caller deadline (Unix ms). The deadline
    /// is honored up to the signing step; once signing begins the
    /// operation runs to completion so no dangling signed state exists.
    pub async fn decide_with_deadline(
        &self,
        request: serde_json::Value,
        deadline: Option<TimestampMs>,
    ) -> Result<Decision, LexeconError> {
        // ── 1. Assign id and receive time ─────────────────────────────────────
        let received_at = self.clock.now_ms();
        let decision_id = DecisionId::generate(received_at);

        // ── 3 (hoisted). Snapshot the active policy ───────────────────────────
        // Even a malformed-request deny pins a policy version, so the
        // snapshot happens before normalization; with no policy loaded
        // there is nothing signable to record.
        let policy = self.policies.snapshot()?;

        // ── 2. Normalize ──────────────────────────────────────────────────────
        // The raw request id (when extractable) survives into the recorded
        // deny so the caller can correlate it.
        let raw_request_id = request
            .get("request_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let request = match DecisionRequest::from_value(request) {
            Ok(request) => request,
            Err(LexeconError::MalformedRequest(detail)) => {
                warn!(%decision_id, detail, "malformed request recorded as deny");
                return self
                    .record_malformed(decision_id, raw_request_id, received_at, policy.hash(), detail)
                    .await;
            }
            Err(other) => return Err(other),
        };

        // ── 4. Policy evaluation ──────────────────────────────────────────────
        self.check_deadline(deadline)?;
        let eval = lexecon_policy::evaluate(&policy, &request, self.config.paranoid_hint_max);
        let mut outcome = eval.outcome;
        let mut reason = eval.reason;
        let mut trace = eval.trace;

        // ── 5. Risk scoring; CRITICAL upgrades a permit to escalation ─────────
        let assessment = lexecon_risk::assess(&policy, &request);
        let risk_record =
            self.sign_risk_record(&request, &assessment, policy.hash(), received_at)?;
        if outcome == Outcome::Permit && assessment.level == RiskLevel::Critical {
            outcome = Outcome::Escalate;
            reason = "risk_critical".into();
            trace.push(TraceEntry {
                relation_id: "risk:overall".into(),
                kind: TraceKind::Mode,
                matched: false,
                note: format!("overall risk {} is CRITICAL", assessment.overall),
            });
        }

        // ── 6. Token mint ─────────────────────────────────────────────────────
        let capability_token = if outcome == Outcome::Permit {
            let ttl = self
                .config
                .token_default_ttl_secs
                .min(self.config.token_max_ttl_secs);
            let token = lexecon_token::mint(
                &self.identity,
                MintParams {
                    decision_id,
                    action: &request.action,
                    tool: request.tool.as_ref(),
                    resource: request.resource.as_ref(),
                    ttl_secs: Some(ttl),
                    policy_version_hash: policy.hash(),
                },
                received_at,
            )?;
            Some(token.wire()?)
        } else {
            None
        };

        // ── 7. Evidence artifacts ─────────────────────────────────────────────
        self.check_deadline(deadline)?;
        let decision_id_str = decision_id.to_string();
        let links = [decision_id_str.clone()];
        let retention = if assessment.level >= RiskLevel::High {
            RetentionClass::Regulatory
        } else {
            RetentionClass::Standard
        };
        let mut evidence_artifact_ids = Vec::with_capacity(3);

        let snapshot_bytes = lexecon_codec::canonical(&policy.snapshot_value()?);
        evidence_artifact_ids.push(
            self.evidence
                .put(
                    &snapshot_bytes,
                    ArtifactCategory::PolicySnapshot,
                    RetentionClass::Regulatory,
                    &links,
                    None,
                    received_at,
                )?
                .id,
        );

        let log_value = serde_json::json!({
            "decision_id": decision_id,
            "request_id": &request.request_id,
            "outcome": outcome,
            "reason": &reason,
            "policy_version_hash": policy.hash(),
            "risk_score_id": &risk_record.risk_id,
        });
        evidence_artifact_ids.push(
            self.evidence
                .put(
                    &lexecon_codec::canonical(&log_value),
                    ArtifactCategory::DecisionLog,
                    retention,
                    &links,
                    None,
                    received_at,
                )?
                .id,
        );

        let trace_value = serde_json::to_value(&trace)
            .map_err(|e| LexeconError::CanonicalEncodingError(e.to_string()))?;
        evidence_artifact_ids.push(
            self.evidence
                .put(
                    &lexecon_codec::canonical(&trace_value),
                    ArtifactCategory::AuditTrail,
                    retention,
                    &links,
                    None,
                    received_at,
                )?
                .id,
        );

        // ── 8. Final deadline gate, then assemble and sign ────────────────────
        // Past this point the operation runs to completion.
        self.check_deadline(deadline)?;
        let decision = Decision {
            decision_id,
            request_id: request.request_id.clone(),
            outcome,
            reason,
            reason_trace: trace,
            policy_version_hash: policy.hash(),
            capability_token,
            risk_score_id: Some(risk_record.risk_id.clone()),
            evidence_artifact_ids,
            ledger_entry_hash: Hash32::zero(),
            issuer_id: self.identity.node_id().to_string(),
            issued_at: received_at,
            signature_algorithm: SigAlgorithm::Ed25519,
            signature: SignatureBytes(Vec::new()),
        };

        // ── 9–10. Sign, append, persist ───────────────────────────────────────
        let decision = self.commit(decision, Some(&risk_record)).await?;
        Ok(decision)
    }

    /// Evidence retention sweep plus its ledger record. Returns the
    /// artifact ids anonymized in this pass.
    pub async fn run_anonymization_sweep(&self) -> Result<Vec<Hash32>, LexeconError> {
        let now = self.clock.now_ms();
        let swept = self
            .evidence
            .run_anonymization_sweep(now, &self.config.retention)?;
        if !swept.is_empty() {
            self.ledger
                .append(
                    EventType::ArtifactAnonymized,
                    serde_json::json!({ "artifact_ids": &swept }),
                )
                .await
                .map_err(map_ledger_error)?;
        }
        Ok(swept)
    }

    // ── Internals ────────────────────────────────────────────────────────────

    /// Caller-deadline gate, checked before each pipeline stage up to and
    /// including the sign step. A cancelled decision leaves no trace.
    fn check_deadline(&self, deadline: Option<TimestampMs>) -> Result<(), LexeconError> {
        match deadline {
            Some(deadline) if self.clock.now_ms() > deadline => {
                Err(LexeconError::Timeout("decision pipeline".into()))
            }
            _ => Ok(()),
        }
    }

    /// The recorded deny for a request that failed normalization: no risk
    /// record, no evidence, no token, but still signed and ledger-anchored
    /// so every request leaves an audit trace.
    async fn record_malformed(
        &self,
        decision_id: DecisionId,
        request_id: String,
        received_at: TimestampMs,
        policy_hash: Hash32,
        detail: String,
    ) -> Result<Decision, LexeconError> {
        let decision = Decision {
            decision_id,
            request_id,
            outcome: Outcome::Deny,
            reason: "malformed_request".into(),
            reason_trace: vec![TraceEntry {
                relation_id: "request:normalization".into(),
                kind: TraceKind::Mode,
                matched: false,
                note: detail,
            }],
            policy_version_hash: policy_hash,
            capability_token: None,
            risk_score_id: None,
            evidence_artifact_ids: Vec::new(),
            ledger_entry_hash: Hash32::zero(),
            issuer_id: self.identity.node_id().to_string(),
            issued_at: received_at,
            signature_algorithm: SigAlgorithm::Ed25519,
            signature: SignatureBytes(Vec::new()),
        };
        self.commit(decision, None).await
    }

    /// Sign the decision body, append the DECISION ledger entry, write the
    /// entry hash back, and persist. At-most-once: a failed append
    /// discards everything and the caller sees a retryable error.
    async fn commit(
        &self,
        mut decision: Decision,
        risk_record: Option<&RiskRecord>,
    ) -> Result<Decision, LexeconError> {
        let body_bytes = lexecon_codec::canonical_bytes(&decision.body())
            .map_err(|e| LexeconError::CanonicalEncodingError(e.to_string()))?;
        decision.signature = self.identity.sign(&body_bytes);

        let payload = decision.ledger_payload()?;
        let entry = self
            .ledger
            .append(EventType::Decision, payload)
            .await
            .map_err(map_ledger_error)?;
        decision.ledger_entry_hash = entry.hash;

        if let Some(record) = risk_record {
            self.store.put_risk_record(record)?;
        }
        self.store.put_decision(&decision)?;
        self.store.flush()?;

        info!(
            decision_id = %decision.decision_id,
            outcome = %decision.outcome,
            reason = %decision.reason,
            seq = entry.seq,
            "decision recorded"
        );
        Ok(decision)
    }

    fn sign_risk_record(
        &self,
        request: &DecisionRequest,
        assessment: &RiskAssessment,
        policy_hash: Hash32,
        now: TimestampMs,
    ) -> Result<RiskRecord, LexeconError> {
        let mut record = RiskRecord {
            risk_id: time_sorted_id(now),
            request_id: request.request_id.clone(),
            scores: assessment.scores.clone(),
            overall: assessment.overall,
            level: assessment.level,
            policy_version_hash: policy_hash,
            computed_at: now,
            issuer: self.identity.node_id().to_string(),
            signature_algorithm: SigAlgorithm::Ed25519,
            signature: SignatureBytes(Vec::new()),
        };
        let bytes = lexecon_codec::canonical_bytes(&record.body())
            .map_err(|e| LexeconError::CanonicalEncodingError(e.to_string()))?;
        record.signature = self.identity.sign(&bytes);
        Ok(record)
    }
}

/// Queue saturation is surfaced to callers as `LedgerUnavailable`: the
/// service never buffers signed state waiting for ledger capacity.
fn map_ledger_error(e: LexeconError) -> LexeconError {
    match e {
        LexeconError::Backpressure => LexeconError::LedgerUnavailable("writer queue full".into()),
        other => other,
    }
}

fn time_sorted_id(now: TimestampMs) -> String {
    let secs = now.div_euclid(1000) as u64;
    let nanos = (now.rem_euclid(1000) as u32) * 1_000_000;
    uuid::Uuid::new_v7(uuid::Timestamp::from_unix(uuid::NoContext, secs, nanos)).to_string()
}
