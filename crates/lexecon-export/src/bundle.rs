use lexecon_core::decision::Decision;
use lexecon_core::ledger::{EventType, LedgerEntry};
use lexecon_core::risk::RiskRecord;
use lexecon_core::{Hash32, LexeconError, SigAlgorithm, SignatureBytes, TimestampMs};
use lexecon_crypto::NodeIdentity;
use lexecon_evidence::EvidenceStore;
use lexecon_ledger::LedgerStore;
use lexecon_service::GatewayStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{info, warn};

/// What to export.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportRequest {
    pub requestor: String,
    pub purpose: String,
    pub from_seq: u64,
    pub to_seq: u64,
    /// Include raw evidence blobs for artifacts linked to the exported
    /// decisions. Anonymized artifacts have no content to export.
    pub include_evidence: bool,
}

/// The signed bundle manifest. Section checksums are keyed by the file's
/// path relative to `sections/`; the root checksum covers the canonical
/// manifest without `root_checksum` and `signature`, and the issuer
/// signature covers the root checksum bytes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    /// Time-sortable bundle id (UUID v7).
    pub bundle_id: String,
    pub requestor: String,
    pub purpose: String,
    pub from_seq: u64,
    pub to_seq: u64,
    pub created_at: TimestampMs,
    pub issuer: String,
    pub section_checksums: BTreeMap<String, Hash32>,
    pub root_checksum: Hash32,
    pub signature_algorithm: SigAlgorithm,
    pub signature: SignatureBytes,
}

/// The root-checksum preimage.
#[derive(Serialize)]
struct ManifestBody<'a> {
    bundle_id: &'a str,
    requestor: &'a str,
    purpose: &'a str,
    from_seq: u64,
    to_seq: u64,
    created_at: TimestampMs,
    issuer: &'a str,
    section_checksums: &'a BTreeMap<String, Hash32>,
}

impl Manifest {
    pub fn compute_root(&self) -> Result<Hash32, LexeconError> {
        lexecon_crypto::hash_canonical(&ManifestBody {
            bundle_id: &self.bundle_id,
            requestor: &self.requestor,
            purpose: &self.purpose,
            from_seq: self.from_seq,
            to_seq: self.to_seq,
            created_at: self.created_at,
            issuer: &self.issuer,
            section_checksums: &self.section_checksums,
        })
    }
}

/// Assemble a bundle directory at `out_dir` and return its manifest.
///
/// Layout:
///   manifest.json
///   sections/ledger.json
///   sections/decisions.json
///   sections/risk.json
///   sections/policies/<hash>.json
///   sections/evidence/<sha256>.bin
///
/// Every JSON section is written in canonical form, so re-running the
/// same export over unchanged stores reproduces byte-identical sections.
pub fn assemble(
    out_dir: &Path,
    request: &ExportRequest,
    ledger: &LedgerStore,
    gateway: &GatewayStore,
    evidence: &EvidenceStore,
    identity: &NodeIdentity,
    now: TimestampMs,
) -> Result<Manifest, LexeconError> {
    let sections_dir = out_dir.join("sections");
    std::fs::create_dir_all(sections_dir.join("policies")).map_err(io_err)?;
    std::fs::create_dir_all(sections_dir.join("evidence")).map_err(io_err)?;

    // ── Gather the ledger slice ──────────────────────────────────────────────
    let mut entries: Vec<LedgerEntry> = Vec::new();
    for item in ledger.range(request.from_seq, request.to_seq) {
        entries.push(item?);
    }

    // ── Referenced decisions, risk records, policies, evidence ───────────────
    let mut decisions: Vec<Decision> = Vec::new();
    let mut policy_hashes: BTreeSet<Hash32> = BTreeSet::new();
    for entry in &entries {
        match entry.event_type {
            EventType::Decision => {
                let id = entry
                    .payload
                    .get("decision_id")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                match gateway.get_decision(&id)? {
                    Some(decision) => {
                        policy_hashes.insert(decision.policy_version_hash);
                        decisions.push(decision);
                    }
                    None => warn!(decision_id = %id, "decision entry without stored decision"),
                }
            }
            EventType::PolicyLoaded => {
                if let Some(hash) = entry
                    .payload
                    .get("policy_version_hash")
                    .and_then(|v| v.as_str())
                    .and_then(|s| Hash32::from_hex(s).ok())
                {
                    policy_hashes.insert(hash);
                }
            }
            _ => {}
        }
    }
    decisions.sort_by(|a, b| a.decision_id.cmp(&b.decision_id));

    let mut risk_records: Vec<RiskRecord> = Vec::new();
    for decision in &decisions {
        if let Some(risk_id) = decision.risk_score_id.as_deref() {
            match gateway.get_risk_record(risk_id)? {
                Some(record) => risk_records.push(record),
                None => warn!(risk_id, "decision references missing risk record"),
            }
        }
    }
    risk_records.sort_by(|a, b| a.risk_id.cmp(&b.risk_id));

    // ── Write sections and collect checksums ─────────────────────────────────
    let mut checksums: BTreeMap<String, Hash32> = BTreeMap::new();

    write_section(&sections_dir, "ledger.json", &to_canonical(&entries)?, &mut checksums)?;
    write_section(
        &sections_dir,
        "decisions.json",
        &to_canonical(&decisions)?,
        &mut checksums,
    )?;
    write_section(
        &sections_dir,
        "risk.json",
        &to_canonical(&risk_records)?,
        &mut checksums,
    )?;

    for hash in &policy_hashes {
        match gateway.get_policy_snapshot(hash)? {
            Some(bytes) => write_section(
                &sections_dir,
                &format!("policies/{hash}.json"),
                &bytes,
                &mut checksums,
            )?,
            None => warn!(policy_hash = %hash, "referenced policy snapshot not stored"),
        }
    }

    if request.include_evidence {
        let mut artifact_ids: BTreeSet<Hash32> = BTreeSet::new();
        for decision in &decisions {
            artifact_ids.extend(decision.evidence_artifact_ids.iter().copied());
        }
        for id in &artifact_ids {
            // Anonymized artifacts have no blob left; their hash in the
            // decision record is still externally checkable.
            if let Some(content) = evidence.get_content(id)? {
                write_section(
                    &sections_dir,
                    &format!("evidence/{id}.bin"),
                    &content,
                    &mut checksums,
                )?;
            }
        }
    }

    // ── Sign and write the manifest ──────────────────────────────────────────
    let mut manifest = Manifest {
        bundle_id: bundle_id(now),
        requestor: request.requestor.clone(),
        purpose: request.purpose.clone(),
        from_seq: request.from_seq,
        to_seq: request.to_seq,
        created_at: now,
        issuer: identity.node_id().to_string(),
        section_checksums: checksums,
        root_checksum: Hash32::zero(),
        signature_algorithm: SigAlgorithm::Ed25519,
        signature: SignatureBytes(Vec::new()),
    };
    manifest.root_checksum = manifest.compute_root()?;
    manifest.signature = identity.sign(manifest.root_checksum.as_bytes());

    let manifest_bytes = lexecon_codec::canonical_bytes(&manifest)
        .map_err(|e| LexeconError::CanonicalEncodingError(e.to_string()))?;
    std::fs::write(out_dir.join("manifest.json"), manifest_bytes).map_err(io_err)?;

    info!(
        bundle_id = %manifest.bundle_id,
        sections = manifest.section_checksums.len(),
        from = request.from_seq,
        to = request.to_seq,
        "export bundle assembled"
    );
    Ok(manifest)
}

fn write_section(
    sections_dir: &Path,
    rel_path: &str,
    bytes: &[u8],
    checksums: &mut BTreeMap<String, Hash32>,
) -> Result<(), LexeconError> {
    std::fs::write(sections_dir.join(rel_path), bytes).map_err(io_err)?;
    checksums.insert(rel_path.to_string(), lexecon_crypto::sha256(bytes));
    Ok(())
}

fn to_canonical<T: Serialize>(value: &T) -> Result<Vec<u8>, LexeconError> {
    lexecon_codec::canonical_bytes(value)
        .map_err(|e| LexeconError::CanonicalEncodingError(e.to_string()))
}

fn bundle_id(now: TimestampMs) -> String {
    let secs = now.div_euclid(1000) as u64;
    let nanos = (now.rem_euclid(1000) as u32) * 1_000_000;
    uuid::Uuid::new_v7(uuid::Timestamp::from_unix(uuid::NoContext, secs, nanos)).to_string()
}

fn io_err(e: std::io::Error) -> LexeconError {
    LexeconError::Storage(e.to_string())
}
