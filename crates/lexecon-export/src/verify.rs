use crate::bundle::Manifest;
use lexecon_core::ledger::{LedgerEntry, VerifyReport};
use lexecon_crypto::KeyRing;
use lexecon_ledger::verify_slice;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Overall bundle status; maps onto the verify tool's exit codes.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BundleStatus {
    Intact,
    Mismatch,
    Unreadable,
    UnknownIssuer,
}

/// Verification result, pinpointing the first offending object.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BundleVerifyReport {
    pub status: BundleStatus,
    /// The section path, object or field where verification first failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_offending: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Present when the embedded ledger subchain was re-walked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<VerifyReport>,
}

impl BundleVerifyReport {
    /// Exit code contract: 0 intact, 2 mismatch, 3 unreadable, 4 unknown
    /// issuer key.
    pub fn exit_code(&self) -> i32 {
        match self.status {
            BundleStatus::Intact => 0,
            BundleStatus::Mismatch => 2,
            BundleStatus::Unreadable => 3,
            BundleStatus::UnknownIssuer => 4,
        }
    }

    fn intact(chain: Option<VerifyReport>) -> Self {
        Self {
            status: BundleStatus::Intact,
            first_offending: None,
            detail: None,
            chain,
        }
    }

    fn fail(status: BundleStatus, first_offending: &str, detail: String) -> Self {
        Self {
            status,
            first_offending: Some(first_offending.to_string()),
            detail: Some(detail),
            chain: None,
        }
    }
}

/// Verify a bundle directory. Read-only: recomputes every section
/// checksum in manifest order, then the root checksum, then the issuer
/// signature, and (optionally) re-walks the embedded ledger subchain.
pub fn verify_bundle(dir: &Path, keyring: &KeyRing, rewalk_chain: bool) -> BundleVerifyReport {
    // ── 0. Manifest must parse ───────────────────────────────────────────────
    let manifest_bytes = match std::fs::read(dir.join("manifest.json")) {
        Ok(bytes) => bytes,
        Err(e) => {
            return BundleVerifyReport::fail(
                BundleStatus::Unreadable,
                "manifest.json",
                e.to_string(),
            )
        }
    };
    let manifest: Manifest = match serde_json::from_slice(&manifest_bytes) {
        Ok(m) => m,
        Err(e) => {
            return BundleVerifyReport::fail(
                BundleStatus::Unreadable,
                "manifest.json",
                e.to_string(),
            )
        }
    };

    // ── 1. Issuer must be trusted ────────────────────────────────────────────
    if !keyring.contains(&manifest.issuer) {
        return BundleVerifyReport::fail(
            BundleStatus::UnknownIssuer,
            "manifest.json",
            format!("issuer {} not in key ring", manifest.issuer),
        );
    }

    // ── 2. Section checksums ─────────────────────────────────────────────────
    let sections_dir = dir.join("sections");
    for (rel_path, expected) in &manifest.section_checksums {
        let bytes = match std::fs::read(sections_dir.join(rel_path)) {
            Ok(bytes) => bytes,
            Err(e) => {
                return BundleVerifyReport::fail(BundleStatus::Unreadable, rel_path, e.to_string())
            }
        };
        let actual = lexecon_crypto::sha256(&bytes);
        if actual != *expected {
            return BundleVerifyReport::fail(
                BundleStatus::Mismatch,
                rel_path,
                format!("checksum {actual} != manifest {expected}"),
            );
        }
    }

    // ── 3. Root checksum ─────────────────────────────────────────────────────
    let root = match manifest.compute_root() {
        Ok(root) => root,
        Err(e) => {
            return BundleVerifyReport::fail(
                BundleStatus::Unreadable,
                "manifest.json",
                e.to_string(),
            )
        }
    };
    if root != manifest.root_checksum {
        return BundleVerifyReport::fail(
            BundleStatus::Mismatch,
            "root_checksum",
            format!("recomputed {root} != manifest {}", manifest.root_checksum),
        );
    }

    // ── 4. Issuer signature over the root ────────────────────────────────────
    if let Err(e) = keyring.verify(&manifest.issuer, root.as_bytes(), &manifest.signature) {
        return BundleVerifyReport::fail(BundleStatus::Mismatch, "signature", e.to_string());
    }

    // ── 5. Optional subchain re-walk ─────────────────────────────────────────
    let chain = if rewalk_chain {
        let entries: Vec<LedgerEntry> =
            match std::fs::read(sections_dir.join("ledger.json"))
                .map_err(|e| e.to_string())
                .and_then(|b| serde_json::from_slice(&b).map_err(|e| e.to_string()))
            {
                Ok(entries) => entries,
                Err(e) => {
                    return BundleVerifyReport::fail(BundleStatus::Unreadable, "ledger.json", e)
                }
            };
        let report = verify_slice(&entries, keyring);
        if !report.valid {
            return BundleVerifyReport {
                status: BundleStatus::Mismatch,
                first_offending: report.first_bad_seq.map(|s| format!("ledger seq {s}")),
                detail: report.reason.map(|r| r.to_string()),
                chain: Some(report),
            };
        }
        Some(report)
    } else {
        None
    };

    BundleVerifyReport::intact(chain)
}
