use crate::store::LedgerStore;
use lexecon_core::ledger::{LedgerEntry, VerifyFailure, VerifyReport};
use lexecon_core::{Hash32, LexeconError};
use lexecon_crypto::KeyRing;
use tracing::warn;

/// Recompute one entry's hash and check its signature. Returns the first
/// failure found, or `None` when the entry is internally consistent.
/// Chain linkage is the caller's concern.
pub fn check_entry(entry: &LedgerEntry, keyring: &KeyRing) -> Option<VerifyFailure> {
    match lexecon_crypto::hash_canonical(&entry.body()) {
        Ok(recomputed) if recomputed == entry.hash => {}
        Ok(_) => return Some(VerifyFailure::HashMismatch),
        // An unencodable payload cannot have produced the stored hash.
        Err(_) => return Some(VerifyFailure::HashMismatch),
    }
    match keyring.verify(&entry.issuer, entry.hash.as_bytes(), &entry.signature) {
        Ok(()) => None,
        Err(LexeconError::UnknownIssuer(_)) => Some(VerifyFailure::UnknownIssuer),
        Err(_) => Some(VerifyFailure::BadSignature),
    }
}

/// Walk `[from_seq, to_seq]` in the store, recomputing each hash and
/// verifying signatures and chain linkage. Corruption is reported, never
/// thrown; `entries_checked` counts the entries that verified before the
/// first bad one.
pub fn verify_chain(
    store: &LedgerStore,
    from_seq: u64,
    to_seq: u64,
    keyring: &KeyRing,
) -> Result<VerifyReport, LexeconError> {
    let mut checked = 0u64;
    let mut prev_hash: Option<Hash32> = if from_seq == 0 {
        None
    } else {
        // Anchor the slice on the entry just before it.
        match store.get_by_seq(from_seq - 1)? {
            Some(prev) => Some(prev.hash),
            None => return Ok(VerifyReport::broken(0, from_seq - 1, VerifyFailure::MissingEntry)),
        }
    };

    for seq in from_seq..=to_seq {
        let entry = match store.get_by_seq(seq)? {
            Some(entry) => entry,
            None => return Ok(VerifyReport::broken(checked, seq, VerifyFailure::MissingEntry)),
        };

        if let Some(failure) = check_link(&entry, prev_hash).or_else(|| check_entry(&entry, keyring))
        {
            warn!(seq, reason = %failure, "ledger verification failed");
            return Ok(VerifyReport::broken(checked, seq, failure));
        }

        prev_hash = Some(entry.hash);
        checked += 1;
    }
    Ok(VerifyReport::intact(checked))
}

/// Verify an extracted slice of entries (e.g. from an export bundle):
/// per-entry hashes and signatures plus intra-slice linkage. The first
/// entry anchors the slice; only a genesis entry has a checkable previous
/// hash of its own.
pub fn verify_slice(entries: &[LedgerEntry], keyring: &KeyRing) -> VerifyReport {
    let mut checked = 0u64;
    let mut prev_hash: Option<Hash32> = None;

    for entry in entries {
        if let Some(failure) = check_link(entry, prev_hash).or_else(|| check_entry(entry, keyring))
        {
            return VerifyReport::broken(checked, entry.seq, failure);
        }
        prev_hash = Some(entry.hash);
        checked += 1;
    }
    VerifyReport::intact(checked)
}

/// Chain-shape checks: genesis has the zero previous hash; every other
/// entry with a known predecessor must link to it.
fn check_link(entry: &LedgerEntry, prev_hash: Option<Hash32>) -> Option<VerifyFailure> {
    if entry.seq == 0 && !entry.prev_hash.is_zero() {
        return Some(VerifyFailure::BrokenChain);
    }
    if let Some(prev) = prev_hash {
        if entry.prev_hash != prev {
            return Some(VerifyFailure::BrokenChain);
        }
    }
    None
}
