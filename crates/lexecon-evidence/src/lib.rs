//! lexecon-evidence
//!
//! Content-addressed, immutable artifact storage. The lowercase-hex
//! SHA-256 of the content is the primary key; identical content collapses
//! onto one artifact with merged decision linkages. Retention classes
//! drive an anonymization sweep that deletes content but preserves the
//! metadata and linkages forever.

use lexecon_core::config::RetentionConfig;
use lexecon_core::constants::MAX_ARTIFACT_BYTES;
use lexecon_core::evidence::{ArtifactCategory, ArtifactMeta, ProducerSignature, RetentionClass};
use lexecon_core::{Hash32, LexeconError, TimestampMs};
use std::path::Path;
use tracing::{debug, info};

const TOTAL_BYTES_KEY: &[u8] = b"total_bytes";

/// Persistent artifact store backed by sled.
///
/// Named trees:
///   meta       — content hash bytes           → bincode(ArtifactMeta)
///   blobs      — content hash bytes           → raw content
///   by_category — category key ++ '/' ++ hash → [] (membership)
///   by_decision — decision id ++ '/' ++ hash  → [] (membership)
///   by_created — created_at i64 BE ++ hash    → [] (membership)
///   counters   — utf8 key                     → u64 BE (live content bytes)
pub struct EvidenceStore {
    db: sled::Db,
    meta: sled::Tree,
    blobs: sled::Tree,
    by_category: sled::Tree,
    by_decision: sled::Tree,
    by_created: sled::Tree,
    counters: sled::Tree,
    capacity_bytes: u64,
}

impl EvidenceStore {
    /// Open or create the store at `path` with the configured live-content
    /// capacity.
    pub fn open<P: AsRef<Path>>(path: P, capacity_bytes: u64) -> Result<Self, LexeconError> {
        let db = sled::open(path).map_err(storage_err)?;
        Ok(Self {
            meta: db.open_tree("meta").map_err(storage_err)?,
            blobs: db.open_tree("blobs").map_err(storage_err)?,
            by_category: db.open_tree("by_category").map_err(storage_err)?,
            by_decision: db.open_tree("by_decision").map_err(storage_err)?,
            by_created: db.open_tree("by_created").map_err(storage_err)?,
            counters: db.open_tree("counters").map_err(storage_err)?,
            capacity_bytes,
            db,
        })
    }

    /// Store content, returning its artifact metadata.
    ///
    /// Idempotent: identical content returns the existing artifact, with
    /// any new linkages merged in. Rejects content above the 100 MiB
    /// per-artifact bound and anything that would push live content past
    /// capacity.
    pub fn put(
        &self,
        content: &[u8],
        category: ArtifactCategory,
        retention_class: RetentionClass,
        links: &[String],
        producer_signature: Option<ProducerSignature>,
        now: TimestampMs,
    ) -> Result<ArtifactMeta, LexeconError> {
        let size = content.len() as u64;
        if size > MAX_ARTIFACT_BYTES {
            return Err(LexeconError::ArtifactTooLarge {
                max: MAX_ARTIFACT_BYTES,
                got: size,
            });
        }

        let id = lexecon_crypto::sha256(content);

        // Duplicate content collapses onto the existing artifact.
        if let Some(mut existing) = self.get_meta(&id)? {
            let mut changed = false;
            for link in links {
                if !existing.linked_decisions.contains(link) {
                    existing.linked_decisions.push(link.clone());
                    self.index_decision(link, &id)?;
                    changed = true;
                }
            }
            if changed {
                self.write_meta(&existing)?;
            }
            debug!(artifact = %id, "evidence put deduplicated");
            return Ok(existing);
        }

        let total = self.total_bytes()?;
        if total + size > self.capacity_bytes {
            return Err(LexeconError::EvidenceStoreFull {
                capacity: self.capacity_bytes,
                requested: size,
            });
        }

        let artifact = ArtifactMeta {
            id,
            category,
            size,
            retention_class,
            producer_signature,
            linked_decisions: links.to_vec(),
            created_at: now,
            anonymized: false,
        };

        self.blobs
            .insert(id.as_bytes(), content)
            .map_err(storage_err)?;
        self.write_meta(&artifact)?;
        self.by_category
            .insert(index_key(category.index_key().as_bytes(), &id), &[][..])
            .map_err(storage_err)?;
        for link in links {
            self.index_decision(link, &id)?;
        }
        let mut created_key = now.to_be_bytes().to_vec();
        created_key.extend_from_slice(id.as_bytes());
        self.by_created
            .insert(created_key, &[][..])
            .map_err(storage_err)?;
        self.set_total_bytes(total + size)?;
        self.db.flush().map_err(storage_err)?;

        debug!(artifact = %id, size, category = category.index_key(), "evidence stored");
        Ok(artifact)
    }

    pub fn get_meta(&self, id: &Hash32) -> Result<Option<ArtifactMeta>, LexeconError> {
        match self.meta.get(id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(
                bincode::deserialize(&bytes).map_err(|e| LexeconError::Serialization(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    /// Artifact content; `None` once anonymized.
    pub fn get_content(&self, id: &Hash32) -> Result<Option<Vec<u8>>, LexeconError> {
        Ok(self
            .blobs
            .get(id.as_bytes())
            .map_err(storage_err)?
            .map(|iv| iv.to_vec()))
    }

    /// Link an existing artifact to a decision.
    pub fn link(&self, id: &Hash32, decision_id: &str) -> Result<(), LexeconError> {
        let mut meta = self
            .get_meta(id)?
            .ok_or_else(|| LexeconError::UnknownArtifact(id.to_hex()))?;
        if !meta.linked_decisions.iter().any(|d| d == decision_id) {
            meta.linked_decisions.push(decision_id.to_string());
            self.write_meta(&meta)?;
            self.index_decision(decision_id, id)?;
        }
        Ok(())
    }

    pub fn list_by_decision(&self, decision_id: &str) -> Result<Vec<ArtifactMeta>, LexeconError> {
        self.collect_index(&self.by_decision, decision_id.as_bytes())
    }

    pub fn list_by_category(
        &self,
        category: ArtifactCategory,
    ) -> Result<Vec<ArtifactMeta>, LexeconError> {
        self.collect_index(&self.by_category, category.index_key().as_bytes())
    }

    /// Artifacts created in `[from, to)` (Unix ms), oldest first.
    /// BE-encoded keys sort correctly because timestamps are never
    /// negative here.
    pub fn list_created_between(
        &self,
        from: TimestampMs,
        to: TimestampMs,
    ) -> Result<Vec<ArtifactMeta>, LexeconError> {
        let mut out = Vec::new();
        let start = from.to_be_bytes().to_vec();
        let end = to.to_be_bytes().to_vec();
        for item in self.by_created.range(start..end) {
            let (key, _) = item.map_err(storage_err)?;
            let hash_bytes = &key[8..];
            let mut arr = [0u8; 32];
            arr.copy_from_slice(hash_bytes);
            if let Some(meta) = self.get_meta(&Hash32::from_bytes(arr))? {
                out.push(meta);
            }
        }
        Ok(out)
    }

    /// Live (non-anonymized) content bytes currently stored.
    pub fn total_bytes(&self) -> Result<u64, LexeconError> {
        Ok(self
            .counters
            .get(TOTAL_BYTES_KEY)
            .map_err(storage_err)?
            .map(|b| {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&b);
                u64::from_be_bytes(arr)
            })
            .unwrap_or(0))
    }

    /// Replace expired content with its metadata placeholder. Returns the
    /// ids anonymized in this pass so the caller can ledger-record them;
    /// linkages and metadata survive.
    pub fn run_anonymization_sweep(
        &self,
        now: TimestampMs,
        retention: &RetentionConfig,
    ) -> Result<Vec<Hash32>, LexeconError> {
        let mut anonymized = Vec::new();
        let mut reclaimed = 0u64;

        for item in self.meta.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let mut meta: ArtifactMeta = bincode::deserialize(&bytes)
                .map_err(|e| LexeconError::Serialization(e.to_string()))?;
            if meta.anonymized {
                continue;
            }
            if meta.retention_class.expires_at(meta.created_at, retention) > now {
                continue;
            }
            self.blobs.remove(meta.id.as_bytes()).map_err(storage_err)?;
            meta.anonymized = true;
            self.write_meta(&meta)?;
            reclaimed += meta.size;
            anonymized.push(meta.id);
        }

        if !anonymized.is_empty() {
            let total = self.total_bytes()?;
            self.set_total_bytes(total.saturating_sub(reclaimed))?;
            self.db.flush().map_err(storage_err)?;
            info!(
                count = anonymized.len(),
                reclaimed, "anonymization sweep completed"
            );
        }
        Ok(anonymized)
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn write_meta(&self, meta: &ArtifactMeta) -> Result<(), LexeconError> {
        let bytes =
            bincode::serialize(meta).map_err(|e| LexeconError::Serialization(e.to_string()))?;
        self.meta
            .insert(meta.id.as_bytes(), bytes)
            .map_err(storage_err)?;
        Ok(())
    }

    fn index_decision(&self, decision_id: &str, id: &Hash32) -> Result<(), LexeconError> {
        self.by_decision
            .insert(index_key(decision_id.as_bytes(), id), &[][..])
            .map_err(storage_err)?;
        Ok(())
    }

    fn collect_index(&self, tree: &sled::Tree, prefix: &[u8]) -> Result<Vec<ArtifactMeta>, LexeconError> {
        let mut full_prefix = prefix.to_vec();
        full_prefix.push(b'/');
        let mut out = Vec::new();
        for item in tree.scan_prefix(&full_prefix) {
            let (key, _) = item.map_err(storage_err)?;
            let hash_bytes = &key[full_prefix.len()..];
            let mut arr = [0u8; 32];
            arr.copy_from_slice(hash_bytes);
            if let Some(meta) = self.get_meta(&Hash32::from_bytes(arr))? {
                out.push(meta);
            }
        }
        Ok(out)
    }

    fn set_total_bytes(&self, total: u64) -> Result<(), LexeconError> {
        self.counters
            .insert(TOTAL_BYTES_KEY, &total.to_be_bytes()[..])
            .map_err(storage_err)?;
        Ok(())
    }
}

fn index_key(prefix: &[u8], id: &Hash32) -> Vec<u8> {
    let mut key = prefix.to_vec();
    key.push(b'/');
    key.extend_from_slice(id.as_bytes());
    key
}

fn storage_err(e: sled::Error) -> LexeconError {
    LexeconError::Storage(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str, capacity: u64) -> (EvidenceStore, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!(
            "lexecon_evidence_{}_{}",
            std::process::id(),
            name
        ));
        let _ = std::fs::remove_dir_all(&dir);
        (EvidenceStore::open(&dir, capacity).unwrap(), dir)
    }

    #[test]
    fn content_hash_is_the_id() {
        let (store, dir) = temp_store("hash_id", 1 << 20);
        let meta = store
            .put(
                b"hello evidence",
                ArtifactCategory::DecisionLog,
                RetentionClass::Standard,
                &["d-1".into()],
                None,
                1_000,
            )
            .unwrap();
        assert_eq!(meta.id, lexecon_crypto::sha256(b"hello evidence"));
        assert_eq!(store.get_content(&meta.id).unwrap().unwrap(), b"hello evidence");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn put_is_idempotent_and_merges_links() {
        let (store, dir) = temp_store("idempotent", 1 << 20);
        let a = store
            .put(
                b"same bytes",
                ArtifactCategory::AuditTrail,
                RetentionClass::Standard,
                &["d-1".into()],
                None,
                1_000,
            )
            .unwrap();
        let b = store
            .put(
                b"same bytes",
                ArtifactCategory::AuditTrail,
                RetentionClass::Standard,
                &["d-2".into()],
                None,
                2_000,
            )
            .unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(b.linked_decisions, vec!["d-1".to_string(), "d-2".to_string()]);
        // Only one copy of the content counts toward capacity.
        assert_eq!(store.total_bytes().unwrap(), b"same bytes".len() as u64);
        assert_eq!(store.list_by_decision("d-2").unwrap().len(), 1);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn capacity_limit_reports_store_full() {
        let (store, dir) = temp_store("capacity", 10);
        store
            .put(
                b"12345678",
                ArtifactCategory::Screenshot,
                RetentionClass::Ephemeral,
                &[],
                None,
                1_000,
            )
            .unwrap();
        let err = store
            .put(
                b"abc",
                ArtifactCategory::Screenshot,
                RetentionClass::Ephemeral,
                &[],
                None,
                1_000,
            )
            .unwrap_err();
        assert!(matches!(err, LexeconError::EvidenceStoreFull { .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn link_unknown_artifact_fails() {
        let (store, dir) = temp_store("link_unknown", 1 << 20);
        let err = store
            .link(&Hash32::from_bytes([5u8; 32]), "d-1")
            .unwrap_err();
        assert!(matches!(err, LexeconError::UnknownArtifact(_)));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn category_index_lists_artifacts() {
        let (store, dir) = temp_store("category", 1 << 20);
        store
            .put(
                b"one",
                ArtifactCategory::PolicySnapshot,
                RetentionClass::Regulatory,
                &[],
                None,
                1_000,
            )
            .unwrap();
        store
            .put(
                b"two",
                ArtifactCategory::DecisionLog,
                RetentionClass::Standard,
                &[],
                None,
                1_000,
            )
            .unwrap();
        let snaps = store.list_by_category(ArtifactCategory::PolicySnapshot).unwrap();
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].id, lexecon_crypto::sha256(b"one"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn created_index_supports_time_range_queries() {
        let (store, dir) = temp_store("created_range", 1 << 20);
        for (content, at) in [(b"a".as_slice(), 1_000i64), (b"b", 2_000), (b"c", 3_000)] {
            store
                .put(
                    content,
                    ArtifactCategory::AuditTrail,
                    RetentionClass::Standard,
                    &[],
                    None,
                    at,
                )
                .unwrap();
        }
        let mid = store.list_created_between(1_500, 3_000).unwrap();
        assert_eq!(mid.len(), 1);
        assert_eq!(mid[0].id, lexecon_crypto::sha256(b"b"));

        let all = store.list_created_between(0, 10_000).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].created_at <= w[1].created_at));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn sweep_anonymizes_expired_content_but_keeps_linkage() {
        let (store, dir) = temp_store("sweep", 1 << 20);
        let retention = RetentionConfig {
            regulatory_days: 100,
            standard_days: 10,
            ephemeral_days: 1,
        };
        let day = lexecon_core::constants::MS_PER_DAY;

        let ephemeral = store
            .put(
                b"short lived",
                ArtifactCategory::Screenshot,
                RetentionClass::Ephemeral,
                &["d-1".into()],
                None,
                0,
            )
            .unwrap();
        let durable = store
            .put(
                b"long lived",
                ArtifactCategory::AuditTrail,
                RetentionClass::Regulatory,
                &["d-1".into()],
                None,
                0,
            )
            .unwrap();

        let swept = store.run_anonymization_sweep(2 * day, &retention).unwrap();
        assert_eq!(swept, vec![ephemeral.id]);

        // Content gone, metadata and linkage intact.
        assert!(store.get_content(&ephemeral.id).unwrap().is_none());
        let meta = store.get_meta(&ephemeral.id).unwrap().unwrap();
        assert!(meta.anonymized);
        assert_eq!(meta.linked_decisions, vec!["d-1".to_string()]);
        assert_eq!(store.list_by_decision("d-1").unwrap().len(), 2);

        // The regulatory artifact survives untouched.
        assert!(store.get_content(&durable.id).unwrap().is_some());

        // A second sweep finds nothing new.
        assert!(store.run_anonymization_sweep(2 * day, &retention).unwrap().is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

}
