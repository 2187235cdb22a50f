use lexecon_core::decision::Decision;
use lexecon_core::risk::RiskRecord;
use lexecon_core::{Hash32, LexeconError};
use lexecon_token::PolicyHashRegistry;
use std::path::Path;

/// Gateway persistence outside the ledger: decisions keyed by decision
/// id, risk records keyed by risk id, and policy snapshots keyed by
/// policy hash. All values are JSON bytes; policy snapshots are stored as
/// their exact canonical bytes so the stored blob hashes back to its key.
///
/// Named trees:
///   decisions    — decision id utf8 → JSON(Decision)
///   risk_records — risk id utf8     → JSON(RiskRecord)
///   policies     — policy hash bytes → canonical snapshot bytes
pub struct GatewayStore {
    db: sled::Db,
    decisions: sled::Tree,
    risk_records: sled::Tree,
    policies: sled::Tree,
}

impl GatewayStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LexeconError> {
        let db = sled::open(path).map_err(storage_err)?;
        Ok(Self {
            decisions: db.open_tree("decisions").map_err(storage_err)?,
            risk_records: db.open_tree("risk_records").map_err(storage_err)?,
            policies: db.open_tree("policies").map_err(storage_err)?,
            db,
        })
    }

    pub fn put_decision(&self, decision: &Decision) -> Result<(), LexeconError> {
        let bytes =
            serde_json::to_vec(decision).map_err(|e| LexeconError::Serialization(e.to_string()))?;
        self.decisions
            .insert(decision.decision_id.to_string().as_bytes(), bytes)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn get_decision(&self, decision_id: &str) -> Result<Option<Decision>, LexeconError> {
        match self.decisions.get(decision_id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes)
                    .map_err(|e| LexeconError::Serialization(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    pub fn put_risk_record(&self, record: &RiskRecord) -> Result<(), LexeconError> {
        let bytes =
            serde_json::to_vec(record).map_err(|e| LexeconError::Serialization(e.to_string()))?;
        self.risk_records
            .insert(record.risk_id.as_bytes(), bytes)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn get_risk_record(&self, risk_id: &str) -> Result<Option<RiskRecord>, LexeconError> {
        match self.risk_records.get(risk_id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes)
                    .map_err(|e| LexeconError::Serialization(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    /// Store a policy snapshot under its hash. The bytes must be the
    /// canonical form whose SHA-256 is `hash`.
    pub fn put_policy_snapshot(&self, hash: &Hash32, canonical: &[u8]) -> Result<(), LexeconError> {
        self.policies
            .insert(hash.as_bytes(), canonical)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn get_policy_snapshot(&self, hash: &Hash32) -> Result<Option<Vec<u8>>, LexeconError> {
        Ok(self
            .policies
            .get(hash.as_bytes())
            .map_err(storage_err)?
            .map(|iv| iv.to_vec()))
    }

    /// Every policy version this gateway has ever loaded.
    pub fn known_policy_hashes(&self) -> Result<Vec<Hash32>, LexeconError> {
        let mut out = Vec::new();
        for item in self.policies.iter() {
            let (key, _) = item.map_err(storage_err)?;
            let mut arr = [0u8; 32];
            arr.copy_from_slice(&key);
            out.push(Hash32::from_bytes(arr));
        }
        Ok(out)
    }

    pub fn flush(&self) -> Result<(), LexeconError> {
        self.db.flush().map_err(storage_err)?;
        Ok(())
    }
}

impl PolicyHashRegistry for GatewayStore {
    fn is_known_policy(&self, hash: &Hash32) -> bool {
        self.policies.contains_key(hash.as_bytes()).unwrap_or(false)
    }
}

fn storage_err(e: sled::Error) -> LexeconError {
    LexeconError::Storage(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_snapshot_round_trip() {
        let dir = std::env::temp_dir().join(format!("lexecon_gwstore_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let store = GatewayStore::open(&dir).unwrap();

        let canonical = br#"{"mode":"STRICT","relations":[],"terms":[]}"#.to_vec();
        let hash = lexecon_crypto::sha256(&canonical);
        store.put_policy_snapshot(&hash, &canonical).unwrap();

        assert_eq!(store.get_policy_snapshot(&hash).unwrap().unwrap(), canonical);
        assert!(store.is_known_policy(&hash));
        assert!(!store.is_known_policy(&Hash32::from_bytes([1u8; 32])));
        assert_eq!(store.known_policy_hashes().unwrap(), vec![hash]);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
