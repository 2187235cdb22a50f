use lexecon_core::ledger::LedgerEntry;
use lexecon_core::{Hash32, LexeconError};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;
use std::path::Path;

/// Persistent ledger storage backed by sled (pure-Rust, no C dependencies).
///
/// Named trees:
///   entries — seq u64 BE bytes → JSON(LedgerEntry)
///   by_hash — entry hash bytes → seq u64 BE bytes
///
/// Entries carry an arbitrary JSON payload, so the storage encoding is
/// JSON rather than bincode: a non-self-describing format cannot decode
/// `serde_json::Value`.
///
/// The store itself enforces nothing about chain shape; the single writer
/// task owns append discipline, and `verify` checks the chain after the
/// fact. Both trees are updated in one sled transaction so no partial
/// entry is ever readable.
pub struct LedgerStore {
    db: sled::Db,
    entries: sled::Tree,
    by_hash: sled::Tree,
}

impl LedgerStore {
    /// Open or create the ledger database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LexeconError> {
        let db = sled::open(path).map_err(storage_err)?;
        let entries = db.open_tree("entries").map_err(storage_err)?;
        let by_hash = db.open_tree("by_hash").map_err(storage_err)?;
        Ok(Self {
            db,
            entries,
            by_hash,
        })
    }

    /// The highest-seq entry, if any.
    pub fn head(&self) -> Result<Option<LedgerEntry>, LexeconError> {
        match self.entries.last().map_err(storage_err)? {
            Some((_, bytes)) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Number of entries (head seq + 1, or 0 when empty).
    pub fn len(&self) -> Result<u64, LexeconError> {
        Ok(self.head()?.map(|e| e.seq + 1).unwrap_or(0))
    }

    pub fn is_empty(&self) -> Result<bool, LexeconError> {
        Ok(self.entries.is_empty())
    }

    pub fn get_by_seq(&self, seq: u64) -> Result<Option<LedgerEntry>, LexeconError> {
        match self.entries.get(seq.to_be_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_by_hash(&self, hash: &Hash32) -> Result<Option<LedgerEntry>, LexeconError> {
        match self.by_hash.get(hash.as_bytes()).map_err(storage_err)? {
            Some(seq_bytes) => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&seq_bytes);
                self.get_by_seq(u64::from_be_bytes(arr))
            }
            None => Ok(None),
        }
    }

    /// Persist an entry under both indices atomically and make it durable.
    ///
    /// Raw storage write: the writer task is the only caller at steady
    /// state. Overwriting an existing seq is possible here by design — the
    /// tamper-detection tests depend on it — and is exactly what `verify`
    /// exists to catch.
    pub fn put_entry(&self, entry: &LedgerEntry) -> Result<(), LexeconError> {
        let bytes =
            serde_json::to_vec(entry).map_err(|e| LexeconError::Serialization(e.to_string()))?;
        let seq_key = entry.seq.to_be_bytes();
        let hash_key = entry.hash.as_bytes().to_vec();

        (&self.entries, &self.by_hash)
            .transaction(|(entries, by_hash)| {
                entries.insert(&seq_key, bytes.as_slice())?;
                by_hash.insert(hash_key.as_slice(), &seq_key[..])?;
                Ok::<(), ConflictableTransactionError<sled::Error>>(())
            })
            .map_err(|e: TransactionError<sled::Error>| {
                LexeconError::LedgerUnavailable(e.to_string())
            })?;

        self.db.flush().map_err(|e| LexeconError::LedgerUnavailable(e.to_string()))?;
        Ok(())
    }

    /// Lazy, restartable iterator over `[from_seq, to_seq]`.
    pub fn range(&self, from_seq: u64, to_seq: u64) -> LedgerRange<'_> {
        LedgerRange {
            store: self,
            next: from_seq,
            end: to_seq,
        }
    }
}

/// Iterator over a seq range. A gap in the range surfaces as
/// `LedgerCorrupt`; iteration can be restarted from any seq.
pub struct LedgerRange<'a> {
    store: &'a LedgerStore,
    next: u64,
    end: u64,
}

impl Iterator for LedgerRange<'_> {
    type Item = Result<LedgerEntry, LexeconError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next > self.end {
            return None;
        }
        let seq = self.next;
        self.next += 1;
        match self.store.get_by_seq(seq) {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => Some(Err(LexeconError::LedgerCorrupt {
                seq,
                reason: "missing_entry".into(),
            })),
            Err(e) => Some(Err(e)),
        }
    }
}

fn decode(bytes: &[u8]) -> Result<LedgerEntry, LexeconError> {
    serde_json::from_slice(bytes).map_err(|e| LexeconError::Serialization(e.to_string()))
}

fn storage_err(e: sled::Error) -> LexeconError {
    LexeconError::Storage(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexecon_core::ledger::EventType;
    use lexecon_core::SignatureBytes;

    fn temp_store(name: &str) -> (LedgerStore, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!(
            "lexecon_ledger_store_{}_{}",
            std::process::id(),
            name
        ));
        let _ = std::fs::remove_dir_all(&dir);
        (LedgerStore::open(&dir).unwrap(), dir)
    }

    fn entry(seq: u64, prev: Hash32) -> LedgerEntry {
        LedgerEntry {
            seq,
            event_type: EventType::Decision,
            timestamp: 1_000 + seq as i64,
            payload: serde_json::json!({"seq": seq}),
            prev_hash: prev,
            hash: Hash32::from_bytes([seq as u8 + 1; 32]),
            issuer: "node-a".into(),
            signature: SignatureBytes(vec![0u8; 64]),
        }
    }

    #[test]
    fn put_get_by_both_keys() {
        let (store, dir) = temp_store("put_get");
        let e = entry(0, Hash32::zero());
        store.put_entry(&e).unwrap();

        assert_eq!(store.get_by_seq(0).unwrap().unwrap(), e);
        assert_eq!(store.get_by_hash(&e.hash).unwrap().unwrap(), e);
        assert_eq!(store.head().unwrap().unwrap().seq, 0);
        assert_eq!(store.len().unwrap(), 1);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn range_is_restartable_and_detects_gaps() {
        let (store, dir) = temp_store("range");
        let e0 = entry(0, Hash32::zero());
        let e1 = entry(1, e0.hash);
        store.put_entry(&e0).unwrap();
        store.put_entry(&e1).unwrap();

        let collected: Vec<_> = store.range(0, 1).map(|r| r.unwrap().seq).collect();
        assert_eq!(collected, vec![0, 1]);

        // Restart mid-range.
        let tail: Vec<_> = store.range(1, 1).map(|r| r.unwrap().seq).collect();
        assert_eq!(tail, vec![1]);

        // A gap surfaces as corruption, not a panic.
        let mut gappy = store.range(0, 5);
        assert!(gappy.next().unwrap().is_ok());
        assert!(gappy.next().unwrap().is_ok());
        assert!(matches!(
            gappy.next().unwrap().unwrap_err(),
            LexeconError::LedgerCorrupt { seq: 2, .. }
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn reopen_preserves_entries() {
        let dir = std::env::temp_dir().join(format!("lexecon_ledger_reopen_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        {
            let store = LedgerStore::open(&dir).unwrap();
            store.put_entry(&entry(0, Hash32::zero())).unwrap();
        }
        let store = LedgerStore::open(&dir).unwrap();
        assert_eq!(store.len().unwrap(), 1);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
