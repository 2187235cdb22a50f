use crate::store::LedgerStore;
use lexecon_core::ledger::{EventType, LedgerEntry, LedgerEntryBody};
use lexecon_core::{Clock, Hash32, LexeconError};
use lexecon_crypto::NodeIdentity;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};

struct AppendCmd {
    event_type: EventType,
    payload: serde_json::Value,
    resp: oneshot::Sender<Result<LedgerEntry, LexeconError>>,
}

/// Cloneable handle for submitting appends to the single writer task.
#[derive(Clone)]
pub struct LedgerHandle {
    tx: mpsc::Sender<AppendCmd>,
    append_timeout: Duration,
}

impl LedgerHandle {
    /// Append one event. Fails fast with `Backpressure` when the writer
    /// queue is full, `Timeout` when the writer does not answer within the
    /// configured deadline, and `LedgerUnavailable` when the writer is
    /// gone.
    pub async fn append(
        &self,
        event_type: EventType,
        payload: serde_json::Value,
    ) -> Result<LedgerEntry, LexeconError> {
        let (resp, rx) = oneshot::channel();
        self.tx
            .try_send(AppendCmd {
                event_type,
                payload,
                resp,
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => LexeconError::Backpressure,
                mpsc::error::TrySendError::Closed(_) => {
                    LexeconError::LedgerUnavailable("writer stopped".into())
                }
            })?;

        match tokio::time::timeout(self.append_timeout, rx).await {
            Err(_) => Err(LexeconError::Timeout("ledger append".into())),
            Ok(Err(_)) => Err(LexeconError::LedgerUnavailable(
                "writer dropped the request".into(),
            )),
            Ok(Ok(result)) => result,
        }
    }
}

/// The single writer owning the append path. All other work is parallel;
/// total order over entries comes from this one task draining its queue.
pub struct LedgerWriter;

impl LedgerWriter {
    /// Ensure the genesis entry exists, then spawn the writer task and
    /// return its handle.
    pub fn spawn(
        store: Arc<LedgerStore>,
        identity: Arc<NodeIdentity>,
        clock: Arc<dyn Clock>,
        queue_bound: usize,
        append_timeout: Duration,
    ) -> Result<LedgerHandle, LexeconError> {
        let mut head = store.head()?;
        if head.is_none() {
            let genesis = build_entry(
                &identity,
                clock.as_ref(),
                0,
                Hash32::zero(),
                EventType::Genesis,
                serde_json::json!({ "node": identity.node_id() }),
            )?;
            store.put_entry(&genesis)?;
            info!(node = %identity.node_id(), "ledger genesis written");
            head = Some(genesis);
        }
        let head = head.ok_or_else(|| LexeconError::LedgerUnavailable("no head after genesis".into()))?;

        let (tx, mut rx) = mpsc::channel::<AppendCmd>(queue_bound);
        tokio::spawn(async move {
            let mut next_seq = head.seq + 1;
            let mut prev_hash = head.hash;
            while let Some(cmd) = rx.recv().await {
                let result = build_entry(
                    &identity,
                    clock.as_ref(),
                    next_seq,
                    prev_hash,
                    cmd.event_type,
                    cmd.payload,
                )
                .and_then(|entry| {
                    store.put_entry(&entry)?;
                    Ok(entry)
                });

                match &result {
                    Ok(entry) => {
                        next_seq = entry.seq + 1;
                        prev_hash = entry.hash;
                    }
                    Err(e) => {
                        // The entry was not persisted; seq state is
                        // unchanged and the next append reuses it.
                        error!(seq = next_seq, error = %e, "ledger append failed");
                    }
                }
                // A caller that timed out is gone; nothing to do.
                let _ = cmd.resp.send(result);
            }
        });

        Ok(LedgerHandle { tx, append_timeout })
    }
}

/// Assemble, hash and sign one entry. The hash covers the canonical body
/// (everything except `hash` and `signature`); the signature covers the
/// hash bytes.
fn build_entry(
    identity: &NodeIdentity,
    clock: &dyn Clock,
    seq: u64,
    prev_hash: Hash32,
    event_type: EventType,
    payload: serde_json::Value,
) -> Result<LedgerEntry, LexeconError> {
    let timestamp = clock.now_ms();
    let body = LedgerEntryBody {
        seq,
        event_type,
        timestamp,
        payload: &payload,
        prev_hash: &prev_hash,
        issuer: identity.node_id(),
    };
    let hash = lexecon_crypto::hash_canonical(&body)?;
    let signature = identity.sign(hash.as_bytes());
    Ok(LedgerEntry {
        seq,
        event_type,
        timestamp,
        payload,
        prev_hash,
        hash,
        issuer: identity.node_id().to_string(),
        signature,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexecon_core::ManualClock;

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "lexecon_writer_{}_{}",
            std::process::id(),
            name
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn spawn_writer(
        dir: &std::path::Path,
        queue_bound: usize,
    ) -> (LedgerHandle, Arc<LedgerStore>, Arc<NodeIdentity>) {
        let store = Arc::new(LedgerStore::open(dir).unwrap());
        let identity = Arc::new(NodeIdentity::generate());
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let handle = LedgerWriter::spawn(
            Arc::clone(&store),
            Arc::clone(&identity),
            clock,
            queue_bound,
            Duration::from_secs(2),
        )
        .unwrap();
        (handle, store, identity)
    }

    #[tokio::test]
    async fn genesis_then_sequential_appends() {
        let dir = temp_dir("seq");
        let (handle, store, _) = spawn_writer(&dir, 16);

        let genesis = store.get_by_seq(0).unwrap().unwrap();
        assert!(genesis.is_genesis());
        assert_eq!(genesis.prev_hash.to_hex(), "0".repeat(64));

        let e1 = handle
            .append(EventType::Decision, serde_json::json!({"n": 1}))
            .await
            .unwrap();
        let e2 = handle
            .append(EventType::Decision, serde_json::json!({"n": 2}))
            .await
            .unwrap();
        assert_eq!(e1.seq, 1);
        assert_eq!(e2.seq, 2);
        assert_eq!(e1.prev_hash, genesis.hash);
        assert_eq!(e2.prev_hash, e1.hash);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn submission_order_is_seq_order() {
        let dir = temp_dir("order");
        let (handle, _, _) = spawn_writer(&dir, 64);

        let mut seqs = Vec::new();
        for n in 0..20 {
            let e = handle
                .append(EventType::Decision, serde_json::json!({"n": n}))
                .await
                .unwrap();
            seqs.push(e.seq);
        }
        let mut sorted = seqs.clone();
        sorted.sort_unstable();
        assert_eq!(seqs, sorted);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn replacement_writer_resumes_the_chain() {
        let dir = temp_dir("resume");
        let (handle, store, _) = spawn_writer(&dir, 16);
        handle
            .append(EventType::Decision, serde_json::json!({"n": 1}))
            .await
            .unwrap();
        drop(handle);

        // A replacement writer (say, after a restart) picks up from the
        // stored head; a different identity does not break linkage.
        let identity = Arc::new(NodeIdentity::generate());
        let clock = Arc::new(ManualClock::new(1_700_000_100_000));
        let handle = LedgerWriter::spawn(
            Arc::clone(&store),
            identity,
            clock,
            16,
            Duration::from_secs(2),
        )
        .unwrap();

        let head_before = store.get_by_seq(1).unwrap().unwrap();
        let e = handle
            .append(EventType::Decision, serde_json::json!({"n": 2}))
            .await
            .unwrap();
        assert_eq!(e.seq, 2);
        assert_eq!(e.prev_hash, head_before.hash);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn closed_writer_reports_unavailable() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = LedgerHandle {
            tx,
            append_timeout: Duration::from_millis(100),
        };
        let err = handle
            .append(EventType::Decision, serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, LexeconError::LedgerUnavailable(_)));
    }

    #[tokio::test]
    async fn full_queue_is_backpressure() {
        // A receiver that never drains: the second try_send hits the bound.
        let (tx, _rx) = mpsc::channel(1);
        let handle = LedgerHandle {
            tx,
            append_timeout: Duration::from_millis(100),
        };
        let first = tokio::time::timeout(
            Duration::from_millis(200),
            handle.append(EventType::Decision, serde_json::json!({"n": 1})),
        )
        .await;
        // The first append times out waiting for a reply that never comes.
        assert!(matches!(first, Ok(Err(LexeconError::Timeout(_)))));

        let err = handle
            .append(EventType::Decision, serde_json::json!({"n": 2}))
            .await
            .unwrap_err();
        assert!(matches!(err, LexeconError::Backpressure));
    }
}
