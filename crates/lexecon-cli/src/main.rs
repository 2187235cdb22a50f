//! lexecon — operator tooling for the Lexecon governance gateway.
//!
//! Subcommands:
//!   keygen        generate a node identity key file
//!   policy-hash   validate a policy bundle and print its version hash
//!   ledger-verify re-walk a ledger slice and report the first bad entry
//!   export        assemble a signed audit bundle from the node's stores
//!   verify-bundle verify an exported bundle offline
//!
//! The two verify commands exit 0 when intact, 2 on mismatch, 3 when the
//! input is unreadable, and 4 when the issuer key is unknown.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use lexecon_core::config::GatewayConfig;
use lexecon_core::ledger::{EventType, VerifyFailure};
use lexecon_core::{Clock, SystemClock};
use lexecon_crypto::{keyfile, KeyRing, NodeIdentity};
use lexecon_evidence::EvidenceStore;
use lexecon_export::{assemble, verify_bundle, ExportRequest};
use lexecon_ledger::{verify_chain, LedgerStore, LedgerWriter};
use lexecon_policy::Policy;
use lexecon_service::GatewayStore;

#[derive(Parser, Debug)]
#[command(
    name = "lexecon",
    version,
    about = "Lexecon governance gateway — audit and key tooling"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a fresh Ed25519 node identity key file.
    Keygen {
        /// Where to write the key file.
        #[arg(long)]
        out: PathBuf,
        /// Encrypt the key file under this passphrase.
        #[arg(long)]
        passphrase: Option<String>,
    },

    /// Validate a policy bundle and print its canonical version hash.
    PolicyHash {
        /// Path to the policy bundle JSON.
        #[arg(long)]
        bundle: PathBuf,
    },

    /// Re-walk the ledger chain, recomputing hashes and signatures.
    LedgerVerify {
        /// Ledger database directory.
        #[arg(long)]
        data_dir: PathBuf,
        /// JSON array of trusted issuer public keys (hex).
        #[arg(long)]
        keys: PathBuf,
        /// First sequence number to check.
        #[arg(long, default_value_t = 0)]
        from: u64,
        /// Last sequence number to check (defaults to the head).
        #[arg(long)]
        to: Option<u64>,
    },

    /// Assemble a signed export bundle from the node's stores.
    Export {
        /// Ledger database directory.
        #[arg(long)]
        ledger_dir: PathBuf,
        /// Gateway store directory (decisions, risk records, policies).
        #[arg(long)]
        store_dir: PathBuf,
        /// Evidence store directory.
        #[arg(long)]
        evidence_dir: PathBuf,
        /// Node identity key file (signs the manifest and the
        /// EXPORT_CREATED ledger entry).
        #[arg(long)]
        key: PathBuf,
        /// Passphrase for an encrypted key file.
        #[arg(long)]
        passphrase: Option<String>,
        /// Output bundle directory.
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 0)]
        from: u64,
        /// Last sequence number to export (defaults to the head).
        #[arg(long)]
        to: Option<u64>,
        #[arg(long, default_value = "operator")]
        requestor: String,
        #[arg(long, default_value = "audit export")]
        purpose: String,
        /// Skip raw evidence blobs.
        #[arg(long)]
        no_evidence: bool,
    },

    /// Verify an exported bundle offline.
    VerifyBundle {
        /// Bundle directory.
        #[arg(long)]
        bundle: PathBuf,
        /// JSON array of trusted issuer public keys (hex).
        #[arg(long)]
        keys: PathBuf,
        /// Also re-walk the embedded ledger subchain.
        #[arg(long)]
        rewalk: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    match args.command {
        Command::Keygen { out, passphrase } => keygen(out, passphrase),
        Command::PolicyHash { bundle } => policy_hash(bundle),
        Command::LedgerVerify {
            data_dir,
            keys,
            from,
            to,
        } => ledger_verify(data_dir, keys, from, to),
        Command::Export {
            ledger_dir,
            store_dir,
            evidence_dir,
            key,
            passphrase,
            out,
            from,
            to,
            requestor,
            purpose,
            no_evidence,
        } => {
            export(
                ledger_dir,
                store_dir,
                evidence_dir,
                key,
                passphrase,
                out,
                from,
                to,
                requestor,
                purpose,
                !no_evidence,
            )
            .await
        }
        Command::VerifyBundle {
            bundle,
            keys,
            rewalk,
        } => bundle_verify(bundle, keys, rewalk),
    }
}

fn keygen(out: PathBuf, passphrase: Option<String>) -> anyhow::Result<()> {
    let identity = NodeIdentity::generate();
    match passphrase.as_deref() {
        Some(pass) => keyfile::save_encrypted(&identity, &out, pass)?,
        None => keyfile::save_plain(&identity, &out)?,
    }
    println!("node_id:    {}", identity.node_id());
    println!("public_key: {}", hex::encode(identity.public_key_bytes()));
    println!("key file:   {}", out.display());
    Ok(())
}

fn policy_hash(bundle: PathBuf) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&bundle)
        .with_context(|| format!("reading {}", bundle.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw).context("parsing bundle JSON")?;
    let parsed = serde_json::from_value(value).context("bundle shape")?;
    let policy = Policy::load(parsed)?;
    println!("{}", policy.hash());
    Ok(())
}

fn ledger_verify(
    data_dir: PathBuf,
    keys: PathBuf,
    from: u64,
    to: Option<u64>,
) -> anyhow::Result<()> {
    let store = match LedgerStore::open(&data_dir) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("cannot open ledger: {e}");
            std::process::exit(3);
        }
    };
    let ring = KeyRing::load(&keys)?;
    let to = match to {
        Some(to) => to,
        None => match store.head()? {
            Some(head) => head.seq,
            None => {
                eprintln!("ledger is empty");
                std::process::exit(3);
            }
        },
    };

    let report = verify_chain(&store, from, to, &ring)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    let code = if report.valid {
        0
    } else if report.reason == Some(VerifyFailure::UnknownIssuer) {
        4
    } else {
        2
    };
    std::process::exit(code);
}

#[allow(clippy::too_many_arguments)]
async fn export(
    ledger_dir: PathBuf,
    store_dir: PathBuf,
    evidence_dir: PathBuf,
    key: PathBuf,
    passphrase: Option<String>,
    out: PathBuf,
    from: u64,
    to: Option<u64>,
    requestor: String,
    purpose: String,
    include_evidence: bool,
) -> anyhow::Result<()> {
    let identity = Arc::new(keyfile::load(&key, passphrase.as_deref())?);
    let config = GatewayConfig::default();
    let ledger_store = Arc::new(LedgerStore::open(&ledger_dir)?);
    let gateway_store = GatewayStore::open(&store_dir)?;
    let evidence_store = EvidenceStore::open(&evidence_dir, config.evidence_capacity_bytes)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let to = match to {
        Some(to) => to,
        None => ledger_store
            .head()?
            .map(|h| h.seq)
            .context("ledger is empty")?,
    };
    let request = ExportRequest {
        requestor,
        purpose,
        from_seq: from,
        to_seq: to,
        include_evidence,
    };

    let manifest = assemble(
        &out,
        &request,
        &ledger_store,
        &gateway_store,
        &evidence_store,
        &identity,
        clock.now_ms(),
    )?;

    // This process holds the store lock, so it is the node's writer for
    // the duration: record the export on the chain.
    let ledger = LedgerWriter::spawn(
        Arc::clone(&ledger_store),
        Arc::clone(&identity),
        Arc::clone(&clock),
        config.ledger_queue_bound,
        Duration::from_millis(config.ledger_append_timeout_ms),
    )?;
    let entry = ledger
        .append(
            EventType::ExportCreated,
            serde_json::json!({
                "bundle_id": &manifest.bundle_id,
                "from_seq": request.from_seq,
                "to_seq": request.to_seq,
                "root_checksum": manifest.root_checksum,
            }),
        )
        .await?;
    info!(seq = entry.seq, "export recorded on ledger");

    println!("bundle_id:     {}", manifest.bundle_id);
    println!("root_checksum: {}", manifest.root_checksum);
    println!("sections:      {}", manifest.section_checksums.len());
    println!("bundle dir:    {}", out.display());
    println!(
        "created:       {}",
        chrono::DateTime::from_timestamp_millis(manifest.created_at)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default()
    );
    Ok(())
}

fn bundle_verify(bundle: PathBuf, keys: PathBuf, rewalk: bool) -> anyhow::Result<()> {
    let ring = KeyRing::load(&keys)?;
    let report = verify_bundle(&bundle, &ring, rewalk);
    println!("{}", serde_json::to_string_pretty(&report)?);
    std::process::exit(report.exit_code());
}
