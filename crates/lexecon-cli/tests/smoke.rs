//! End-to-end smoke test for the lexecon binary: key generation, policy
//! hashing, and the verify exit-code contract, driven through real
//! subprocess invocations.
//!
//! Run with:
//!   cargo test -p lexecon-cli --test smoke

use std::path::PathBuf;
use std::process::{Command, Output};

fn lexecon(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_lexecon"))
        .args(args)
        .output()
        .expect("failed to run lexecon")
}

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("lexecon_cli_{}_{}", std::process::id(), name));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn keygen_writes_a_loadable_key_file() {
    let dir = temp_dir("keygen");
    let key_path = dir.join("node.key.json");

    let out = lexecon(&["keygen", "--out", key_path.to_str().unwrap()]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("node_id:"), "stdout: {stdout}");
    assert!(key_path.exists());

    // The printed node id matches the key file contents.
    let identity = lexecon_crypto::keyfile::load(&key_path, None).unwrap();
    assert!(stdout.contains(identity.node_id()));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn encrypted_keygen_requires_the_passphrase() {
    let dir = temp_dir("keygen_enc");
    let key_path = dir.join("node.key.json");

    let out = lexecon(&[
        "keygen",
        "--out",
        key_path.to_str().unwrap(),
        "--passphrase",
        "hunter2",
    ]);
    assert!(out.status.success());

    assert!(lexecon_crypto::keyfile::load(&key_path, None).is_err());
    assert!(lexecon_crypto::keyfile::load(&key_path, Some("hunter2")).is_ok());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn policy_hash_is_deterministic_and_rejects_bad_bundles() {
    let dir = temp_dir("policy_hash");
    let bundle_path = dir.join("policy.json");
    std::fs::write(
        &bundle_path,
        serde_json::json!({
            "mode": "STRICT",
            "terms": [
                {"id": "agent_a", "category": "actor", "label": "Agent A"},
                {"id": "read_public", "category": "action", "label": "Read public"}
            ],
            "relations": [
                {"type": "permits", "subject": "agent_a", "action": "read_public"}
            ]
        })
        .to_string(),
    )
    .unwrap();

    let first = lexecon(&["policy-hash", "--bundle", bundle_path.to_str().unwrap()]);
    let second = lexecon(&["policy-hash", "--bundle", bundle_path.to_str().unwrap()]);
    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout);
    assert_eq!(String::from_utf8_lossy(&first.stdout).trim().len(), 64);

    // A relation referencing an undefined term is rejected.
    let bad_path = dir.join("bad.json");
    std::fs::write(
        &bad_path,
        serde_json::json!({
            "mode": "STRICT",
            "terms": [],
            "relations": [
                {"type": "permits", "subject": "ghost", "action": "read_public"}
            ]
        })
        .to_string(),
    )
    .unwrap();
    let bad = lexecon(&["policy-hash", "--bundle", bad_path.to_str().unwrap()]);
    assert!(!bad.status.success());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn verify_bundle_exit_codes_for_unreadable_input() {
    let dir = temp_dir("verify_unreadable");
    let keys_path = dir.join("ring.json");
    std::fs::write(&keys_path, "[]").unwrap();

    // An empty directory has no manifest: exit 3.
    let bundle_dir = dir.join("empty_bundle");
    std::fs::create_dir_all(&bundle_dir).unwrap();
    let out = lexecon(&[
        "verify-bundle",
        "--bundle",
        bundle_dir.to_str().unwrap(),
        "--keys",
        keys_path.to_str().unwrap(),
    ]);
    assert_eq!(out.status.code(), Some(3));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn ledger_verify_reports_empty_ledger_as_unreadable() {
    let dir = temp_dir("ledger_verify_empty");
    let keys_path = dir.join("ring.json");
    std::fs::write(&keys_path, "[]").unwrap();

    let out = lexecon(&[
        "ledger-verify",
        "--data-dir",
        dir.join("fresh_ledger").to_str().unwrap(),
        "--keys",
        keys_path.to_str().unwrap(),
    ]);
    assert_eq!(out.status.code(), Some(3));
    let _ = std::fs::remove_dir_all(&dir);
}
