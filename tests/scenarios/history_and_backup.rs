//! Scenario: Operator recovers from mistakes with history and backups
//!
//! Journey: An operator experiments on a branch, goes back to a known
//! commit, takes a backup, deletes a domain by mistake and restores it.
//!
//! Steps:
//! 1. Adds two domains, branches off after the first
//! 2. Checks out the branch and then the tip of the default branch
//! 3. Creates a backup archive
//! 4. Deletes a domain and restores the archive
//! 5. Prunes history
//!
//! Success Criteria:
//! - Every restore brings back files and registry together
//! - Restores are recorded as manual commits
//! - Pruning keeps every commit reachable from a branch

use std::path::Path;

use sitekeeper::application::{BackupManager, DomainRequest, RemoveOptions};
use sitekeeper::domain::entities::Outcome;
use sitekeeper::domain::value_objects::{ContentHash, DomainName};
use sitekeeper::infrastructure::archive::{read_archive, write_archive};
use sitekeeper::EngineError;

use crate::common::*;

/// SCENARIO: branch, checkout and return
#[test]
fn scenario_checkout_round_trip() {
    let engine = Engine::new();
    let history = engine.deploy.history();

    // Step 1
    engine
        .deploy
        .add(DomainRequest::new("a.example.com", 3000), &opts())
        .unwrap();
    history.create_branch("one-site", None).unwrap();
    let tip = engine
        .deploy
        .add(DomainRequest::new("b.example.com", 3001), &opts())
        .unwrap()
        .commit
        .unwrap();

    // Step 2: the branch only knows a.example.com
    let report = engine.deploy.checkout("one-site", &opts()).unwrap();
    assert_eq!(report.branch.as_deref(), Some("one-site"));
    assert_eq!(report.commit.outcome, Outcome::Manual);
    assert_eq!(engine.domain_names(), vec!["a.example.com"]);
    assert!(engine.available("b.example.com").is_none());
    assert!(!engine.enabled("b.example.com"));

    // Back to main's tip
    let report = engine.deploy.checkout("main", &opts()).unwrap();
    assert_eq!(report.branch.as_deref(), Some("main"));
    assert_eq!(report.commit.snapshot, tip.snapshot);
    assert_eq!(
        engine.domain_names(),
        vec!["a.example.com", "b.example.com"]
    );
    assert!(engine.enabled("b.example.com"));
    assert!(engine.deploy.status().unwrap().is_clean());

    // The diff between the two branches is exactly b.example.com
    let diff = history.diff("one-site", "main").unwrap();
    assert!(!diff.changes.is_empty());
    assert!(diff
        .changes
        .iter()
        .all(|c| c.path.contains("b.example.com")));
}

/// SCENARIO: backup, accidental delete, restore
#[test]
fn scenario_backup_restores_deleted_domain() {
    let engine = Engine::new();
    engine
        .deploy
        .add(DomainRequest::new("a.example.com", 3000).with_tls(true), &opts())
        .unwrap();
    engine
        .deploy
        .add(DomainRequest::new("b.example.com", 3001), &opts())
        .unwrap();
    let before = engine.available("a.example.com").unwrap();

    // Step 3
    let backups = BackupManager::new(&engine.deploy, engine.path("backups"));
    let info = backups.create().unwrap();
    assert!(info.path.exists());
    assert_eq!(backups.list().unwrap().len(), 1);

    // Step 4
    engine
        .deploy
        .remove("a.example.com", &RemoveOptions::new())
        .unwrap();
    assert_eq!(engine.domain_names(), vec!["b.example.com"]);

    let report = backups.restore(&info.path, &opts()).unwrap();
    assert_eq!(report.commit.outcome, Outcome::Manual);
    assert!(report.commit.message.contains("restore backup"));
    assert_eq!(
        engine.domain_names(),
        vec!["a.example.com", "b.example.com"]
    );
    assert_eq!(engine.available("a.example.com").unwrap(), before);
    assert!(engine.enabled("a.example.com"));

    // Step 5: nothing reachable is pruned
    let log_before = engine.commits().len();
    engine.deploy.history().prune().unwrap();
    assert_eq!(engine.commits().len(), log_before);
}

/// SCENARIO: a tampered archive is refused before anything changes
#[test]
fn scenario_corrupt_backup_is_rejected() {
    let engine = Engine::new();
    engine
        .deploy
        .add(DomainRequest::new("a.example.com", 3000), &opts())
        .unwrap();
    let backups = BackupManager::new(&engine.deploy, engine.path("backups"));
    let info = backups.create().unwrap();

    let mut bytes = std::fs::read(&info.path).unwrap();
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0xff;
    std::fs::write(&info.path, bytes).unwrap();

    let calls = engine.daemon.calls().len();
    let err = backups.restore(&info.path, &opts()).unwrap_err();
    assert!(
        matches!(err, EngineError::Storage { .. } | EngineError::Validation { .. }),
        "{:?}",
        err
    );
    assert_eq!(engine.daemon.calls().len(), calls);
}

/// Add a certificate entry to an archive together with a matching manifest item
fn smuggle(archive: &Path, entry: &str, target: &Path, bytes: &[u8]) {
    let mut entries = read_archive(archive).unwrap();
    let mut manifest: serde_json::Value =
        serde_json::from_slice(&entries["manifest.json"]).unwrap();
    manifest["items"]
        .as_array_mut()
        .unwrap()
        .push(serde_json::json!({
            "path": entry,
            "kind": "certificate",
            "sha256": ContentHash::from_bytes(bytes).hex(),
            "size": bytes.len(),
            "target": target,
        }));
    entries.insert(
        "manifest.json".to_string(),
        serde_json::to_vec(&manifest).unwrap(),
    );
    entries.insert(entry.to_string(), bytes.to_vec());
    write_archive(archive, &entries).unwrap();
}

#[cfg(unix)]
fn mode(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).unwrap().permissions().mode() & 0o777
}

/// SCENARIO: lost certificate material comes back from a backup, and only
/// to where the certificate client keeps it
#[test]
fn scenario_restore_puts_certificates_back_in_place() {
    let engine = Engine::new();
    engine
        .deploy
        .add(DomainRequest::new("a.example.com", 3000).with_tls(true), &opts())
        .unwrap();
    let live = engine.path("letsencrypt/live/a.example.com");
    let cert = live.join("fullchain.pem");
    let key = live.join("privkey.pem");
    let original_key = std::fs::read(&key).unwrap();

    let backups = BackupManager::new(&engine.deploy, engine.path("backups"));
    let info = backups.create().unwrap();
    #[cfg(unix)]
    assert_eq!(mode(&info.path), 0o600);

    let outside = engine.path("outside/evil.sh");
    smuggle(&info.path, "certs/a.example.com/evil.sh", &outside, b"#!/bin/sh\n");

    std::fs::remove_file(&cert).unwrap();
    std::fs::remove_file(&key).unwrap();

    backups.restore(&info.path, &opts()).unwrap();
    assert!(cert.exists());
    assert_eq!(std::fs::read(&key).unwrap(), original_key);
    #[cfg(unix)]
    assert_eq!(mode(&key), 0o600);
    assert!(!outside.exists());
    assert!(!live.join("evil.sh").exists());
}

/// SCENARIO: a restore that cannot take the lock leaves the disk alone
#[test]
fn scenario_restore_during_another_operation_changes_nothing() {
    let engine = Engine::new();
    engine
        .deploy
        .add(DomainRequest::new("a.example.com", 3000).with_tls(true), &opts())
        .unwrap();
    let key = engine.path("letsencrypt/live/a.example.com/privkey.pem");

    let backups = BackupManager::new(&engine.deploy, engine.path("backups"));
    let info = backups.create().unwrap();
    std::fs::remove_file(&key).unwrap();
    let commits = engine.commits().len();
    let calls = engine.daemon.calls().len();

    let busy = DomainName::parse("z.example.com").unwrap();
    let _guard = engine.deploy.locks().try_domain(&busy).unwrap();
    let err = backups.restore(&info.path, &opts()).unwrap_err();
    assert!(matches!(err, EngineError::Conflict { .. }), "{:?}", err);

    assert!(!key.exists());
    assert_eq!(engine.commits().len(), commits);
    assert_eq!(engine.daemon.calls().len(), calls);
}

/// SCENARIO: certificate files from a failed restore are taken back out
#[test]
fn scenario_failed_restore_removes_certificate_files() {
    let engine = Engine::new();
    engine
        .deploy
        .add(DomainRequest::new("a.example.com", 3000).with_tls(true), &opts())
        .unwrap();
    let key = engine.path("letsencrypt/live/a.example.com/privkey.pem");

    let backups = BackupManager::new(&engine.deploy, engine.path("backups"));
    let info = backups.create().unwrap();
    std::fs::remove_file(&key).unwrap();

    engine.daemon.reject_next_validate("emerg: unexpected end of file");
    let err = backups.restore(&info.path, &opts()).unwrap_err();
    assert!(matches!(err, EngineError::Deployment { .. }), "{:?}", err);
    assert!(!key.exists());
}
