//! Tests for the version control use case

use std::sync::Arc;

use tempfile::{tempdir, TempDir};

use super::*;
use crate::domain::entities::{ConfigTree, Outcome, TreeEntry};
use crate::domain::ports::HistoryStore;
use crate::domain::services::ChangeKind;
use crate::error::EngineError;
use crate::infrastructure::FsHistoryStore;

fn vcs() -> (TempDir, VersionControl) {
    let dir = tempdir().unwrap();
    let store = Arc::new(FsHistoryStore::new(dir.path().join("history")));
    (dir, VersionControl::new(store, "main", "tester"))
}

fn tree(entries: &[(&str, &str)]) -> ConfigTree {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), TreeEntry::File(v.as_bytes().to_vec())))
        .collect()
}

#[test]
fn commits_chain_and_advance_branch() {
    let (_dir, vcs) = vcs();
    let a = vcs
        .record(&tree(&[("available/sk-a.conf", "a")]), None, "add a", Outcome::Applied)
        .unwrap();
    let b = vcs
        .record(&tree(&[("available/sk-a.conf", "a2")]), None, "edit a", Outcome::Applied)
        .unwrap();

    assert_eq!(a.parent, None);
    assert_eq!(b.parent, Some(a.id.clone()));
    assert_eq!(vcs.head().unwrap().unwrap().id, b.id);

    let log: Vec<_> = vcs.log(None).unwrap().map(|c| c.unwrap().id).collect();
    assert_eq!(log, vec![b.id, a.id]);
}

#[test]
fn log_is_restartable() {
    let (_dir, vcs) = vcs();
    for i in 0..3 {
        vcs.record(&tree(&[("available/sk-a.conf", &i.to_string())]), None, "x", Outcome::Applied)
            .unwrap();
    }
    let mut log = vcs.log(None).unwrap();
    log.next();
    let restart = log.clone();
    assert_eq!(log.count(), 2);
    assert_eq!(restart.count(), 2);
    assert_eq!(vcs.log(None).unwrap().count(), 3);
}

#[test]
fn identical_content_is_stored_once() {
    let (_dir, vcs) = vcs();
    let t = tree(&[("available/sk-a.conf", "same"), ("available/sk-b.conf", "same")]);
    let s1 = vcs.snapshot(&t).unwrap();
    let s2 = vcs.snapshot(&t).unwrap();
    assert_eq!(s1, s2);
    assert_eq!(vcs.store().blob_ids().unwrap().len(), 1);
}

#[test]
fn materialize_returns_the_snapshotted_tree() {
    let (_dir, vcs) = vcs();
    let mut t = tree(&[("available/sk-a.conf", "server {}")]);
    t.insert(
        "enabled/sk-a.conf".into(),
        TreeEntry::Link("/etc/nginx/sites-available/sk-a.conf".into()),
    );
    let id = vcs.snapshot(&t).unwrap();
    assert_eq!(vcs.materialize(&id).unwrap(), t);
}

#[test]
fn resolve_accepts_branch_full_id_and_prefix() {
    let (_dir, vcs) = vcs();
    let c = vcs
        .record(&tree(&[("available/sk-a.conf", "a")]), None, "add a", Outcome::Applied)
        .unwrap();

    assert_eq!(vcs.resolve("main").unwrap(), c.id);
    assert_eq!(vcs.resolve(HEAD).unwrap(), c.id);
    assert_eq!(vcs.resolve(c.id.as_str()).unwrap(), c.id);
    assert_eq!(vcs.resolve(&c.id.as_str()[..6]).unwrap(), c.id);

    assert!(matches!(
        vcs.resolve(&c.id.as_str()[..3]),
        Err(EngineError::Validation { .. })
    ));
    assert!(matches!(
        vcs.resolve("nosuchbranch"),
        Err(EngineError::NotFound { .. })
    ));
}

#[test]
fn resolve_walks_ancestors() {
    let (_dir, vcs) = vcs();
    let a = vcs
        .record(&tree(&[("available/sk-a.conf", "a")]), None, "one", Outcome::Applied)
        .unwrap();
    let b = vcs
        .record(&tree(&[("available/sk-a.conf", "b")]), None, "two", Outcome::Applied)
        .unwrap();
    vcs.record(&tree(&[("available/sk-a.conf", "c")]), None, "three", Outcome::Applied)
        .unwrap();

    assert_eq!(vcs.resolve("HEAD~").unwrap(), b.id);
    assert_eq!(vcs.resolve("HEAD~2").unwrap(), a.id);
    assert_eq!(vcs.resolve("main~1").unwrap(), b.id);
    assert_eq!(vcs.resolve(&format!("{}~1", &b.id.as_str()[..8])).unwrap(), a.id);

    assert!(matches!(vcs.resolve("HEAD~3"), Err(EngineError::NotFound { .. })));
    assert!(matches!(vcs.resolve("HEAD~x"), Err(EngineError::Validation { .. })));
}

#[test]
fn empty_branch_does_not_resolve() {
    let (_dir, vcs) = vcs();
    assert!(matches!(vcs.resolve("main"), Err(EngineError::NotFound { .. })));
    assert_eq!(vcs.log(None).unwrap().count(), 0);
}

#[test]
fn diff_lists_per_entry_changes() {
    let (_dir, vcs) = vcs();
    let a = vcs
        .record(
            &tree(&[("available/sk-a.conf", "a"), ("available/sk-b.conf", "b")]),
            None,
            "one",
            Outcome::Applied,
        )
        .unwrap();
    let b = vcs
        .record(
            &tree(&[("available/sk-a.conf", "a2"), ("available/sk-c.conf", "c")]),
            None,
            "two",
            Outcome::Applied,
        )
        .unwrap();

    let diff = vcs.diff(a.id.as_str(), b.id.as_str()).unwrap();
    let kinds: Vec<_> = diff.changes.iter().map(|c| (c.path.as_str(), c.kind)).collect();
    assert_eq!(
        kinds,
        vec![
            ("available/sk-a.conf", ChangeKind::Modified),
            ("available/sk-b.conf", ChangeKind::Removed),
            ("available/sk-c.conf", ChangeKind::Added),
        ]
    );
}

#[test]
fn branches_create_list_and_delete() {
    let (_dir, vcs) = vcs();
    let c = vcs
        .record(&tree(&[("available/sk-a.conf", "a")]), None, "add a", Outcome::Applied)
        .unwrap();

    let created = vcs.create_branch("staging", None).unwrap();
    assert_eq!(created.head, Some(c.id.clone()));
    assert!(vcs.create_branch("staging", None).is_err());
    assert!(vcs.create_branch("bad name", None).is_err());

    let names: Vec<_> = vcs.branches().unwrap().into_iter().map(|b| b.name).collect();
    assert_eq!(names, vec!["main", "staging"]);

    assert!(vcs.delete_branch("main").is_err());
    vcs.switch_branch("staging").unwrap();
    assert!(vcs.delete_branch("staging").is_err());
    vcs.switch_branch("main").unwrap();
    vcs.delete_branch("staging").unwrap();
    assert!(matches!(
        vcs.delete_branch("staging"),
        Err(EngineError::NotFound { .. })
    ));
}

#[test]
fn registry_blob_travels_with_commit() {
    let (_dir, vcs) = vcs();
    let c = vcs
        .record(&ConfigTree::new(), Some(b"{\"version\":1}"), "x", Outcome::Manual)
        .unwrap();
    assert_eq!(vcs.registry_at(&c).unwrap().unwrap(), b"{\"version\":1}");
}

#[test]
fn status_reports_drift() {
    let (_dir, vcs) = vcs();
    let t = tree(&[("available/sk-a.conf", "a")]);
    vcs.record(&t, None, "x", Outcome::Applied).unwrap();
    assert!(vcs.status(&t).unwrap().is_clean());

    let edited = tree(&[("available/sk-a.conf", "hand edit")]);
    let status = vcs.status(&edited).unwrap();
    assert!(!status.is_clean());
    assert_eq!(status.branch, "main");
}

#[test]
fn prune_drops_only_unreachable_history() {
    let (_dir, vcs) = vcs();
    let base = vcs
        .record(&tree(&[("available/sk-a.conf", "a")]), None, "base", Outcome::Applied)
        .unwrap();
    vcs.create_branch("experiment", None).unwrap();
    vcs.switch_branch("experiment").unwrap();
    let dead = vcs
        .record(&tree(&[("available/sk-a.conf", "experiment")]), None, "try", Outcome::Applied)
        .unwrap();
    vcs.switch_branch("main").unwrap();

    // still reachable from the experiment branch
    assert_eq!(vcs.prune().unwrap(), PruneReport::default());

    vcs.delete_branch("experiment").unwrap();
    let report = vcs.prune().unwrap();
    assert_eq!(report.commits, 1);
    assert_eq!(report.snapshots, 1);
    assert_eq!(report.blobs, 1);

    assert!(vcs.get_commit(&base.id).is_ok());
    assert!(matches!(
        vcs.get_commit(&dead.id),
        Err(EngineError::NotFound { .. })
    ));
    assert_eq!(vcs.materialize(&base.snapshot).unwrap().len(), 1);
}

#[test]
fn tags_resolve_and_refuse_duplicates() {
    let (_dir, vcs) = vcs();
    assert!(matches!(
        vcs.create_tag("v1", None, "nothing yet"),
        Err(EngineError::NotFound { .. })
    ));

    let a = vcs
        .record(&tree(&[("available/sk-a.conf", "a")]), None, "add a", Outcome::Applied)
        .unwrap();
    let b = vcs
        .record(&tree(&[("available/sk-a.conf", "a2")]), None, "edit a", Outcome::Applied)
        .unwrap();

    let tag = vcs.create_tag("v1", Some("HEAD~1"), "first release").unwrap();
    assert_eq!(tag.commit, a.id);
    assert_eq!(vcs.resolve("v1").unwrap(), a.id);
    assert_eq!(vcs.create_tag("latest", None, "").unwrap().commit, b.id);
    assert_eq!(vcs.resolve("latest~1").unwrap(), a.id);

    let names: Vec<_> = vcs.tags().unwrap().into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["latest", "v1"]);

    for taken in ["v1", "main"] {
        assert!(matches!(
            vcs.create_tag(taken, None, ""),
            Err(EngineError::Validation { .. })
        ));
    }
    assert!(matches!(
        vcs.create_branch("v1", None),
        Err(EngineError::Validation { .. })
    ));
    assert!(matches!(
        vcs.create_tag("bad name", None, ""),
        Err(EngineError::Validation { .. })
    ));

    assert_eq!(vcs.delete_tag("v1").unwrap().commit, a.id);
    assert!(matches!(vcs.delete_tag("v1"), Err(EngineError::NotFound { .. })));
    assert!(matches!(vcs.resolve("v1"), Err(EngineError::NotFound { .. })));
}

#[test]
fn prune_keeps_tagged_commits() {
    let (_dir, vcs) = vcs();
    vcs.record(&tree(&[("available/sk-a.conf", "a")]), None, "base", Outcome::Applied)
        .unwrap();
    vcs.create_branch("experiment", None).unwrap();
    vcs.switch_branch("experiment").unwrap();
    let kept = vcs
        .record(&tree(&[("available/sk-a.conf", "experiment")]), None, "try", Outcome::Applied)
        .unwrap();
    vcs.switch_branch("main").unwrap();
    vcs.create_tag("tried", Some("experiment"), "").unwrap();
    vcs.delete_branch("experiment").unwrap();

    assert_eq!(vcs.prune().unwrap(), PruneReport::default());
    assert_eq!(vcs.get_commit(&kept.id).unwrap().id, kept.id);

    vcs.delete_tag("tried").unwrap();
    assert_eq!(vcs.prune().unwrap().commits, 1);
}

#[test]
fn stats_count_commits_refs_and_bytes() {
    let (_dir, vcs) = vcs();
    assert_eq!(vcs.stats().unwrap().commits, 0);

    vcs.record(&tree(&[("available/sk-a.conf", "a")]), None, "add a", Outcome::Applied)
        .unwrap();
    vcs.record(&tree(&[("available/sk-a.conf", "a")]), None, "failed", Outcome::RolledBack)
        .unwrap();
    vcs.record(&tree(&[("available/sk-a.conf", "a")]), None, "checkpoint", Outcome::Manual)
        .unwrap();
    vcs.create_tag("v1", None, "").unwrap();

    let stats = vcs.stats().unwrap();
    assert_eq!(stats.commits, 3);
    assert_eq!(stats.branches, 1);
    assert_eq!(stats.tags, 1);
    assert_eq!(stats.authors.get("tester"), Some(&3));
    assert_eq!(stats.outcomes.get(Outcome::RolledBack.as_str()), Some(&1));
    assert_eq!(stats.outcomes.values().sum::<usize>(), 3);
    assert!(stats.size_bytes > 0);
}
