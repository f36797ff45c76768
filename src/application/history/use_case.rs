//! Version Control Use Case
//!
//! Snapshots, commits, branches and tags on top of a [`HistoryStore`]. The store
//! is append-only apart from [`VersionControl::prune`]; every ref update
//! happens behind one writer lock so two commits can never claim the same
//! parent.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use super::log::CommitLog;
use crate::domain::entities::{
    validate_branch_name, validate_tag_name, Commit, CommitId, ConfigTree, Outcome, Refs, Snapshot,
    SnapshotEntry, Tag, TreeEntry, MIN_SHORT_ID,
};
use crate::domain::ports::HistoryStore;
use crate::domain::services::{Differ, TreeDiff};
use crate::domain::value_objects::ContentHash;
use crate::error::{EngineError, EngineResult};

/// Name that always means the current branch head
pub const HEAD: &str = "HEAD";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchInfo {
    pub name: String,
    pub head: Option<CommitId>,
    pub current: bool,
}

/// Where the live tree stands relative to the current head
#[derive(Debug, Clone)]
pub struct HistoryStatus {
    pub branch: String,
    pub head: Option<Commit>,
    /// Changes from the head snapshot to the live tree
    pub drift: TreeDiff,
}

impl HistoryStatus {
    pub fn is_clean(&self) -> bool {
        self.drift.is_empty()
    }
}

/// Counts over everything in the store, reachable or not
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryStats {
    pub commits: usize,
    pub branches: usize,
    pub tags: usize,
    /// Commits per outcome name
    pub outcomes: BTreeMap<&'static str, usize>,
    /// Commits per author
    pub authors: BTreeMap<String, usize>,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub commits: usize,
    pub snapshots: usize,
    pub blobs: usize,
}

pub struct VersionControl {
    store: Arc<dyn HistoryStore>,
    default_branch: String,
    author: String,
    writer: Mutex<()>,
}

impl VersionControl {
    pub fn new(
        store: Arc<dyn HistoryStore>,
        default_branch: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            store,
            default_branch: default_branch.into(),
            author: author.into(),
            writer: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &dyn HistoryStore {
        self.store.as_ref()
    }

    pub fn default_branch(&self) -> &str {
        &self.default_branch
    }

    fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn refs(&self) -> EngineResult<Refs> {
        Ok(self
            .store
            .load_refs()?
            .unwrap_or_else(|| Refs::new(&self.default_branch)))
    }

    pub fn current_branch(&self) -> EngineResult<String> {
        Ok(self.refs()?.current)
    }

    pub fn head(&self) -> EngineResult<Option<Commit>> {
        match self.refs()?.head() {
            Some(id) => Ok(Some(self.store.get_commit(id)?)),
            None => Ok(None),
        }
    }

    /// Store every blob of `tree` and its manifest; returns the snapshot id
    pub fn snapshot(&self, tree: &ConfigTree) -> EngineResult<ContentHash> {
        let (snapshot, blobs) = Snapshot::from_tree(tree);
        for (hash, bytes) in blobs {
            if !self.store.has_blob(&hash) {
                self.store.put_blob(bytes)?;
            }
        }
        Ok(self.store.put_snapshot(&snapshot)?)
    }

    /// Append a commit on the current branch and advance it
    pub fn commit(
        &self,
        snapshot: ContentHash,
        registry: Option<&[u8]>,
        message: &str,
        outcome: Outcome,
    ) -> EngineResult<Commit> {
        let _guard = self.write_lock();
        let mut refs = self.refs()?;

        let registry = registry.map(|b| self.store.put_blob(b)).transpose()?;
        let commit = Commit::new(
            refs.head().cloned(),
            snapshot,
            registry,
            message,
            self.author.clone(),
            outcome,
            Utc::now(),
        );
        self.store.put_commit(&commit)?;
        refs.set_head(commit.id.clone());
        self.store.save_refs(&refs)?;
        Ok(commit)
    }

    /// Snapshot `tree` and commit it in one step
    pub fn record(
        &self,
        tree: &ConfigTree,
        registry: Option<&[u8]>,
        message: &str,
        outcome: Outcome,
    ) -> EngineResult<Commit> {
        let snapshot = self.snapshot(tree)?;
        self.commit(snapshot, registry, message, outcome)
    }

    /// Resolve `HEAD`, a branch or tag name, a full commit id or a unique id
    /// prefix, optionally followed by `~N` to walk N parents back
    pub fn resolve(&self, reference: &str) -> EngineResult<CommitId> {
        let reference = reference.trim();
        let Some((base, steps)) = reference.split_once('~') else {
            return self.resolve_base(reference);
        };
        let steps: usize = if steps.is_empty() {
            1
        } else {
            steps.parse().map_err(|_| {
                EngineError::validation(format!("'{}' is not a valid reference", reference))
            })?
        };

        let mut id = self.resolve_base(base)?;
        for _ in 0..steps {
            id = self.get_commit(&id)?.parent.ok_or_else(|| {
                EngineError::not_found("commit", format!("{} (history is shorter)", reference))
            })?;
        }
        Ok(id)
    }

    fn resolve_base(&self, reference: &str) -> EngineResult<CommitId> {
        let refs = self.refs()?;

        if reference == HEAD {
            return refs.head().cloned().ok_or_else(|| {
                EngineError::not_found("commit", format!("{} (branch '{}' is empty)", HEAD, refs.current))
            });
        }

        if let Some(head) = refs.branches.get(reference) {
            return head.clone().ok_or_else(|| {
                EngineError::not_found("commit", format!("branch '{}' has no commits", reference))
            });
        }

        if let Some(tag) = refs.tags.get(reference) {
            return Ok(tag.commit.clone());
        }

        let lowered = reference.to_ascii_lowercase();
        if let Some(id) = CommitId::parse(&lowered) {
            self.store.get_commit(&id)?;
            return Ok(id);
        }

        let is_hex = lowered.chars().all(|c| c.is_ascii_hexdigit());
        if !is_hex || lowered.is_empty() {
            return Err(EngineError::not_found("branch or commit", reference));
        }
        if lowered.len() < MIN_SHORT_ID {
            return Err(EngineError::validation(format!(
                "commit prefix '{}' is too short; use at least {} characters",
                reference, MIN_SHORT_ID
            )));
        }

        let mut matches = self
            .store
            .commit_ids()?
            .into_iter()
            .filter(|id| id.as_str().starts_with(&lowered));
        match (matches.next(), matches.next()) {
            (Some(id), None) => Ok(id),
            (Some(_), Some(_)) => Err(EngineError::validation(format!(
                "commit prefix '{}' is ambiguous",
                reference
            ))),
            (None, _) => Err(EngineError::not_found("commit", reference)),
        }
    }

    pub fn get_commit(&self, id: &CommitId) -> EngineResult<Commit> {
        Ok(self.store.get_commit(id)?)
    }

    /// Commits reachable from `reference` (default: current head), newest first
    pub fn log(&self, reference: Option<&str>) -> EngineResult<CommitLog<'_>> {
        let start = match reference {
            Some(r) => Some(self.resolve(r)?),
            None => self.refs()?.head().cloned(),
        };
        Ok(CommitLog::new(self.store.as_ref(), start))
    }

    pub fn get_snapshot(&self, id: &ContentHash) -> EngineResult<Snapshot> {
        Ok(self.store.get_snapshot(id)?)
    }

    /// Load the full tree of a snapshot
    pub fn materialize(&self, snapshot: &ContentHash) -> EngineResult<ConfigTree> {
        let manifest = self.store.get_snapshot(snapshot)?;
        let mut tree = ConfigTree::new();
        for (key, entry) in manifest.entries {
            let bytes = self.store.get_blob(&entry.hash)?;
            tree.insert(key, TreeEntry::from_blob(entry.kind, bytes));
        }
        Ok(tree)
    }

    /// Registry document recorded with `commit`, if any
    pub fn registry_at(&self, commit: &Commit) -> EngineResult<Option<Vec<u8>>> {
        match &commit.registry {
            Some(hash) => Ok(Some(self.store.get_blob(hash)?)),
            None => Ok(None),
        }
    }

    /// Text of one snapshot entry (file contents, or a link's target)
    pub fn entry_text(&self, entry: &SnapshotEntry) -> EngineResult<String> {
        let bytes = self.store.get_blob(&entry.hash)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Per-entry changes from `from` to `to`
    pub fn diff(&self, from: &str, to: &str) -> EngineResult<TreeDiff> {
        let a = self.get_commit(&self.resolve(from)?)?;
        let b = self.get_commit(&self.resolve(to)?)?;
        self.diff_commits(Some(&a), &b)
    }

    /// Changes introduced by `commit` relative to `parent` (empty tree if none)
    pub fn diff_commits(&self, parent: Option<&Commit>, commit: &Commit) -> EngineResult<TreeDiff> {
        let old = match parent {
            Some(p) => self.store.get_snapshot(&p.snapshot)?,
            None => Snapshot::default(),
        };
        let new = self.store.get_snapshot(&commit.snapshot)?;
        Ok(Differ::new().diff_snapshots(&old, &new))
    }

    /// Compare the live tree against the current head snapshot
    pub fn status(&self, live: &ConfigTree) -> EngineResult<HistoryStatus> {
        let refs = self.refs()?;
        let head = match refs.head() {
            Some(id) => Some(self.store.get_commit(id)?),
            None => None,
        };
        let base = match &head {
            Some(c) => self.store.get_snapshot(&c.snapshot)?,
            None => Snapshot::default(),
        };
        let (live_snapshot, _) = Snapshot::from_tree(live);
        Ok(HistoryStatus {
            branch: refs.current,
            head,
            drift: Differ::new().diff_snapshots(&base, &live_snapshot),
        })
    }

    pub fn branches(&self) -> EngineResult<Vec<BranchInfo>> {
        let refs = self.refs()?;
        Ok(refs
            .branches
            .iter()
            .map(|(name, head)| BranchInfo {
                name: name.clone(),
                head: head.clone(),
                current: *name == refs.current,
            })
            .collect())
    }

    /// Create `name` at `from` (default: current head)
    pub fn create_branch(&self, name: &str, from: Option<&str>) -> EngineResult<BranchInfo> {
        validate_branch_name(name).map_err(EngineError::validation)?;
        if name == HEAD {
            return Err(EngineError::validation("'HEAD' is reserved"));
        }
        let start = match from {
            Some(r) => Some(self.resolve(r)?),
            None => None,
        };

        let _guard = self.write_lock();
        let mut refs = self.refs()?;
        if refs.branches.contains_key(name) {
            return Err(EngineError::validation(format!(
                "branch '{}' already exists",
                name
            )));
        }
        if refs.tags.contains_key(name) {
            return Err(EngineError::validation(format!(
                "'{}' is already a tag",
                name
            )));
        }
        let head = match start {
            Some(id) => Some(id),
            None => refs.head().cloned(),
        };
        refs.branches.insert(name.to_string(), head.clone());
        self.store.save_refs(&refs)?;
        Ok(BranchInfo {
            name: name.to_string(),
            head,
            current: false,
        })
    }

    pub fn delete_branch(&self, name: &str) -> EngineResult<()> {
        let _guard = self.write_lock();
        let mut refs = self.refs()?;
        if !refs.branches.contains_key(name) {
            return Err(EngineError::not_found("branch", name));
        }
        if name == refs.current {
            return Err(EngineError::validation(format!(
                "cannot delete the current branch '{}'",
                name
            )));
        }
        if name == self.default_branch {
            return Err(EngineError::validation(format!(
                "cannot delete the default branch '{}'",
                name
            )));
        }
        refs.branches.remove(name);
        self.store.save_refs(&refs)?;
        Ok(())
    }

    /// Make `name` the current branch; the tree is not touched
    pub fn switch_branch(&self, name: &str) -> EngineResult<()> {
        let _guard = self.write_lock();
        let mut refs = self.refs()?;
        if !refs.branches.contains_key(name) {
            return Err(EngineError::not_found("branch", name));
        }
        refs.current = name.to_string();
        self.store.save_refs(&refs)?;
        Ok(())
    }

    /// Tags sorted by name
    pub fn tags(&self) -> EngineResult<Vec<Tag>> {
        Ok(self.refs()?.tags.into_values().collect())
    }

    /// Name the commit `reference` points at (default: HEAD)
    pub fn create_tag(
        &self,
        name: &str,
        reference: Option<&str>,
        message: &str,
    ) -> EngineResult<Tag> {
        validate_tag_name(name).map_err(EngineError::validation)?;
        if name == HEAD {
            return Err(EngineError::validation("'HEAD' is reserved"));
        }
        let commit = self.resolve(reference.unwrap_or(HEAD))?;

        let _guard = self.write_lock();
        let mut refs = self.refs()?;
        if refs.is_taken(name) {
            return Err(EngineError::validation(format!(
                "'{}' is already a branch or tag",
                name
            )));
        }
        let tag = Tag {
            name: name.to_string(),
            commit,
            message: message.to_string(),
            created_at: Utc::now(),
        };
        refs.tags.insert(name.to_string(), tag.clone());
        self.store.save_refs(&refs)?;
        Ok(tag)
    }

    pub fn delete_tag(&self, name: &str) -> EngineResult<Tag> {
        let _guard = self.write_lock();
        let mut refs = self.refs()?;
        let tag = refs
            .tags
            .remove(name)
            .ok_or_else(|| EngineError::not_found("tag", name))?;
        self.store.save_refs(&refs)?;
        Ok(tag)
    }

    /// Commit counts by outcome and author, ref counts and store size
    pub fn stats(&self) -> EngineResult<HistoryStats> {
        let refs = self.refs()?;
        let mut stats = HistoryStats {
            branches: refs.branches.len(),
            tags: refs.tags.len(),
            size_bytes: self.store.size_bytes()?,
            ..HistoryStats::default()
        };
        for id in self.store.commit_ids()? {
            let commit = self.store.get_commit(&id)?;
            stats.commits += 1;
            *stats.outcomes.entry(commit.outcome.as_str()).or_default() += 1;
            *stats.authors.entry(commit.author).or_default() += 1;
        }
        Ok(stats)
    }

    pub fn is_branch(&self, name: &str) -> EngineResult<bool> {
        Ok(self.refs()?.branches.contains_key(name))
    }

    /// Drop commits no branch or tag reaches, then snapshots and blobs nothing references
    pub fn prune(&self) -> EngineResult<PruneReport> {
        let _guard = self.write_lock();
        let refs = self.refs()?;

        let mut reachable: HashSet<CommitId> = HashSet::new();
        let mut snapshots: BTreeSet<ContentHash> = BTreeSet::new();
        let mut blobs: BTreeSet<ContentHash> = BTreeSet::new();

        let tagged = refs.tags.values().map(|t| &t.commit);
        for head in refs.branches.values().flatten().chain(tagged) {
            for commit in CommitLog::new(self.store.as_ref(), Some(head.clone())) {
                let commit = commit?;
                if !reachable.insert(commit.id.clone()) {
                    break;
                }
                snapshots.insert(commit.snapshot.clone());
                if let Some(registry) = &commit.registry {
                    blobs.insert(registry.clone());
                }
            }
        }
        for id in &snapshots {
            for entry in self.store.get_snapshot(id)?.entries.values() {
                blobs.insert(entry.hash.clone());
            }
        }

        let mut report = PruneReport::default();
        for id in self.store.commit_ids()? {
            if !reachable.contains(&id) {
                self.store.remove_commit(&id)?;
                report.commits += 1;
            }
        }
        for id in self.store.snapshot_ids()? {
            if !snapshots.contains(&id) {
                self.store.remove_snapshot(&id)?;
                report.snapshots += 1;
            }
        }
        for id in self.store.blob_ids()? {
            if !blobs.contains(&id) {
                self.store.remove_blob(&id)?;
                report.blobs += 1;
            }
        }
        Ok(report)
    }
}
