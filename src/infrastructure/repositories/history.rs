//! File-backed History Store
//!
//! Layout under the history directory:
//!
//! ```text
//! objects/ab/cdef...      blob bytes, keyed by sha256
//! snapshots/<hex>.json    snapshot manifests
//! commits/<hex>.json      commit records
//! refs.json               branches, tags and the current branch
//! ```
//!
//! Every write is atomic. Blobs and snapshots are content-addressed, so
//! writing one that already exists is skipped.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::{
    Commit, CommitId, EntryKind, Outcome, Refs, Snapshot, SnapshotEntry, Tag,
};
use crate::domain::ports::{HistoryError, HistoryStore};
use crate::domain::value_objects::ContentHash;
use crate::infrastructure::fs::atomic_write;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotDoc {
    entries: BTreeMap<String, SnapshotEntryDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntryDoc {
    hash: String,
    kind: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct CommitDoc {
    id: String,
    #[serde(default)]
    parent: Option<String>,
    snapshot: String,
    #[serde(default)]
    registry: Option<String>,
    message: String,
    author: String,
    outcome: String,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RefsDoc {
    current: String,
    branches: BTreeMap<String, Option<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    tags: BTreeMap<String, TagDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TagDoc {
    commit: String,
    #[serde(default)]
    message: String,
    created_at: DateTime<Utc>,
}

pub struct FsHistoryStore {
    root: PathBuf,
}

impl FsHistoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, hash: &ContentHash) -> PathBuf {
        let hex = hash.hex();
        self.root.join("objects").join(&hex[..2]).join(&hex[2..])
    }

    fn snapshot_path(&self, id: &ContentHash) -> PathBuf {
        self.root.join("snapshots").join(format!("{}.json", id.hex()))
    }

    fn commit_path(&self, id: &CommitId) -> PathBuf {
        self.root.join("commits").join(format!("{}.json", id.as_str()))
    }

    fn refs_path(&self) -> PathBuf {
        self.root.join("refs.json")
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), HistoryError> {
        atomic_write(path, bytes).map_err(|e| HistoryError::AccessError {
            message: e.to_string(),
        })
    }

    fn read(&self, path: &Path, kind: &'static str, id: &str) -> Result<Vec<u8>, HistoryError> {
        match fs::read(path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(HistoryError::Missing {
                kind,
                id: id.to_string(),
            }),
            Err(e) => Err(HistoryError::AccessError {
                message: format!("{}: {}", path.display(), e),
            }),
        }
    }

    fn remove(&self, path: &Path) -> Result<(), HistoryError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HistoryError::AccessError {
                message: format!("{}: {}", path.display(), e),
            }),
        }
    }

    /// File stems of `<dir>/*.json`
    fn json_stems(&self, dir: &str) -> Result<Vec<String>, HistoryError> {
        let dir = self.root.join(dir);
        let mut stems = Vec::new();
        for name in list_dir(&dir)? {
            if let Some(stem) = name.strip_suffix(".json") {
                stems.push(stem.to_string());
            }
        }
        Ok(stems)
    }
}

fn list_dir(dir: &Path) -> Result<Vec<String>, HistoryError> {
    let read_dir = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(HistoryError::AccessError {
                message: format!("{}: {}", dir.display(), e),
            })
        }
    };
    let mut names = Vec::new();
    for item in read_dir {
        let item = item.map_err(|e| HistoryError::AccessError {
            message: e.to_string(),
        })?;
        if let Some(name) = item.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

fn corrupted(what: impl Into<String>, message: impl Into<String>) -> HistoryError {
    HistoryError::Corrupted {
        what: what.into(),
        message: message.into(),
    }
}

fn parse_hash(what: &str, raw: &str) -> Result<ContentHash, HistoryError> {
    ContentHash::parse(raw).ok_or_else(|| corrupted(what, format!("bad hash '{}'", raw)))
}

fn parse_commit_id(what: &str, raw: &str) -> Result<CommitId, HistoryError> {
    CommitId::parse(raw).ok_or_else(|| corrupted(what, format!("bad commit id '{}'", raw)))
}

impl HistoryStore for FsHistoryStore {
    fn put_blob(&self, bytes: &[u8]) -> Result<ContentHash, HistoryError> {
        let hash = ContentHash::from_bytes(bytes);
        let path = self.blob_path(&hash);
        if !path.exists() {
            self.write(&path, bytes)?;
        }
        Ok(hash)
    }

    fn get_blob(&self, hash: &ContentHash) -> Result<Vec<u8>, HistoryError> {
        let bytes = self.read(&self.blob_path(hash), "blob", hash.short())?;
        if ContentHash::from_bytes(&bytes) != *hash {
            return Err(corrupted(
                format!("blob {}", hash.short()),
                "content does not match its hash",
            ));
        }
        Ok(bytes)
    }

    fn has_blob(&self, hash: &ContentHash) -> bool {
        self.blob_path(hash).exists()
    }

    fn blob_ids(&self) -> Result<Vec<ContentHash>, HistoryError> {
        let objects = self.root.join("objects");
        let mut ids = Vec::new();
        for prefix in list_dir(&objects)? {
            for rest in list_dir(&objects.join(&prefix))? {
                // temp files from an interrupted write never parse
                if let Some(hash) = ContentHash::parse(&format!("{}{}", prefix, rest)) {
                    ids.push(hash);
                }
            }
        }
        Ok(ids)
    }

    fn remove_blob(&self, hash: &ContentHash) -> Result<(), HistoryError> {
        self.remove(&self.blob_path(hash))
    }

    fn put_snapshot(&self, snapshot: &Snapshot) -> Result<ContentHash, HistoryError> {
        let id = snapshot.id();
        let path = self.snapshot_path(&id);
        if path.exists() {
            return Ok(id);
        }
        let doc = SnapshotDoc {
            entries: snapshot
                .entries
                .iter()
                .map(|(key, entry)| {
                    (
                        key.clone(),
                        SnapshotEntryDoc {
                            hash: entry.hash.as_str().to_string(),
                            kind: entry.kind.as_str().to_string(),
                        },
                    )
                })
                .collect(),
        };
        let bytes = serde_json::to_vec_pretty(&doc).map_err(|e| HistoryError::AccessError {
            message: e.to_string(),
        })?;
        self.write(&path, &bytes)?;
        Ok(id)
    }

    fn get_snapshot(&self, id: &ContentHash) -> Result<Snapshot, HistoryError> {
        let what = format!("snapshot {}", id.short());
        let bytes = self.read(&self.snapshot_path(id), "snapshot", id.short())?;
        let doc: SnapshotDoc =
            serde_json::from_slice(&bytes).map_err(|e| corrupted(&what, e.to_string()))?;

        let mut entries = BTreeMap::new();
        for (key, entry) in doc.entries {
            let kind = EntryKind::parse(&entry.kind)
                .ok_or_else(|| corrupted(&what, format!("unknown entry kind '{}'", entry.kind)))?;
            let hash = parse_hash(&what, &entry.hash)?;
            entries.insert(key, SnapshotEntry { hash, kind });
        }
        let snapshot = Snapshot::new(entries);
        if snapshot.id() != *id {
            return Err(corrupted(what, "manifest does not match its id"));
        }
        Ok(snapshot)
    }

    fn snapshot_ids(&self) -> Result<Vec<ContentHash>, HistoryError> {
        Ok(self
            .json_stems("snapshots")?
            .iter()
            .filter_map(|stem| ContentHash::parse(stem))
            .collect())
    }

    fn remove_snapshot(&self, id: &ContentHash) -> Result<(), HistoryError> {
        self.remove(&self.snapshot_path(id))
    }

    fn put_commit(&self, commit: &Commit) -> Result<(), HistoryError> {
        let doc = CommitDoc {
            id: commit.id.to_string(),
            parent: commit.parent.as_ref().map(CommitId::to_string),
            snapshot: commit.snapshot.as_str().to_string(),
            registry: commit.registry.as_ref().map(|h| h.as_str().to_string()),
            message: commit.message.clone(),
            author: commit.author.clone(),
            outcome: commit.outcome.as_str().to_string(),
            timestamp: commit.timestamp,
        };
        let bytes = serde_json::to_vec_pretty(&doc).map_err(|e| HistoryError::AccessError {
            message: e.to_string(),
        })?;
        self.write(&self.commit_path(&commit.id), &bytes)
    }

    fn get_commit(&self, id: &CommitId) -> Result<Commit, HistoryError> {
        let what = format!("commit {}", id.short());
        let bytes = self.read(&self.commit_path(id), "commit", id.short())?;
        let doc: CommitDoc =
            serde_json::from_slice(&bytes).map_err(|e| corrupted(&what, e.to_string()))?;

        let commit = Commit {
            id: parse_commit_id(&what, &doc.id)?,
            parent: doc
                .parent
                .as_deref()
                .map(|p| parse_commit_id(&what, p))
                .transpose()?,
            snapshot: parse_hash(&what, &doc.snapshot)?,
            registry: doc
                .registry
                .as_deref()
                .map(|r| parse_hash(&what, r))
                .transpose()?,
            message: doc.message,
            author: doc.author,
            outcome: Outcome::parse(&doc.outcome)
                .ok_or_else(|| corrupted(&what, format!("unknown outcome '{}'", doc.outcome)))?,
            timestamp: doc.timestamp,
        };
        if commit.id != *id || !commit.verify() {
            return Err(corrupted(what, "record does not match its id"));
        }
        Ok(commit)
    }

    fn commit_ids(&self) -> Result<Vec<CommitId>, HistoryError> {
        Ok(self
            .json_stems("commits")?
            .iter()
            .filter_map(|stem| CommitId::parse(stem))
            .collect())
    }

    fn remove_commit(&self, id: &CommitId) -> Result<(), HistoryError> {
        self.remove(&self.commit_path(id))
    }

    fn load_refs(&self) -> Result<Option<Refs>, HistoryError> {
        let path = self.refs_path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(HistoryError::AccessError {
                    message: format!("{}: {}", path.display(), e),
                })
            }
        };
        let doc: RefsDoc =
            serde_json::from_slice(&bytes).map_err(|e| corrupted("refs", e.to_string()))?;

        let mut branches = BTreeMap::new();
        for (name, head) in doc.branches {
            let head = head
                .as_deref()
                .map(|h| parse_commit_id("refs", h))
                .transpose()?;
            branches.insert(name, head);
        }
        if !branches.contains_key(&doc.current) {
            return Err(corrupted(
                "refs",
                format!("current branch '{}' does not exist", doc.current),
            ));
        }
        let mut tags = BTreeMap::new();
        for (name, tag) in doc.tags {
            let commit = parse_commit_id("refs", &tag.commit)?;
            tags.insert(
                name.clone(),
                Tag {
                    name,
                    commit,
                    message: tag.message,
                    created_at: tag.created_at,
                },
            );
        }
        Ok(Some(Refs {
            current: doc.current,
            branches,
            tags,
        }))
    }

    fn save_refs(&self, refs: &Refs) -> Result<(), HistoryError> {
        let doc = RefsDoc {
            current: refs.current.clone(),
            branches: refs
                .branches
                .iter()
                .map(|(name, head)| (name.clone(), head.as_ref().map(CommitId::to_string)))
                .collect(),
            tags: refs
                .tags
                .iter()
                .map(|(name, tag)| {
                    (
                        name.clone(),
                        TagDoc {
                            commit: tag.commit.to_string(),
                            message: tag.message.clone(),
                            created_at: tag.created_at,
                        },
                    )
                })
                .collect(),
        };
        let bytes = serde_json::to_vec_pretty(&doc).map_err(|e| HistoryError::AccessError {
            message: e.to_string(),
        })?;
        self.write(&self.refs_path(), &bytes)
    }

    fn size_bytes(&self) -> Result<u64, HistoryError> {
        dir_size(&self.root)
    }
}

fn dir_size(dir: &Path) -> Result<u64, HistoryError> {
    let read_dir = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => {
            return Err(HistoryError::AccessError {
                message: format!("{}: {}", dir.display(), e),
            })
        }
    };
    let mut total = 0;
    for item in read_dir {
        let item = item.map_err(|e| HistoryError::AccessError {
            message: format!("{}: {}", dir.display(), e),
        })?;
        let meta = item.metadata().map_err(|e| HistoryError::AccessError {
            message: format!("{}: {}", item.path().display(), e),
        })?;
        if meta.is_dir() {
            total += dir_size(&item.path())?;
        } else {
            total += meta.len();
        }
    }
    Ok(total)
}
