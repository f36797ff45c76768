//! Commit graph entities
//!
//! Commits are immutable and content-addressed: the id hashes every field,
//! including the parent id, so the graph cannot contain a cycle.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use crate::domain::value_objects::ContentHash;

/// Minimum length accepted for an abbreviated commit id
pub const MIN_SHORT_ID: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommitId(String);

impl CommitId {
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = raw.len() == 64
            && raw
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        valid.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What produced a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// A change that went live
    Applied,
    /// A change the daemon rejected; the tree was put back
    RolledBack,
    /// A manual checkpoint, checkout or restore
    Manual,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Applied => "applied",
            Outcome::RolledBack => "rolled-back",
            Outcome::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "applied" => Some(Outcome::Applied),
            "rolled-back" => Some(Outcome::RolledBack),
            "manual" => Some(Outcome::Manual),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: CommitId,
    pub parent: Option<CommitId>,
    pub snapshot: ContentHash,
    /// Blob holding the registry document at the time of the commit
    pub registry: Option<ContentHash>,
    pub message: String,
    pub author: String,
    pub outcome: Outcome,
    pub timestamp: DateTime<Utc>,
}

impl Commit {
    pub fn new(
        parent: Option<CommitId>,
        snapshot: ContentHash,
        registry: Option<ContentHash>,
        message: impl Into<String>,
        author: impl Into<String>,
        outcome: Outcome,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let message = message.into();
        let author = author.into();
        let id = compute_id(
            parent.as_ref(),
            &snapshot,
            registry.as_ref(),
            &message,
            &author,
            outcome,
            &timestamp,
        );
        Self {
            id,
            parent,
            snapshot,
            registry,
            message,
            author,
            outcome,
            timestamp,
        }
    }

    /// Recompute the id from the fields; a mismatch means the record was tampered with
    pub fn verify(&self) -> bool {
        compute_id(
            self.parent.as_ref(),
            &self.snapshot,
            self.registry.as_ref(),
            &self.message,
            &self.author,
            self.outcome,
            &self.timestamp,
        ) == self.id
    }

    /// First line of the message
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

fn compute_id(
    parent: Option<&CommitId>,
    snapshot: &ContentHash,
    registry: Option<&ContentHash>,
    message: &str,
    author: &str,
    outcome: Outcome,
    timestamp: &DateTime<Utc>,
) -> CommitId {
    let mut hasher = Sha256::new();
    hasher.update(b"parent ");
    hasher.update(parent.map(CommitId::as_str).unwrap_or("-"));
    hasher.update(b"\nsnapshot ");
    hasher.update(snapshot.hex());
    hasher.update(b"\nregistry ");
    hasher.update(registry.map(ContentHash::hex).unwrap_or("-"));
    hasher.update(b"\noutcome ");
    hasher.update(outcome.as_str());
    hasher.update(b"\nauthor ");
    hasher.update(author);
    hasher.update(b"\ntime ");
    hasher.update(timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true));
    hasher.update(b"\n\n");
    hasher.update(message);
    CommitId(format!("{:x}", hasher.finalize()))
}

/// A fixed name for one commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub commit: CommitId,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Branch heads, tags and the current branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refs {
    pub current: String,
    /// `None` marks a branch with no commits yet
    pub branches: BTreeMap<String, Option<CommitId>>,
    pub tags: BTreeMap<String, Tag>,
}

impl Refs {
    pub fn new(default_branch: &str) -> Self {
        let mut branches = BTreeMap::new();
        branches.insert(default_branch.to_string(), None);
        Self {
            current: default_branch.to_string(),
            branches,
            tags: BTreeMap::new(),
        }
    }

    /// Whether `name` is taken by a branch or a tag
    pub fn is_taken(&self, name: &str) -> bool {
        self.branches.contains_key(name) || self.tags.contains_key(name)
    }

    pub fn head(&self) -> Option<&CommitId> {
        self.branches.get(&self.current).and_then(|h| h.as_ref())
    }

    pub fn set_head(&mut self, id: CommitId) {
        self.branches.insert(self.current.clone(), Some(id));
    }
}

/// Branch names: 1-64 characters of `[A-Za-z0-9._/-]`, not starting with `-` or `.`
pub fn validate_branch_name(name: &str) -> Result<(), String> {
    validate_ref_name("branch", name)
}

/// Tag names follow the branch name rules
pub fn validate_tag_name(name: &str) -> Result<(), String> {
    validate_ref_name("tag", name)
}

fn validate_ref_name(kind: &str, name: &str) -> Result<(), String> {
    if name.is_empty() || name.len() > 64 {
        return Err(format!("{} name '{}' must be 1-64 characters", kind, name));
    }
    if name.starts_with('-') || name.starts_with('.') || name.contains("..") {
        return Err(format!("{} name '{}' is not allowed", kind, name));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/'))
    {
        return Err(format!(
            "{} name '{}' may only contain letters, digits, '.', '_', '-' and '/'",
            kind, name
        ));
    }
    Ok(())
}
