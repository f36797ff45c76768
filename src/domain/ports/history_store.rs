//! HistoryStore port
//!
//! Append-only storage for blobs, snapshot manifests and commits, plus the
//! mutable branch and tag refs. Blob and snapshot writes are idempotent.

use crate::domain::entities::{Commit, CommitId, Refs, Snapshot};
use crate::domain::value_objects::ContentHash;

pub trait HistoryStore: Send + Sync {
    /// Store bytes under their hash; storing existing content is a no-op
    fn put_blob(&self, bytes: &[u8]) -> Result<ContentHash, HistoryError>;
    fn get_blob(&self, hash: &ContentHash) -> Result<Vec<u8>, HistoryError>;
    fn has_blob(&self, hash: &ContentHash) -> bool;
    fn blob_ids(&self) -> Result<Vec<ContentHash>, HistoryError>;
    fn remove_blob(&self, hash: &ContentHash) -> Result<(), HistoryError>;

    /// Store a manifest under [`Snapshot::id`]
    fn put_snapshot(&self, snapshot: &Snapshot) -> Result<ContentHash, HistoryError>;
    fn get_snapshot(&self, id: &ContentHash) -> Result<Snapshot, HistoryError>;
    fn snapshot_ids(&self) -> Result<Vec<ContentHash>, HistoryError>;
    fn remove_snapshot(&self, id: &ContentHash) -> Result<(), HistoryError>;

    fn put_commit(&self, commit: &Commit) -> Result<(), HistoryError>;
    fn get_commit(&self, id: &CommitId) -> Result<Commit, HistoryError>;
    fn commit_ids(&self) -> Result<Vec<CommitId>, HistoryError>;
    fn remove_commit(&self, id: &CommitId) -> Result<(), HistoryError>;

    /// Load refs, or `None` before the first write
    fn load_refs(&self) -> Result<Option<Refs>, HistoryError>;
    fn save_refs(&self, refs: &Refs) -> Result<(), HistoryError>;

    /// Bytes the store occupies
    fn size_bytes(&self) -> Result<u64, HistoryError>;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("{kind} {id} is not in the history store")]
    Missing { kind: &'static str, id: String },

    #[error("history store {what} is corrupted: {message}")]
    Corrupted { what: String, message: String },

    #[error("failed to access history store: {message}")]
    AccessError { message: String },
}

impl From<HistoryError> for crate::error::EngineError {
    fn from(err: HistoryError) -> Self {
        match err {
            HistoryError::Missing { kind, id } => crate::error::EngineError::not_found(kind, id),
            other => crate::error::EngineError::storage(other.to_string()),
        }
    }
}
