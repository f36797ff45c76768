//! RegistryStore port
//!
//! Persists the registry document. The same serialized bytes are stored as
//! a blob next to every commit, so `export`/`import` must be deterministic.

use std::path::PathBuf;

use crate::domain::entities::Registry;

pub trait RegistryStore: Send + Sync {
    /// Load the persisted registry; a missing document is an empty registry
    fn load(&self) -> Result<Registry, RegistryError>;

    /// Replace the persisted registry atomically
    fn save(&self, registry: &Registry) -> Result<(), RegistryError>;

    /// Serialize without writing
    fn export(&self, registry: &Registry) -> Result<Vec<u8>, RegistryError>;

    /// Parse bytes produced by [`RegistryStore::export`]
    fn import(&self, bytes: &[u8]) -> Result<Registry, RegistryError>;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("failed to access registry: {message}")]
    AccessError { message: String },

    #[error("failed to serialize registry: {message}")]
    SerializationError { message: String },

    #[error(
        "registry file corrupted: {path}\n  → Fix: restore it with `sitekeeper history checkout <commit>` or `sitekeeper backup restore`\n  → Details: {message}"
    )]
    Corrupted { path: PathBuf, message: String },
}

impl From<RegistryError> for crate::error::EngineError {
    fn from(err: RegistryError) -> Self {
        crate::error::EngineError::storage(err.to_string())
    }
}
