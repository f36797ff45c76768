//! Sitekeeper - reverse-proxy domain and TLS certificate manager
//!
//! Sitekeeper keeps a registry of domains, renders one daemon configuration
//! file per domain, obtains certificates through an external client, and
//! deploys every change through a validate/reload cycle that rolls back on
//! failure. Each deploy is recorded in a content-addressed history that can
//! be inspected, branched and checked out.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod presentation;

// Re-exports for convenience
pub use application::{
    ApplyOptions, ApplyReport, BackupManager, CancelToken, DeployUseCase, Doctor, DomainRequest,
    EditRequest, RemoveOptions, VersionControl,
};
pub use config::{Config, ConfigError};
pub use domain::entities::{CertState, Commit, Domain, Outcome};
pub use domain::value_objects::DomainName;
pub use error::{EngineError, EngineResult, FailedStage};
