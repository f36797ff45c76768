//! DaemonControl port - the reverse-proxy daemon
//!
//! `validate` checks the whole enabled configuration set without touching
//! the running daemon; `reload` makes the running daemon pick it up.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DaemonError {
    /// Command ran and reported failure
    #[error("{action} failed")]
    Failed { action: String, diagnostics: String },

    #[error("{action} did not finish within {}s", .after.as_secs())]
    Timeout { action: String, after: Duration },

    #[error("could not run {action}: {message}")]
    Spawn { action: String, message: String },
}

impl DaemonError {
    pub fn diagnostics(&self) -> &str {
        match self {
            DaemonError::Failed { diagnostics, .. } => diagnostics,
            DaemonError::Timeout { .. } | DaemonError::Spawn { .. } => "",
        }
    }
}

/// Running state reported by the service manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonStatus {
    pub active: bool,
    pub detail: String,
}

pub trait DaemonControl: Send + Sync {
    /// Test the configuration set; `Ok` carries the daemon's output
    fn validate(&self) -> Result<String, DaemonError>;

    /// Ask the running daemon to reload
    fn reload(&self) -> Result<String, DaemonError>;

    fn status(&self) -> Result<DaemonStatus, DaemonError>;
}
