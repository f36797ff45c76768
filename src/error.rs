//! Error types for Sitekeeper
//!
//! Every engine operation returns [`EngineResult`]. Port-level errors
//! (file system, daemon, certificate client, stores) are converted into an
//! [`EngineError`] at the application boundary so callers only match on one
//! taxonomy.

use thiserror::Error;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Pipeline stage at which a deployment failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedStage {
    Render,
    Write,
    Validate,
    Reload,
}

impl FailedStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailedStage::Render => "render",
            FailedStage::Write => "write",
            FailedStage::Validate => "validate",
            FailedStage::Reload => "reload",
        }
    }
}

impl std::fmt::Display for FailedStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// Input rejected before any side effect happened
    #[error("invalid input: {message}")]
    Validation { message: String },

    /// Referenced domain, commit, branch or snapshot does not exist
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// Template could not be loaded or rendered
    #[error("template error: {message}")]
    Render { message: String },

    /// Certificate issuance, renewal or removal failed
    #[error("certificate error for {domain}: {message}{}", diagnostics_suffix(.diagnostics))]
    Certificate {
        domain: String,
        message: String,
        diagnostics: String,
    },

    /// Daemon rejected or failed to load a configuration; the previous state was restored
    #[error("deployment failed at {stage} stage: {message}{}", diagnostics_suffix(.diagnostics))]
    Deployment {
        stage: FailedStage,
        message: String,
        diagnostics: String,
    },

    /// Another operation holds the lock for this domain
    #[error("operation already in progress for {domain}")]
    Conflict { domain: String },

    /// Persistent state could not be read or written
    #[error("storage error: {message}")]
    Storage { message: String },

    /// Operation observed a cancellation request before its point of no return
    #[error("operation cancelled before any change was applied")]
    Cancelled,
}

fn diagnostics_suffix(diagnostics: &str) -> String {
    let trimmed = diagnostics.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("\n  → Diagnostics:\n{}", indent(trimmed))
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        EngineError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        EngineError::Storage {
            message: message.into(),
        }
    }

    pub fn render(message: impl Into<String>) -> Self {
        EngineError::Render {
            message: message.into(),
        }
    }

    /// Short machine-readable class name, used by the JSON output
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation { .. } => "validation",
            EngineError::NotFound { .. } => "not_found",
            EngineError::Render { .. } => "render",
            EngineError::Certificate { .. } => "certificate",
            EngineError::Deployment { .. } => "deployment",
            EngineError::Conflict { .. } => "conflict",
            EngineError::Storage { .. } => "storage",
            EngineError::Cancelled => "cancelled",
        }
    }

    /// Process exit code for this error class
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::Validation { .. } => 2,
            EngineError::NotFound { .. } => 3,
            EngineError::Render { .. } => 4,
            EngineError::Certificate { .. } => 5,
            EngineError::Deployment { .. } => 6,
            EngineError::Conflict { .. } => 7,
            EngineError::Storage { .. } => 8,
            EngineError::Cancelled => 130,
        }
    }

    /// Daemon or client output attached to the error, if any
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            EngineError::Certificate { diagnostics, .. }
            | EngineError::Deployment { diagnostics, .. }
                if !diagnostics.trim().is_empty() =>
            {
                Some(diagnostics.as_str())
            }
            _ => None,
        }
    }
}
