//! Deploy Event Port
//!
//! Observable interface for engine operations. Sinks receive every stage
//! transition, certificate step and commit, which drives progress output,
//! NDJSON event streams and tracing.

use chrono::{DateTime, Utc};

use crate::domain::entities::Outcome;
use crate::error::FailedStage;

/// Stage a single configuration change has reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStage {
    Pending,
    Rendered,
    Validated,
    Enabled,
    Live,
    RolledBack,
}

impl DeployStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployStage::Pending => "pending",
            DeployStage::Rendered => "rendered",
            DeployStage::Validated => "validated",
            DeployStage::Enabled => "enabled",
            DeployStage::Live => "live",
            DeployStage::RolledBack => "rolled-back",
        }
    }
}

impl std::fmt::Display for DeployStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event emitted during engine operations
#[derive(Debug, Clone)]
pub enum DeployEvent {
    /// Operation started (`add`, `edit`, `remove`, `checkout`, ...)
    Started {
        operation: &'static str,
        target: String,
    },

    /// A change moved to a new stage
    Stage { target: String, stage: DeployStage },

    /// Validate or reload failed and the previous files were put back
    RolledBack {
        target: String,
        stage: FailedStage,
        /// Whether the daemon accepted the restored configuration again
        recovered: bool,
    },

    /// Rendering left `$NAME` tokens with no value
    UnresolvedVariables { target: String, names: Vec<String> },

    CertificateRequested { domain: String, mode: &'static str },

    CertificateIssued {
        domain: String,
        expires_at: Option<DateTime<Utc>>,
    },

    CertificateSkipped { domain: String, reason: String },

    CertificateFailed { domain: String, error: String },

    /// A commit was appended to the history
    Committed {
        id: String,
        outcome: Outcome,
        message: String,
    },

    /// Operation finished
    Completed {
        operation: &'static str,
        target: String,
        success: bool,
    },
}

/// Trait for receiving deploy events
///
/// Implementations:
/// - `TracingEventSink`: forwards to `tracing`
/// - `JsonEventSink`: NDJSON event stream for automation
/// - `NoopEventSink`: silent operation
pub trait DeployEventSink: Send + Sync {
    fn on_event(&self, event: DeployEvent);

    /// Whether this sink wants per-stage events, or only start/finish/commit
    fn wants_detailed_events(&self) -> bool {
        true
    }
}

/// No-op event sink for silent operation
pub struct NoopEventSink;

impl DeployEventSink for NoopEventSink {
    fn on_event(&self, _event: DeployEvent) {}

    fn wants_detailed_events(&self) -> bool {
        false
    }
}
