//! Tracing Event Sink
//!
//! Forwards engine events to `tracing`, so they land in the configured log
//! file or on stderr next to everything else.

use tracing::{debug, info, warn};

use crate::domain::ports::{DeployEvent, DeployEventSink};

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl DeployEventSink for TracingEventSink {
    fn on_event(&self, event: DeployEvent) {
        match event {
            DeployEvent::Started { operation, target } => {
                info!(operation, target = %target, "operation started");
            }
            DeployEvent::Stage { target, stage } => {
                debug!(target = %target, stage = stage.as_str(), "stage reached");
            }
            DeployEvent::RolledBack {
                target,
                stage,
                recovered,
            } => {
                warn!(
                    target = %target,
                    failed_stage = stage.as_str(),
                    recovered,
                    "change rolled back"
                );
            }
            DeployEvent::UnresolvedVariables { target, names } => {
                warn!(target = %target, names = ?names, "template left variables unresolved");
            }
            DeployEvent::CertificateRequested { domain, mode } => {
                info!(domain = %domain, mode, "requesting certificate");
            }
            DeployEvent::CertificateIssued { domain, expires_at } => {
                info!(domain = %domain, expires_at = ?expires_at, "certificate issued");
            }
            DeployEvent::CertificateSkipped { domain, reason } => {
                debug!(domain = %domain, reason = %reason, "certificate step skipped");
            }
            DeployEvent::CertificateFailed { domain, error } => {
                warn!(domain = %domain, error = %error, "certificate step failed");
            }
            DeployEvent::Committed {
                id,
                outcome,
                message,
            } => {
                info!(commit = %id, outcome = outcome.as_str(), message = %message, "committed");
            }
            DeployEvent::Completed {
                operation,
                target,
                success,
            } => {
                if success {
                    info!(operation, target = %target, "operation finished");
                } else {
                    warn!(operation, target = %target, "operation failed");
                }
            }
        }
    }
}

/// Fans one event out to several sinks
pub struct FanoutEventSink {
    sinks: Vec<Box<dyn DeployEventSink>>,
}

impl FanoutEventSink {
    pub fn new(sinks: Vec<Box<dyn DeployEventSink>>) -> Self {
        Self { sinks }
    }
}

impl DeployEventSink for FanoutEventSink {
    fn on_event(&self, event: DeployEvent) {
        for sink in &self.sinks {
            sink.on_event(event.clone());
        }
    }

    fn wants_detailed_events(&self) -> bool {
        self.sinks.iter().any(|s| s.wants_detailed_events())
    }
}
