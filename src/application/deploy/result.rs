//! Deploy Results

use crate::application::certificates::CertAction;
use crate::domain::entities::{CertificateRecord, Commit, CommitId, Domain};
use crate::domain::ports::DeployStage;
use crate::domain::services::TreeDiff;
use crate::error::{EngineError, EngineResult};

/// Result of add, edit, apply and renew
#[derive(Debug)]
pub struct ApplyReport {
    pub operation: &'static str,
    pub domain: Domain,
    /// `None` when nothing was deployed (e.g. a renewal that was not due)
    pub commit: Option<Commit>,
    /// Stages reached, in order
    pub stages: Vec<DeployStage>,
    /// Whether the live configuration serves TLS
    pub tls_live: bool,
    pub certificate: Option<CertificateRecord>,
    pub cert_action: Option<CertAction>,
    /// Template placeholders that had no value
    pub unresolved: Vec<String>,
    /// Set when the domain is live but TLS could not be activated
    pub degraded: Option<EngineError>,
}

impl ApplyReport {
    pub(crate) fn new(operation: &'static str, domain: Domain) -> Self {
        Self {
            operation,
            domain,
            commit: None,
            stages: vec![DeployStage::Pending],
            tls_live: false,
            certificate: None,
            cert_action: None,
            unresolved: Vec::new(),
            degraded: None,
        }
    }

    pub(crate) fn reached(&mut self, stage: DeployStage) {
        if self.stages.last() != Some(&stage) {
            self.stages.push(stage);
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }

    pub fn last_stage(&self) -> DeployStage {
        self.stages.last().copied().unwrap_or(DeployStage::Pending)
    }

    /// Turn a degraded outcome into its error; the changes stay committed
    pub fn into_result(mut self) -> EngineResult<Self> {
        match self.degraded.take() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

#[derive(Debug)]
pub struct RemoveReport {
    pub domain: Domain,
    pub commit: Commit,
    pub certificate_deleted: bool,
    /// Certificate purge failure; the domain itself is gone
    pub degraded: Option<EngineError>,
}

/// Result of checkout and backup restore
#[derive(Debug)]
pub struct RestoreReport {
    /// Commit that was checked out, if the tree came from history
    pub source: Option<CommitId>,
    /// Branch switched to, if any
    pub branch: Option<String>,
    pub commit: Commit,
    /// What changed in the managed directories
    pub changes: TreeDiff,
}

/// One entry of `renew --due`
#[derive(Debug)]
pub struct RenewOutcome {
    pub domain: String,
    pub result: EngineResult<ApplyReport>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{BackendPort, DomainName};

    fn report() -> ApplyReport {
        let domain = Domain::new(
            DomainName::parse("a.com").unwrap(),
            BackendPort::new(3000).unwrap(),
        );
        ApplyReport::new("add", domain)
    }

    #[test]
    fn stages_are_not_repeated() {
        let mut report = report();
        report.reached(DeployStage::Rendered);
        report.reached(DeployStage::Rendered);
        report.reached(DeployStage::Live);
        assert_eq!(
            report.stages,
            vec![DeployStage::Pending, DeployStage::Rendered, DeployStage::Live]
        );
        assert_eq!(report.last_stage(), DeployStage::Live);
    }

    #[test]
    fn degraded_report_converts_to_error() {
        let mut report = report();
        assert!(!report.is_degraded());
        report.degraded = Some(EngineError::Certificate {
            domain: "a.com".into(),
            message: "issuance failed".into(),
            diagnostics: String::new(),
        });
        let err = report.into_result().unwrap_err();
        assert_eq!(err.kind(), "certificate");
    }
}
