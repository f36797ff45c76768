//! Certificate Provisioner
//!
//! Drives the certificate client through the record's lifecycle. It never
//! touches daemon configuration: callers hand the resulting record to the
//! deploy use case, which activates it.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::config::CertificatesConfig;
use crate::domain::entities::{CertState, CertificateRecord, Domain, IssuanceMode};
use crate::domain::ports::{
    CertClientError, CertificateClient, CertificateInspector, CertificatePaths,
    CertificateRequest, DeployEvent, DeployEventSink, DnsCredentials,
};
use crate::domain::value_objects::DomainName;
use crate::error::{EngineError, EngineResult};

/// Settings that shape every request
#[derive(Debug, Clone)]
pub struct ProvisionSettings {
    pub email: Option<String>,
    pub dns_plugin: Option<String>,
    pub dns_credentials: Option<PathBuf>,
    pub staging: bool,
    /// Renew once fewer than this many days remain
    pub renew_before: Duration,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            email: None,
            dns_plugin: None,
            dns_credentials: None,
            staging: false,
            renew_before: Duration::days(30),
        }
    }
}

impl ProvisionSettings {
    pub fn from_config(config: &CertificatesConfig) -> Self {
        Self {
            email: config.email.clone(),
            dns_plugin: config.dns_plugin.clone(),
            dns_credentials: config.dns_credentials.clone(),
            staging: config.staging,
            renew_before: config.renew_before(),
        }
    }
}

/// What a provisioning call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertAction {
    /// Existing certificate is still fresh; no client call
    Kept,
    /// Material already on disk was taken over; no client call
    Adopted,
    Issued,
    Renewed,
    Failed,
}

impl CertAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertAction::Kept => "kept",
            CertAction::Adopted => "adopted",
            CertAction::Issued => "issued",
            CertAction::Renewed => "renewed",
            CertAction::Failed => "failed",
        }
    }
}

/// Outcome of one provisioning step
///
/// The record is returned even on failure so the caller can persist
/// `renew-failed` and keep serving the domain without TLS.
#[derive(Debug)]
pub struct Provision {
    pub record: CertificateRecord,
    pub action: CertAction,
    pub error: Option<EngineError>,
}

impl Provision {
    fn ok(record: CertificateRecord, action: CertAction) -> Self {
        Self {
            record,
            action,
            error: None,
        }
    }

    fn failed(record: CertificateRecord, error: EngineError) -> Self {
        Self {
            record,
            action: CertAction::Failed,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

pub struct CertificateProvisioner {
    client: Arc<dyn CertificateClient>,
    inspector: Arc<dyn CertificateInspector>,
    settings: ProvisionSettings,
}

impl CertificateProvisioner {
    pub fn new(
        client: Arc<dyn CertificateClient>,
        inspector: Arc<dyn CertificateInspector>,
        settings: ProvisionSettings,
    ) -> Self {
        Self {
            client,
            inspector,
            settings,
        }
    }

    pub fn settings(&self) -> &ProvisionSettings {
        &self.settings
    }

    pub fn paths(&self, name: &DomainName) -> CertificatePaths {
        self.client.paths(name)
    }

    /// Fresh record for `domain` at the client's path convention
    pub fn blank_record(&self, domain: &Domain) -> CertificateRecord {
        let paths = self.client.paths(&domain.name);
        CertificateRecord::new(
            domain.name.clone(),
            paths.cert,
            paths.key,
            domain.issuance_mode(),
        )
    }

    /// Make sure `domain` has a usable certificate
    ///
    /// A no-op when the existing certificate is valid for longer than the
    /// renewal threshold.
    pub fn provision(
        &self,
        domain: &Domain,
        existing: Option<&CertificateRecord>,
        now: DateTime<Utc>,
        events: &dyn DeployEventSink,
    ) -> Provision {
        let mut record = existing
            .cloned()
            .unwrap_or_else(|| self.blank_record(domain));
        record.mode = domain.issuance_mode();

        if record.is_fresh(now, self.settings.renew_before) {
            events.on_event(DeployEvent::CertificateSkipped {
                domain: domain.name.to_string(),
                reason: "certificate is still valid".to_string(),
            });
            return Provision::ok(record, CertAction::Kept);
        }

        if !record.state.has_material() {
            if let Some(adopted) = self.adopt(&record, now) {
                events.on_event(DeployEvent::CertificateSkipped {
                    domain: domain.name.to_string(),
                    reason: "existing certificate found on disk".to_string(),
                });
                return Provision::ok(adopted, CertAction::Adopted);
            }
        }

        let renewing = record.state.has_material();
        self.request(domain, record, renewing, renewing, now, events)
    }

    /// Renew an existing certificate; `force` renews even when still fresh
    pub fn renew(
        &self,
        domain: &Domain,
        existing: Option<&CertificateRecord>,
        force: bool,
        now: DateTime<Utc>,
        events: &dyn DeployEventSink,
    ) -> Provision {
        match existing {
            Some(record) if record.state.has_material() => {
                if !force && record.is_fresh(now, self.settings.renew_before) {
                    events.on_event(DeployEvent::CertificateSkipped {
                        domain: domain.name.to_string(),
                        reason: "not due for renewal".to_string(),
                    });
                    return Provision::ok(record.clone(), CertAction::Kept);
                }
                let mut record = record.clone();
                record.mode = domain.issuance_mode();
                self.request(domain, record, true, true, now, events)
            }
            _ => self.provision(domain, existing, now, events),
        }
    }

    /// Re-read expiry from disk and classify; never calls the client
    pub fn check_expiry(
        &self,
        record: &CertificateRecord,
        now: DateTime<Utc>,
    ) -> EngineResult<CertificateRecord> {
        let mut checked = record.clone();
        let expiry = self
            .inspector
            .expiry(&record.cert_path)
            .map_err(|e| cert_error(&record.domain, "could not read certificate", e))?;
        if expiry.is_some() {
            checked.expires_at = expiry;
        }
        checked.last_checked = Some(now);

        let next = checked.classify(now, self.settings.renew_before);
        if checked.state.can_transition_to(next) {
            checked.state = next;
        } else if next != checked.state {
            debug!(
                domain = %record.domain,
                from = %checked.state,
                to = %next,
                "expiry classification skipped"
            );
        }
        Ok(checked)
    }

    /// Remove the certificate lineage from the client
    pub fn delete(&self, name: &DomainName) -> EngineResult<()> {
        self.client
            .delete(name)
            .map(|_| ())
            .map_err(|e| cert_error(name, "could not delete certificate", e))
    }

    fn adopt(&self, record: &CertificateRecord, now: DateTime<Utc>) -> Option<CertificateRecord> {
        let expires_at = match self.inspector.expiry(&record.cert_path) {
            Ok(Some(at)) if at - now > self.settings.renew_before => at,
            Ok(_) => return None,
            Err(e) => {
                warn!(domain = %record.domain, error = %e, "ignoring unreadable certificate");
                return None;
            }
        };
        let mut adopted = record.clone();
        for state in [CertState::Requested, CertState::Issued] {
            adopted.advance(state).ok()?;
        }
        adopted.expires_at = Some(expires_at);
        adopted.last_checked = Some(now);
        Some(adopted)
    }

    fn dns_credentials(&self, name: &DomainName) -> EngineResult<DnsCredentials> {
        let missing = |what: &str| EngineError::Certificate {
            domain: name.to_string(),
            message: format!(
                "wildcard certificates need the DNS challenge, but {}",
                what
            ),
            diagnostics: String::new(),
        };
        let plugin = self
            .settings
            .dns_plugin
            .clone()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| missing("certificates.dns_plugin is not set"))?;
        let credentials_file = self
            .settings
            .dns_credentials
            .clone()
            .ok_or_else(|| missing("certificates.dns_credentials is not set"))?;
        if !credentials_file.is_file() {
            return Err(missing(&format!(
                "the credentials file {} does not exist",
                credentials_file.display()
            )));
        }
        Ok(DnsCredentials {
            plugin,
            credentials_file,
        })
    }

    fn request(
        &self,
        domain: &Domain,
        mut record: CertificateRecord,
        renewing: bool,
        force: bool,
        now: DateTime<Utc>,
        events: &dyn DeployEventSink,
    ) -> Provision {
        let name = &domain.name;

        let dns = if record.mode == IssuanceMode::DnsChallenge {
            match self.dns_credentials(name) {
                Ok(dns) => Some(dns),
                Err(e) => {
                    events.on_event(DeployEvent::CertificateFailed {
                        domain: name.to_string(),
                        error: e.to_string(),
                    });
                    return Provision::failed(record, e);
                }
            }
        } else {
            None
        };

        if let Err(e) = record.advance(CertState::Requested) {
            return Provision::failed(record, EngineError::validation(e.to_string()));
        }
        events.on_event(DeployEvent::CertificateRequested {
            domain: name.to_string(),
            mode: record.mode.as_str(),
        });

        let request = CertificateRequest {
            domain: name.clone(),
            mode: record.mode,
            email: self.settings.email.clone(),
            dns,
            staging: self.settings.staging,
            force,
        };
        let called = if renewing {
            self.client.renew(&request)
        } else {
            self.client.issue(&request)
        };

        let expiry = called.and_then(|_| self.inspector.expiry(&record.cert_path));
        let result = match expiry {
            Ok(Some(at)) => Ok(at),
            Ok(None) => Err(CertClientError::Unreadable {
                path: record.cert_path.clone(),
                message: "client reported success but wrote no certificate".to_string(),
            }),
            Err(e) => Err(e),
        };

        match result {
            Ok(expires_at) => {
                let next = if renewing {
                    CertState::Renewed
                } else {
                    CertState::Issued
                };
                record.state = next;
                record.expires_at = Some(expires_at);
                record.last_checked = Some(now);
                events.on_event(DeployEvent::CertificateIssued {
                    domain: name.to_string(),
                    expires_at: Some(expires_at),
                });
                Provision::ok(
                    record,
                    if renewing {
                        CertAction::Renewed
                    } else {
                        CertAction::Issued
                    },
                )
            }
            Err(e) => {
                record.state = if renewing {
                    CertState::RenewFailed
                } else {
                    CertState::None
                };
                record.last_checked = Some(now);
                let action = if renewing { "renewal failed" } else { "issuance failed" };
                let error = cert_error(name, action, e);
                events.on_event(DeployEvent::CertificateFailed {
                    domain: name.to_string(),
                    error: error.to_string(),
                });
                Provision::failed(record, error)
            }
        }
    }
}

fn cert_error(name: &DomainName, action: &str, err: CertClientError) -> EngineError {
    EngineError::Certificate {
        domain: name.to_string(),
        message: format!("{}: {}", action, err),
        diagnostics: err.diagnostics().to_string(),
    }
}
