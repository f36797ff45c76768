//! Deploy Options
//!
//! Raw requests as they arrive from the CLI, plus per-call options. Requests
//! are parsed into domain types before anything touches disk, so a bad name
//! or port never gets as far as the daemon.

use crate::application::locks::CancelToken;
use crate::domain::entities::{Domain, DomainPatch};
use crate::domain::value_objects::{BackendAddress, BackendPort, DomainName};
use crate::error::{EngineError, EngineResult};

/// Parse a domain name argument
pub fn parse_name(raw: &str) -> EngineResult<DomainName> {
    DomainName::parse(raw).map_err(|e| EngineError::validation(e.to_string()))
}

fn parse_port(port: u32) -> EngineResult<BackendPort> {
    BackendPort::new(port).map_err(EngineError::validation)
}

fn parse_backend(raw: &str) -> EngineResult<BackendAddress> {
    BackendAddress::parse(raw).map_err(EngineError::validation)
}

/// A new domain to register
#[derive(Debug, Clone, Default)]
pub struct DomainRequest {
    pub name: String,
    pub port: u32,
    pub backend_address: Option<String>,
    pub tls: bool,
    pub template: Option<String>,
}

impl DomainRequest {
    pub fn new(name: impl Into<String>, port: u32) -> Self {
        Self {
            name: name.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_backend(mut self, address: impl Into<String>) -> Self {
        self.backend_address = Some(address.into());
        self
    }

    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn into_domain(self) -> EngineResult<Domain> {
        let name = parse_name(&self.name)?;
        let port = parse_port(self.port)?;
        let mut domain = Domain::new(name, port)
            .with_tls(self.tls)
            .with_template(self.template);
        if let Some(raw) = self.backend_address.as_deref() {
            domain = domain.with_backend(parse_backend(raw)?);
        }
        Ok(domain)
    }
}

/// Changes to an existing domain; unset fields stay as they are
#[derive(Debug, Clone, Default)]
pub struct EditRequest {
    pub port: Option<u32>,
    pub backend_address: Option<String>,
    pub tls: Option<bool>,
    /// `Some(None)` goes back to the built-in template
    pub template: Option<Option<String>>,
}

impl EditRequest {
    pub fn into_patch(self) -> EngineResult<DomainPatch> {
        Ok(DomainPatch {
            port: self.port.map(parse_port).transpose()?,
            backend_address: self
                .backend_address
                .as_deref()
                .map(parse_backend)
                .transpose()?,
            tls: self.tls,
            template: self.template,
        })
    }
}

/// Options shared by add, edit, apply, renew and checkout
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    pub cancel: CancelToken,
    /// Commit message; a descriptive default is generated when unset
    pub message: Option<String>,
}

impl ApplyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub(crate) fn message_or(&self, default: impl FnOnce() -> String) -> String {
        self.message.clone().unwrap_or_else(default)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RemoveOptions {
    pub cancel: CancelToken,
    pub message: Option<String>,
    /// Also delete the certificate lineage from the client
    pub purge_certificate: bool,
}

impl RemoveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_purge_certificate(mut self, purge: bool) -> Self {
        self.purge_certificate = purge;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_request_validates_inputs() {
        let domain = DomainRequest::new("app.example.com", 3000)
            .with_backend("10.0.0.5")
            .with_tls(true)
            .into_domain()
            .unwrap();
        assert_eq!(domain.name.as_str(), "app.example.com");
        assert_eq!(domain.port.get(), 3000);
        assert!(domain.tls);

        let err = DomainRequest::new("bad_name.com", 3000)
            .into_domain()
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));

        let err = DomainRequest::new("example.com", 70000)
            .into_domain()
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));
    }

    #[test]
    fn edit_request_leaves_unset_fields_alone() {
        let patch = EditRequest {
            port: Some(4000),
            ..Default::default()
        }
        .into_patch()
        .unwrap();
        assert_eq!(patch.port.map(|p| p.get()), Some(4000));
        assert!(patch.backend_address.is_none());
        assert!(patch.tls.is_none());

        assert!(EditRequest::default().into_patch().unwrap().is_empty());
        assert!(EditRequest {
            port: Some(0),
            ..Default::default()
        }
        .into_patch()
        .is_err());
    }
}
