//! Domain entity: one hostname routed to one upstream endpoint

use chrono::{DateTime, Utc};

use crate::domain::value_objects::{BackendAddress, BackendPort, DomainName};

/// How a certificate for a domain has to be obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssuanceMode {
    /// HTTP challenge answered by the live daemon
    Standard,
    /// DNS challenge; required for wildcard names
    DnsChallenge,
}

impl IssuanceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssuanceMode::Standard => "standard",
            IssuanceMode::DnsChallenge => "dns",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "standard" => Some(IssuanceMode::Standard),
            "dns" => Some(IssuanceMode::DnsChallenge),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    pub name: DomainName,
    pub port: BackendPort,
    pub backend_address: BackendAddress,
    pub tls: bool,
    /// Always equal to `name.is_wildcard()`
    pub wildcard: bool,
    /// Template name; `None` uses the built-in default
    pub template: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Domain {
    pub fn new(name: DomainName, port: BackendPort) -> Self {
        let now = Utc::now();
        let wildcard = name.is_wildcard();
        Self {
            name,
            port,
            backend_address: BackendAddress::default(),
            tls: false,
            wildcard,
            template: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_backend(mut self, address: BackendAddress) -> Self {
        self.backend_address = address;
        self
    }

    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_template(mut self, template: Option<String>) -> Self {
        self.template = template;
        self
    }

    pub fn issuance_mode(&self) -> IssuanceMode {
        if self.wildcard {
            IssuanceMode::DnsChallenge
        } else {
            IssuanceMode::Standard
        }
    }

    /// Copy of this record with the patch applied and `updated_at` bumped
    pub fn patched(&self, patch: &DomainPatch, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        if let Some(port) = patch.port {
            next.port = port;
        }
        if let Some(address) = &patch.backend_address {
            next.backend_address = address.clone();
        }
        if let Some(tls) = patch.tls {
            next.tls = tls;
        }
        if let Some(template) = &patch.template {
            next.template = template.clone();
        }
        next.updated_at = now;
        next
    }
}

/// Partial update for an existing domain; `None` fields stay unchanged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomainPatch {
    pub port: Option<BackendPort>,
    pub backend_address: Option<BackendAddress>,
    pub tls: Option<bool>,
    /// `Some(None)` switches back to the default template
    pub template: Option<Option<String>>,
}

impl DomainPatch {
    pub fn is_empty(&self) -> bool {
        self.port.is_none()
            && self.backend_address.is_none()
            && self.tls.is_none()
            && self.template.is_none()
    }
}
