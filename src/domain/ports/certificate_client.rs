//! Certificate authority client and certificate inspection ports

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::entities::IssuanceMode;
use crate::domain::value_objects::DomainName;

/// Credentials for the DNS challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsCredentials {
    /// Provider plugin name, e.g. `cloudflare`
    pub plugin: String,
    pub credentials_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub domain: DomainName,
    pub mode: IssuanceMode,
    pub email: Option<String>,
    pub dns: Option<DnsCredentials>,
    pub staging: bool,
    /// Renew even when the authority considers the certificate current
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificatePaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CertClientError {
    #[error("certificate authority refused the request")]
    Failed { diagnostics: String },

    #[error("certificate authority rate limit reached")]
    RateLimited { diagnostics: String },

    #[error("certificate client did not finish within {}s", .after.as_secs())]
    Timeout { after: Duration },

    #[error("could not run certificate client: {message}")]
    Spawn { message: String },

    #[error("could not read certificate {path}: {message}")]
    Unreadable { path: PathBuf, message: String },
}

impl CertClientError {
    pub fn diagnostics(&self) -> &str {
        match self {
            CertClientError::Failed { diagnostics }
            | CertClientError::RateLimited { diagnostics } => diagnostics,
            _ => "",
        }
    }
}

/// Obtains, renews and deletes certificates
pub trait CertificateClient: Send + Sync {
    /// Where the client stores material for `domain`
    fn paths(&self, domain: &DomainName) -> CertificatePaths;

    fn issue(&self, request: &CertificateRequest) -> Result<String, CertClientError>;

    fn renew(&self, request: &CertificateRequest) -> Result<String, CertClientError>;

    fn delete(&self, domain: &DomainName) -> Result<String, CertClientError>;
}

/// Reads expiry from certificate material
pub trait CertificateInspector: Send + Sync {
    /// `Ok(None)` when no certificate exists at `cert_path`
    fn expiry(&self, cert_path: &Path) -> Result<Option<DateTime<Utc>>, CertClientError>;
}
