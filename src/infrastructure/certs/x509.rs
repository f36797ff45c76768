//! Certificate expiry from PEM material

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::domain::ports::{CertClientError, CertificateInspector};

#[derive(Debug, Clone, Copy, Default)]
pub struct X509Inspector;

/// `notAfter` of the first certificate in a PEM bundle
pub fn pem_expiry(pem_bytes: &[u8]) -> Result<DateTime<Utc>, String> {
    let block = pem::parse(pem_bytes).map_err(|e| format!("invalid PEM: {}", e))?;
    let (_, cert) = x509_parser::parse_x509_certificate(block.contents())
        .map_err(|e| format!("invalid certificate: {}", e))?;
    let timestamp = cert.validity().not_after.timestamp();
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .ok_or_else(|| format!("expiry timestamp {} is out of range", timestamp))
}

impl CertificateInspector for X509Inspector {
    fn expiry(&self, cert_path: &Path) -> Result<Option<DateTime<Utc>>, CertClientError> {
        let bytes = match std::fs::read(cert_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CertClientError::Unreadable {
                    path: cert_path.to_path_buf(),
                    message: e.to_string(),
                })
            }
        };
        pem_expiry(&bytes)
            .map(Some)
            .map_err(|message| CertClientError::Unreadable {
                path: cert_path.to_path_buf(),
                message,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const FIXTURE: &str = include_str!("../../../tests/fixtures/fixture-cert.pem");

    #[test]
    fn reads_not_after() {
        let expiry = pem_expiry(FIXTURE.as_bytes()).unwrap();
        assert_eq!(expiry.to_rfc3339(), "2036-10-13T20:05:35+00:00");
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempdir().unwrap();
        assert_eq!(
            X509Inspector.expiry(&dir.path().join("fullchain.pem")).unwrap(),
            None
        );
    }

    #[test]
    fn garbage_is_unreadable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fullchain.pem");
        std::fs::write(&path, "not a certificate").unwrap();
        assert!(matches!(
            X509Inspector.expiry(&path),
            Err(CertClientError::Unreadable { .. })
        ));
    }
}
