//! JSON Registry Store
//!
//! Persists the registry at `<state_dir>/registry.json`. Writes take an
//! exclusive `fs2` lock on a sibling `.lock` file so two processes never
//! interleave a save.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::domain::entities::{CertState, CertificateRecord, Domain, IssuanceMode, Registry};
use crate::domain::ports::{RegistryError, RegistryStore};
use crate::domain::value_objects::{BackendAddress, BackendPort, DomainName};
use crate::infrastructure::fs::atomic_write;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JsonDomain {
    name: String,
    port: u32,
    backend_address: String,
    tls: bool,
    wildcard: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    template: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JsonCertificate {
    domain: String,
    cert_path: PathBuf,
    key_path: PathBuf,
    mode: String,
    state: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    last_checked: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JsonRegistry {
    version: u32,
    #[serde(default)]
    domains: Vec<JsonDomain>,
    #[serde(default)]
    certificates: Vec<JsonCertificate>,
}

pub struct JsonRegistryStore {
    path: PathBuf,
}

impl JsonRegistryStore {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    fn corrupted(&self, message: impl Into<String>) -> RegistryError {
        RegistryError::Corrupted {
            path: self.path.clone(),
            message: message.into(),
        }
    }

    fn parse(&self, bytes: &[u8]) -> Result<Registry, RegistryError> {
        let doc: JsonRegistry =
            serde_json::from_slice(bytes).map_err(|e| self.corrupted(e.to_string()))?;
        from_json(doc).map_err(|message| self.corrupted(message))
    }
}

impl RegistryStore for JsonRegistryStore {
    fn load(&self) -> Result<Registry, RegistryError> {
        if !self.path.exists() {
            return Ok(Registry::new());
        }
        let bytes = fs::read(&self.path).map_err(|e| RegistryError::AccessError {
            message: format!("{}: {}", self.path.display(), e),
        })?;
        self.parse(&bytes)
    }

    fn save(&self, registry: &Registry) -> Result<(), RegistryError> {
        let access = |e: std::io::Error| RegistryError::AccessError {
            message: e.to_string(),
        };

        let bytes = self.export(registry)?;
        let lock_path = self.lock_path();
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).map_err(access)?;
        }
        let lock_file = fs::File::create(&lock_path).map_err(access)?;
        lock_file.lock_exclusive().map_err(access)?;

        let result = atomic_write(&self.path, &bytes).map_err(|e| RegistryError::AccessError {
            message: e.to_string(),
        });

        let _ = lock_file.unlock();
        result
    }

    fn export(&self, registry: &Registry) -> Result<Vec<u8>, RegistryError> {
        let mut bytes = serde_json::to_vec_pretty(&to_json(registry)).map_err(|e| {
            RegistryError::SerializationError {
                message: e.to_string(),
            }
        })?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    fn import(&self, bytes: &[u8]) -> Result<Registry, RegistryError> {
        self.parse(bytes)
    }
}

fn from_json(doc: JsonRegistry) -> Result<Registry, String> {
    let mut registry = Registry::new();
    registry.version = doc.version;

    for d in doc.domains {
        let name = DomainName::parse(&d.name).map_err(|e| e.to_string())?;
        let port = BackendPort::new(d.port)?;
        let backend_address = BackendAddress::parse(&d.backend_address)?;
        let domain = Domain {
            wildcard: name.is_wildcard(),
            name,
            port,
            backend_address,
            tls: d.tls,
            template: d.template,
            created_at: d.created_at,
            updated_at: d.updated_at,
        };
        if !registry.insert(domain) {
            return Err(format!("domain '{}' is listed twice", d.name));
        }
    }

    for c in doc.certificates {
        let domain = DomainName::parse(&c.domain).map_err(|e| e.to_string())?;
        let mode = IssuanceMode::parse(&c.mode)
            .ok_or_else(|| format!("unknown issuance mode '{}'", c.mode))?;
        let state = CertState::parse(&c.state)
            .ok_or_else(|| format!("unknown certificate state '{}'", c.state))?;
        registry.upsert_certificate(CertificateRecord {
            domain,
            cert_path: c.cert_path,
            key_path: c.key_path,
            mode,
            state,
            expires_at: c.expires_at,
            last_checked: c.last_checked,
        });
    }

    Ok(registry)
}

fn to_json(registry: &Registry) -> JsonRegistry {
    JsonRegistry {
        version: registry.version,
        domains: registry
            .domains
            .iter()
            .map(|d| JsonDomain {
                name: d.name.to_string(),
                port: u32::from(d.port.get()),
                backend_address: d.backend_address.to_string(),
                tls: d.tls,
                wildcard: d.wildcard,
                template: d.template.clone(),
                created_at: d.created_at,
                updated_at: d.updated_at,
            })
            .collect(),
        certificates: registry
            .certificates
            .iter()
            .map(|c| JsonCertificate {
                domain: c.domain.to_string(),
                cert_path: c.cert_path.clone(),
                key_path: c.key_path.clone(),
                mode: c.mode.as_str().to_string(),
                state: c.state.as_str().to_string(),
                expires_at: c.expires_at,
                last_checked: c.last_checked,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn domain(name: &str, port: u32) -> Domain {
        Domain::new(DomainName::parse(name).unwrap(), BackendPort::new(port).unwrap())
    }

    #[test]
    fn load_missing_returns_empty() {
        let dir = tempdir().unwrap();
        let store = JsonRegistryStore::with_path(dir.path().join("registry.json"));
        let reg = store.load().unwrap();
        assert!(reg.domains.is_empty());
        assert_eq!(reg.version, 1);
    }

    #[test]
    fn load_corrupted_returns_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(&path, "{ not json").unwrap();

        let store = JsonRegistryStore::with_path(path.clone());
        let err = store.load().unwrap_err();
        assert!(matches!(err, RegistryError::Corrupted { .. }));
        assert!(err.to_string().contains(&path.display().to_string()));
    }

    #[test]
    fn invalid_records_are_corruption() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(
            &path,
            r#"{"version":1,"domains":[{"name":"-bad-.com","port":80,"backend_address":"127.0.0.1","tls":false,"wildcard":false,"created_at":"2026-01-01T00:00:00Z","updated_at":"2026-01-01T00:00:00Z"}]}"#,
        )
        .unwrap();
        let err = JsonRegistryStore::with_path(path).load().unwrap_err();
        assert!(matches!(err, RegistryError::Corrupted { .. }));
    }

    #[test]
    fn save_and_load_preserves_order_and_certificates() {
        let dir = tempdir().unwrap();
        let store = JsonRegistryStore::with_path(dir.path().join("state/registry.json"));

        let mut reg = Registry::new();
        reg.insert(domain("b.com", 3001).with_tls(true));
        reg.insert(domain("*.a.com", 3000));
        let mut cert = CertificateRecord::new(
            DomainName::parse("b.com").unwrap(),
            PathBuf::from("/live/b.com/fullchain.pem"),
            PathBuf::from("/live/b.com/privkey.pem"),
            IssuanceMode::Standard,
        );
        cert.state = CertState::Active;
        cert.expires_at = Some(Utc::now());
        reg.upsert_certificate(cert);

        store.save(&reg).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, reg);
        assert!(loaded.domains[1].wildcard);
        assert!(dir.path().join("state/registry.lock").exists());
    }

    #[test]
    fn export_is_deterministic() {
        let dir = tempdir().unwrap();
        let store = JsonRegistryStore::with_path(dir.path().join("registry.json"));
        let mut reg = Registry::new();
        reg.insert(domain("a.com", 3000));

        let a = store.export(&reg).unwrap();
        let b = store.export(&reg).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.import(&a).unwrap(), reg);
    }
}
