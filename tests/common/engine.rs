//! Library-level test engine with scripted collaborators.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;

use sitekeeper::application::{
    ApplyOptions, CertificateProvisioner, DeployUseCase, DomainRegistry, ProvisionSettings,
    VersionControl,
};
use sitekeeper::domain::entities::Commit;
use sitekeeper::domain::ports::{
    CertClientError, CertificateClient, CertificateInspector, CertificatePaths,
    CertificateRequest, DaemonControl, DaemonError, DaemonStatus,
};
use sitekeeper::domain::value_objects::{DomainName, SiteLayout};
use sitekeeper::infrastructure::{FsHistoryStore, FsTemplateSource, JsonRegistryStore, LocalFs};

/// Daemon whose validate/reload answers can be queued up front
#[derive(Default)]
pub struct ScriptedDaemon {
    validate: Mutex<VecDeque<Result<String, DaemonError>>>,
    reload: Mutex<VecDeque<Result<String, DaemonError>>>,
    calls: Mutex<Vec<&'static str>>,
}

impl ScriptedDaemon {
    pub fn reject_next_validate(&self, diagnostics: &str) {
        self.validate.lock().unwrap().push_back(Err(DaemonError::Failed {
            action: "configuration test".to_string(),
            diagnostics: diagnostics.to_string(),
        }));
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

impl DaemonControl for ScriptedDaemon {
    fn validate(&self) -> Result<String, DaemonError> {
        self.calls.lock().unwrap().push("validate");
        self.validate
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok("syntax is ok".to_string()))
    }

    fn reload(&self) -> Result<String, DaemonError> {
        self.calls.lock().unwrap().push("reload");
        self.reload
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(String::new()))
    }

    fn status(&self) -> Result<DaemonStatus, DaemonError> {
        Ok(DaemonStatus {
            active: true,
            detail: "active".to_string(),
        })
    }
}

type Expiries = Arc<Mutex<HashMap<PathBuf, DateTime<Utc>>>>;

/// Certificate client that grants 90-day certificates under `<root>/live/<base>/`
pub struct FakeCa {
    root: PathBuf,
    expiries: Expiries,
    pub requests: Mutex<Vec<String>>,
}

impl FakeCa {
    fn grant(&self, request: &CertificateRequest) -> Result<String, CertClientError> {
        let paths = self.paths(&request.domain);
        if let Some(dir) = paths.cert.parent() {
            std::fs::create_dir_all(dir).map_err(|e| CertClientError::Failed {
                diagnostics: e.to_string(),
            })?;
        }
        for path in [&paths.cert, &paths.key] {
            std::fs::write(path, format!("material for {}\n", request.domain)).map_err(|e| {
                CertClientError::Failed {
                    diagnostics: e.to_string(),
                }
            })?;
        }
        self.expiries
            .lock()
            .unwrap()
            .insert(paths.cert, Utc::now() + Duration::days(90));
        Ok("Successfully received certificate.".to_string())
    }
}

impl CertificateClient for FakeCa {
    fn paths(&self, domain: &DomainName) -> CertificatePaths {
        let dir = self.root.join("live").join(domain.base());
        CertificatePaths {
            cert: dir.join("fullchain.pem"),
            key: dir.join("privkey.pem"),
        }
    }

    fn issue(&self, request: &CertificateRequest) -> Result<String, CertClientError> {
        self.requests
            .lock()
            .unwrap()
            .push(format!("issue {}", request.domain));
        self.grant(request)
    }

    fn renew(&self, request: &CertificateRequest) -> Result<String, CertClientError> {
        self.requests
            .lock()
            .unwrap()
            .push(format!("renew {}", request.domain));
        self.grant(request)
    }

    fn delete(&self, domain: &DomainName) -> Result<String, CertClientError> {
        self.requests
            .lock()
            .unwrap()
            .push(format!("delete {}", domain));
        Ok(String::new())
    }
}

pub struct FakeInspector(Expiries);

impl CertificateInspector for FakeInspector {
    fn expiry(&self, cert_path: &Path) -> Result<Option<DateTime<Utc>>, CertClientError> {
        Ok(self.0.lock().unwrap().get(cert_path).copied())
    }
}

/// Deploy use case over a temp directory
pub struct Engine {
    pub dir: TempDir,
    pub daemon: Arc<ScriptedDaemon>,
    pub ca: Arc<FakeCa>,
    pub deploy: DeployUseCase<LocalFs>,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_settings(ProvisionSettings::default())
    }

    pub fn with_settings(settings: ProvisionSettings) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let daemon = Arc::new(ScriptedDaemon::default());
        let expiries: Expiries = Arc::default();
        let ca = Arc::new(FakeCa {
            root: root.join("letsencrypt"),
            expiries: expiries.clone(),
            requests: Mutex::new(Vec::new()),
        });

        let deploy = DeployUseCase::new(
            LocalFs::new(),
            SiteLayout::new(
                root.join("sites-available"),
                root.join("sites-enabled"),
                "sitekeeper-",
            ),
            DomainRegistry::new(Arc::new(JsonRegistryStore::with_path(
                root.join("state/registry.json"),
            ))),
            VersionControl::new(
                Arc::new(FsHistoryStore::new(root.join("state/history"))),
                "main",
                "scenario",
            ),
            daemon.clone(),
            CertificateProvisioner::new(ca.clone(), Arc::new(FakeInspector(expiries)), settings),
            Arc::new(FsTemplateSource::new(root.join("templates"))),
        );

        Self {
            dir,
            daemon,
            ca,
            deploy,
        }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Rendered file for `domain` in the available directory
    pub fn available(&self, domain: &str) -> Option<String> {
        let name = DomainName::parse(domain).unwrap();
        std::fs::read_to_string(self.deploy.layout().available_path(&name)).ok()
    }

    /// Whether `domain` has an activation entry in the enabled directory
    pub fn enabled(&self, domain: &str) -> bool {
        let name = DomainName::parse(domain).unwrap();
        std::fs::symlink_metadata(self.deploy.layout().enabled_path(&name)).is_ok()
    }

    pub fn commits(&self) -> Vec<Commit> {
        self.deploy
            .history()
            .log(None)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    pub fn domain_names(&self) -> Vec<String> {
        self.deploy
            .registry()
            .list()
            .unwrap()
            .iter()
            .map(|d| d.name.to_string())
            .collect()
    }
}

pub fn opts() -> ApplyOptions {
    ApplyOptions::new()
}
