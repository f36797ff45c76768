//! Configuration type definitions

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::loader::{self, ConfigError};
use crate::domain::entities::validate_branch_name;
use crate::domain::value_objects::{ConfigWarning, SiteLayout};

/// Where state, templates and the daemon's site directories live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Registry, history store and lock files
    pub state_dir: PathBuf,
    /// Named templates; defaults to `<state_dir>/templates`
    pub templates_dir: Option<PathBuf>,
    pub available_dir: PathBuf,
    pub enabled_dir: PathBuf,
    /// File-name prefix that marks entries as ours
    pub managed_prefix: String,
    /// Backup archives; defaults to `<state_dir>/backups`
    pub backup_dir: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("/var/lib/sitekeeper"),
            templates_dir: None,
            available_dir: PathBuf::from("/etc/nginx/sites-available"),
            enabled_dir: PathBuf::from("/etc/nginx/sites-enabled"),
            managed_prefix: "sitekeeper-".to_string(),
            backup_dir: None,
        }
    }
}

impl PathsConfig {
    pub fn registry_path(&self) -> PathBuf {
        self.state_dir.join("registry.json")
    }

    pub fn history_dir(&self) -> PathBuf {
        self.state_dir.join("history")
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.templates_dir
            .clone()
            .unwrap_or_else(|| self.state_dir.join("templates"))
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| self.state_dir.join("backups"))
    }

    pub fn layout(&self) -> SiteLayout {
        SiteLayout::new(
            self.available_dir.clone(),
            self.enabled_dir.clone(),
            self.managed_prefix.clone(),
        )
        .with_managed_root(self.state_dir.clone())
    }
}

/// How an enabled entry references its rendered file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActivationMode {
    #[default]
    Symlink,
    Copy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub test_command: Vec<String>,
    pub reload_command: Vec<String>,
    pub status_command: Vec<String>,
    pub timeout_secs: u64,
    pub activation: ActivationMode,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            test_command: vec!["nginx".into(), "-t".into()],
            reload_command: vec!["systemctl".into(), "reload".into(), "nginx".into()],
            status_command: vec!["systemctl".into(), "is-active".into(), "nginx".into()],
            timeout_secs: 30,
            activation: ActivationMode::Symlink,
        }
    }
}

impl DaemonConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificatesConfig {
    /// Client binary (`certbot`)
    pub client: String,
    /// Root the client stores material under (`<root>/live/<name>/`)
    pub cert_root: PathBuf,
    pub email: Option<String>,
    pub renew_before_days: u32,
    pub timeout_secs: u64,
    pub dns_plugin: Option<String>,
    pub dns_credentials: Option<PathBuf>,
    pub staging: bool,
}

impl Default for CertificatesConfig {
    fn default() -> Self {
        Self {
            client: "certbot".to_string(),
            cert_root: PathBuf::from("/etc/letsencrypt"),
            email: None,
            renew_before_days: 30,
            timeout_secs: 300,
            dns_plugin: None,
            dns_credentials: None,
            staging: false,
        }
    }
}

impl CertificatesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn renew_before(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.renew_before_days))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub default_branch: String,
    /// Commit author; falls back to `$USER`, then `sitekeeper`
    pub author: Option<String>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_branch: "main".to_string(),
            author: None,
        }
    }
}

impl HistoryConfig {
    pub fn author(&self) -> String {
        self.author
            .clone()
            .or_else(|| std::env::var("USER").ok().filter(|u| !u.is_empty()))
            .unwrap_or_else(|| "sitekeeper".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `sitekeeper=debug`
    pub level: Option<String>,
    /// Write logs to this file instead of stderr
    pub file: Option<PathBuf>,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub daemon: DaemonConfig,

    #[serde(default)]
    pub certificates: CertificatesConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let (config, _warnings) = loader::load_with_warnings(path)?;
        Ok(config)
    }

    /// Load configuration and collect non-fatal warnings (e.g. unknown keys).
    pub fn load_with_warnings(path: &Path) -> Result<(Self, Vec<ConfigWarning>), ConfigError> {
        loader::load_with_warnings(path)
    }

    /// Resolve the config file from the lookup chain and apply env overrides
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, Vec<ConfigWarning>), ConfigError> {
        loader::discover(explicit)
    }

    /// Apply environment variable overrides (SITEKEEPER_* prefix)
    pub fn with_env_overrides(self) -> Self {
        loader::with_env_overrides(self)
    }

    /// Reject settings that would make every operation fail later
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::Invalid { message });

        for (name, command) in [
            ("daemon.test_command", &self.daemon.test_command),
            ("daemon.reload_command", &self.daemon.reload_command),
            ("daemon.status_command", &self.daemon.status_command),
        ] {
            if command.first().map_or(true, |program| program.trim().is_empty()) {
                return invalid(format!("{} must name a program", name));
            }
        }

        let prefix = &self.paths.managed_prefix;
        if prefix.is_empty() || prefix.contains('/') {
            return invalid(format!(
                "paths.managed_prefix '{}' must be non-empty and contain no '/'",
                prefix
            ));
        }

        if self.paths.available_dir == self.paths.enabled_dir {
            return invalid("paths.available_dir and paths.enabled_dir must differ".to_string());
        }

        if self.certificates.renew_before_days > 365 {
            return invalid(format!(
                "certificates.renew_before_days = {} is more than a year",
                self.certificates.renew_before_days
            ));
        }

        if self.daemon.timeout_secs == 0 || self.certificates.timeout_secs == 0 {
            return invalid("timeouts must be at least one second".to_string());
        }

        validate_branch_name(&self.history.default_branch).or_else(|e| invalid(e))?;
        Ok(())
    }
}
