//! Configuration loading

use std::fs;
use std::path::{Path, PathBuf};

use super::types::{ActivationMode, Config};
use crate::domain::value_objects::ConfigWarning;

/// System-wide configuration file
pub const SYSTEM_CONFIG_PATH: &str = "/etc/sitekeeper/config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

/// Load configuration and collect non-fatal warnings (e.g. unknown keys).
pub fn load_with_warnings(path: &Path) -> Result<(Config, Vec<ConfigWarning>), ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mut unknown_paths: Vec<String> = Vec::new();
    let deserializer = toml::de::Deserializer::new(&content);

    let config: Config = serde_ignored::deserialize(deserializer, |p| {
        unknown_paths.push(p.to_string());
    })
    .map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let warnings = unknown_paths
        .into_iter()
        .map(|key| {
            let leaf = key.rsplit('.').next().unwrap_or(key.as_str()).to_string();
            ConfigWarning {
                line: find_line_number(&content, &leaf),
                suggestion: suggest_key(&leaf),
                key,
                file: path.to_path_buf(),
            }
        })
        .collect();

    Ok((config, warnings))
}

/// Candidate config files, highest priority first
pub fn lookup_chain(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut chain = Vec::new();
    if let Some(path) = explicit {
        chain.push(path.to_path_buf());
        return chain;
    }
    if let Ok(path) = std::env::var("SITEKEEPER_CONFIG") {
        if !path.is_empty() {
            chain.push(PathBuf::from(path));
            return chain;
        }
    }
    chain.push(PathBuf::from(SYSTEM_CONFIG_PATH));
    if let Some(dir) = dirs::config_dir() {
        chain.push(dir.join("sitekeeper/config.toml"));
    }
    chain
}

/// Resolve configuration: `--config`, `SITEKEEPER_CONFIG`, system file,
/// user file, then built-in defaults; env overrides are applied last.
///
/// An explicitly named file must exist; implicit locations are skipped when
/// missing.
pub fn discover(explicit: Option<&Path>) -> Result<(Config, Vec<ConfigWarning>), ConfigError> {
    let must_exist = explicit.is_some()
        || std::env::var("SITEKEEPER_CONFIG").is_ok_and(|p| !p.is_empty());

    for candidate in lookup_chain(explicit) {
        if must_exist || candidate.exists() {
            let (config, warnings) = load_with_warnings(&candidate)?;
            let config = with_env_overrides(config);
            config.validate()?;
            return Ok((config, warnings));
        }
    }

    let config = with_env_overrides(Config::default());
    config.validate()?;
    Ok((config, Vec::new()))
}

/// Apply environment variable overrides (SITEKEEPER_* prefix)
pub fn with_env_overrides(mut config: Config) -> Config {
    let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

    if let Some(v) = var("SITEKEEPER_STATE_DIR") {
        config.paths.state_dir = PathBuf::from(v);
    }
    if let Some(v) = var("SITEKEEPER_TEMPLATES_DIR") {
        config.paths.templates_dir = Some(PathBuf::from(v));
    }
    if let Some(v) = var("SITEKEEPER_AVAILABLE_DIR") {
        config.paths.available_dir = PathBuf::from(v);
    }
    if let Some(v) = var("SITEKEEPER_ENABLED_DIR") {
        config.paths.enabled_dir = PathBuf::from(v);
    }
    if let Some(v) = var("SITEKEEPER_BACKUP_DIR") {
        config.paths.backup_dir = Some(PathBuf::from(v));
    }

    // Commands are split on whitespace; use the config file for quoting.
    if let Some(v) = var("SITEKEEPER_TEST_COMMAND") {
        config.daemon.test_command = split_command(&v);
    }
    if let Some(v) = var("SITEKEEPER_RELOAD_COMMAND") {
        config.daemon.reload_command = split_command(&v);
    }
    if let Some(v) = var("SITEKEEPER_STATUS_COMMAND") {
        config.daemon.status_command = split_command(&v);
    }
    if let Some(v) = var("SITEKEEPER_ACTIVATION") {
        config.daemon.activation = match v.to_lowercase().as_str() {
            "copy" => ActivationMode::Copy,
            _ => ActivationMode::Symlink,
        };
    }

    if let Some(v) = var("SITEKEEPER_CERT_CLIENT") {
        config.certificates.client = v;
    }
    if let Some(v) = var("SITEKEEPER_CERT_ROOT") {
        config.certificates.cert_root = PathBuf::from(v);
    }
    if let Some(v) = var("SITEKEEPER_EMAIL") {
        config.certificates.email = Some(v);
    }
    if let Some(v) = var("SITEKEEPER_STAGING") {
        config.certificates.staging = v.to_lowercase() != "false" && v != "0";
    }

    if let Some(v) = var("SITEKEEPER_AUTHOR") {
        config.history.author = Some(v);
    }
    if let Some(v) = var("SITEKEEPER_LOG_FILE") {
        config.logging.file = Some(PathBuf::from(v));
    }

    config
}

fn split_command(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

fn find_line_number(content: &str, needle: &str) -> Option<usize> {
    content
        .lines()
        .position(|line| line.trim_start().starts_with(needle))
        .map(|i| i + 1)
}

fn suggest_key(unknown: &str) -> Option<String> {
    const CANDIDATES: &[&str] = &[
        "paths",
        "state_dir",
        "templates_dir",
        "available_dir",
        "enabled_dir",
        "managed_prefix",
        "backup_dir",
        "daemon",
        "test_command",
        "reload_command",
        "status_command",
        "timeout_secs",
        "activation",
        "certificates",
        "client",
        "cert_root",
        "email",
        "renew_before_days",
        "dns_plugin",
        "dns_credentials",
        "staging",
        "history",
        "default_branch",
        "author",
        "logging",
        "level",
        "file",
    ];

    CANDIDATES
        .iter()
        .map(|candidate| (*candidate, levenshtein(unknown, candidate)))
        .min_by_key(|(_, dist)| *dist)
        .filter(|(_, dist)| *dist <= 2)
        .map(|(candidate, _)| candidate.to_string())
}

fn levenshtein(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }

    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    let mut prev: Vec<usize> = (0..=b_bytes.len()).collect();
    let mut curr = vec![0usize; b_bytes.len() + 1];

    for (i, &ac) in a_bytes.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &bc) in b_bytes.iter().enumerate() {
            let cost = usize::from(ac != bc);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        prev.clone_from_slice(&curr);
    }

    prev[b_bytes.len()]
}

