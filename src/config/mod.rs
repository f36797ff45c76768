//! Configuration module for Sitekeeper
//!
//! Resolution order:
//! 1. `--config <path>` (highest priority)
//! 2. `SITEKEEPER_CONFIG`
//! 3. `/etc/sitekeeper/config.toml`
//! 4. `<user config dir>/sitekeeper/config.toml`
//! 5. Built-in defaults
//!
//! `SITEKEEPER_*` environment variables override individual keys of
//! whichever file was chosen.

mod loader;
mod types;

pub use crate::domain::value_objects::ConfigWarning;

pub use loader::{lookup_chain, ConfigError, SYSTEM_CONFIG_PATH};
pub use types::{
    ActivationMode, CertificatesConfig, Config, DaemonConfig, HistoryConfig, LoggingConfig,
    PathsConfig,
};
