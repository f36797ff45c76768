//! Managed directory layout
//!
//! The daemon reads site configurations from the `enabled` directory; files
//! are rendered into `available` and referenced from `enabled`. Only entries
//! whose file name carries the managed prefix belong to us. Snapshot entries
//! use the relative keys `available/<file>` and `enabled/<file>`.

use std::path::{Path, PathBuf};

use super::DomainName;

pub const AVAILABLE_KEY: &str = "available";
pub const ENABLED_KEY: &str = "enabled";

const CONF_SUFFIX: &str = ".conf";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteLayout {
    available_dir: PathBuf,
    enabled_dir: PathBuf,
    prefix: String,
    /// Tool state directory, exposed to templates
    managed_root: Option<PathBuf>,
}

impl SiteLayout {
    pub fn new(
        available_dir: impl Into<PathBuf>,
        enabled_dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            available_dir: available_dir.into(),
            enabled_dir: enabled_dir.into(),
            prefix: prefix.into(),
            managed_root: None,
        }
    }

    pub fn with_managed_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.managed_root = Some(root.into());
        self
    }

    pub fn managed_root(&self) -> Option<&Path> {
        self.managed_root.as_deref()
    }

    pub fn available_dir(&self) -> &Path {
        &self.available_dir
    }

    pub fn enabled_dir(&self) -> &Path {
        &self.enabled_dir
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn file_name(&self, name: &DomainName) -> String {
        format!("{}{}{}", self.prefix, name.file_stem(), CONF_SUFFIX)
    }

    pub fn available_path(&self, name: &DomainName) -> PathBuf {
        self.available_dir.join(self.file_name(name))
    }

    pub fn enabled_path(&self, name: &DomainName) -> PathBuf {
        self.enabled_dir.join(self.file_name(name))
    }

    pub fn available_key(&self, name: &DomainName) -> String {
        format!("{}/{}", AVAILABLE_KEY, self.file_name(name))
    }

    pub fn enabled_key(&self, name: &DomainName) -> String {
        format!("{}/{}", ENABLED_KEY, self.file_name(name))
    }

    /// Whether a file name in either directory is owned by this tool
    pub fn is_managed(&self, file_name: &str) -> bool {
        file_name.starts_with(&self.prefix)
            && file_name.ends_with(CONF_SUFFIX)
            && file_name.len() > self.prefix.len() + CONF_SUFFIX.len()
            && !file_name.contains('/')
    }

    /// Map a relative snapshot key back to an absolute path.
    ///
    /// Returns `None` for keys outside the two managed directories or for
    /// file names without the managed prefix.
    pub fn resolve_key(&self, key: &str) -> Option<PathBuf> {
        let (dir, file) = key.split_once('/')?;
        if !self.is_managed(file) {
            return None;
        }
        match dir {
            AVAILABLE_KEY => Some(self.available_dir.join(file)),
            ENABLED_KEY => Some(self.enabled_dir.join(file)),
            _ => None,
        }
    }
}
