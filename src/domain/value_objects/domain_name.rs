//! Domain name value object
//!
//! Hostnames are normalised to lowercase on parse. A leading `*.` marks a
//! wildcard name; everything after it is the base name the certificate is
//! issued for.

use std::fmt;

/// Longest accepted hostname, in bytes
pub const MAX_NAME_LEN: usize = 253;
/// Longest accepted label, in bytes
pub const MAX_LABEL_LEN: usize = 63;

const WILDCARD_PREFIX: &str = "*.";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainNameError {
    #[error("domain name is empty")]
    Empty,

    #[error("domain name is {len} characters long (maximum {MAX_NAME_LEN})")]
    TooLong { len: usize },

    #[error("label '{label}' in '{name}' {reason}")]
    InvalidLabel {
        name: String,
        label: String,
        reason: &'static str,
    },

    #[error("wildcard '{name}' needs a base with at least two labels, e.g. *.example.com")]
    WildcardBase { name: String },
}

/// A validated, lowercase hostname
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainName(String);

impl DomainName {
    pub fn parse(raw: &str) -> Result<Self, DomainNameError> {
        let name = raw.trim().trim_end_matches('.').to_ascii_lowercase();
        if name.is_empty() {
            return Err(DomainNameError::Empty);
        }
        if name.len() > MAX_NAME_LEN {
            return Err(DomainNameError::TooLong { len: name.len() });
        }

        let base = name.strip_prefix(WILDCARD_PREFIX).unwrap_or(&name);
        if base.len() != name.len() && base.split('.').count() < 2 {
            return Err(DomainNameError::WildcardBase { name: name.clone() });
        }

        for label in base.split('.') {
            if let Some(reason) = label_problem(label) {
                return Err(DomainNameError::InvalidLabel {
                    name: name.clone(),
                    label: label.to_string(),
                    reason,
                });
            }
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.0.starts_with(WILDCARD_PREFIX)
    }

    /// Name without the wildcard prefix; certificates are filed under it
    pub fn base(&self) -> &str {
        self.0.strip_prefix(WILDCARD_PREFIX).unwrap_or(&self.0)
    }

    /// File-system safe form (`*` becomes `_wildcard`)
    pub fn file_stem(&self) -> String {
        self.0.replace('*', "_wildcard")
    }
}

/// Returns why a single label is invalid, or `None` when it is fine
pub fn label_problem(label: &str) -> Option<&'static str> {
    if label.is_empty() {
        return Some("is empty");
    }
    if label.len() > MAX_LABEL_LEN {
        return Some("is longer than 63 characters");
    }
    if !label
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Some("contains characters other than letters, digits and '-'");
    }
    if label.starts_with('-') || label.ends_with('-') {
        return Some("starts or ends with '-'");
    }
    None
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for DomainName {
    type Err = DomainNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for DomainName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
