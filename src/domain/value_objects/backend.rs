//! Upstream endpoint value objects

use std::fmt;
use std::net::IpAddr;

use super::domain_name::label_problem;

/// Upstream TCP port, 1..=65535
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendPort(u16);

impl BackendPort {
    pub fn new(port: u32) -> Result<Self, String> {
        match u16::try_from(port) {
            Ok(p) if p != 0 => Ok(Self(p)),
            _ => Err(format!("port {} is outside 1-65535", port)),
        }
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for BackendPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for BackendPort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u32 = s
            .trim()
            .parse()
            .map_err(|_| format!("'{}' is not a port number", s))?;
        Self::new(value)
    }
}

/// Upstream host: an IP address or a hostname
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendAddress(String);

impl BackendAddress {
    pub const LOOPBACK: &'static str = "127.0.0.1";

    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if raw.parse::<IpAddr>().is_ok() {
            return Ok(Self(raw.to_string()));
        }
        if raw.is_empty() || raw.len() > super::domain_name::MAX_NAME_LEN {
            return Err(format!("'{}' is not a valid backend address", raw));
        }
        match raw.split('.').find_map(label_problem) {
            Some(reason) => Err(format!(
                "backend address '{}' is not an IP address and a label {}",
                raw, reason
            )),
            None => Ok(Self(raw.to_ascii_lowercase())),
        }
    }

    pub fn loopback() -> Self {
        Self(Self::LOOPBACK.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Host part usable inside a URL (IPv6 addresses get brackets)
    pub fn url_host(&self) -> String {
        match self.0.parse::<IpAddr>() {
            Ok(IpAddr::V6(_)) => format!("[{}]", self.0),
            _ => self.0.clone(),
        }
    }
}

impl Default for BackendAddress {
    fn default() -> Self {
        Self::loopback()
    }
}

impl fmt::Display for BackendAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for BackendAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_bounds() {
        assert!(BackendPort::new(80).is_ok());
        assert!(BackendPort::new(8080).is_ok());
        assert!(BackendPort::new(65535).is_ok());
        assert!(BackendPort::new(0).is_err());
        assert!(BackendPort::new(65536).is_err());
        assert!("-1".parse::<BackendPort>().is_err());
        assert_eq!("3000".parse::<BackendPort>().unwrap().get(), 3000);
    }

    #[test]
    fn address_accepts_ips_and_hostnames() {
        assert_eq!(BackendAddress::parse("10.0.0.5").unwrap().as_str(), "10.0.0.5");
        assert_eq!(BackendAddress::parse("App-1.internal").unwrap().as_str(), "app-1.internal");
        assert_eq!(BackendAddress::parse("::1").unwrap().url_host(), "[::1]");
        assert_eq!(BackendAddress::default().as_str(), "127.0.0.1");
    }

    #[test]
    fn address_rejects_garbage() {
        assert!(BackendAddress::parse("").is_err());
        assert!(BackendAddress::parse("bad host").is_err());
        assert!(BackendAddress::parse("-x.internal").is_err());
    }
}
