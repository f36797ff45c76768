//! Registry entity
//!
//! The authoritative list of managed domains plus their certificate records.
//! Domain order is insertion order and is preserved through persistence.

use super::certificate::CertificateRecord;
use super::site::Domain;
use crate::domain::value_objects::DomainName;

pub const REGISTRY_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    pub version: u32,
    pub domains: Vec<Domain>,
    pub certificates: Vec<CertificateRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            version: REGISTRY_VERSION,
            domains: Vec::new(),
            certificates: Vec::new(),
        }
    }

    pub fn get(&self, name: &DomainName) -> Option<&Domain> {
        self.domains.iter().find(|d| &d.name == name)
    }

    pub fn contains(&self, name: &DomainName) -> bool {
        self.get(name).is_some()
    }

    /// Append a new domain; returns `false` if the name is already taken
    pub fn insert(&mut self, domain: Domain) -> bool {
        if self.contains(&domain.name) {
            return false;
        }
        self.domains.push(domain);
        true
    }

    /// Replace an existing domain in place, or append it
    pub fn upsert(&mut self, domain: Domain) {
        if let Some(existing) = self.domains.iter_mut().find(|d| d.name == domain.name) {
            *existing = domain;
        } else {
            self.domains.push(domain);
        }
    }

    /// Remove a domain and its certificate record
    pub fn remove(&mut self, name: &DomainName) -> Option<Domain> {
        let index = self.domains.iter().position(|d| &d.name == name)?;
        self.certificates.retain(|c| &c.domain != name);
        Some(self.domains.remove(index))
    }

    pub fn certificate(&self, name: &DomainName) -> Option<&CertificateRecord> {
        self.certificates.iter().find(|c| &c.domain == name)
    }

    pub fn upsert_certificate(&mut self, record: CertificateRecord) {
        if let Some(existing) = self
            .certificates
            .iter_mut()
            .find(|c| c.domain == record.domain)
        {
            *existing = record;
        } else {
            self.certificates.push(record);
        }
    }

    pub fn remove_certificate(&mut self, name: &DomainName) -> Option<CertificateRecord> {
        let index = self.certificates.iter().position(|c| &c.domain == name)?;
        Some(self.certificates.remove(index))
    }

    pub fn all(&self) -> &[Domain] {
        &self.domains
    }
}
