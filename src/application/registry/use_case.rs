//! Domain Registry Use Case
//!
//! Owns the domain and certificate records. Reads load a fresh copy of the
//! document; every mutation goes through a [`RegistryWriter`], which holds
//! the registry-wide writer lock until it is committed or dropped.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::entities::{CertificateRecord, Domain, Registry};
use crate::domain::ports::RegistryStore;
use crate::domain::value_objects::DomainName;
use crate::error::{EngineError, EngineResult};

pub struct DomainRegistry {
    store: Arc<dyn RegistryStore>,
    writer: Mutex<()>,
}

impl DomainRegistry {
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self {
            store,
            writer: Mutex::new(()),
        }
    }

    pub fn load(&self) -> EngineResult<Registry> {
        Ok(self.store.load()?)
    }

    pub fn get(&self, name: &DomainName) -> EngineResult<Domain> {
        self.load()?
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::not_found("domain", name.as_str()))
    }

    pub fn list(&self) -> EngineResult<Vec<Domain>> {
        Ok(self.load()?.domains)
    }

    pub fn certificate(&self, name: &DomainName) -> EngineResult<Option<CertificateRecord>> {
        Ok(self.load()?.certificate(name).cloned())
    }

    /// Serialized registry document, as stored alongside each commit
    pub fn export(&self, registry: &Registry) -> EngineResult<Vec<u8>> {
        Ok(self.store.export(registry)?)
    }

    pub fn import(&self, bytes: &[u8]) -> EngineResult<Registry> {
        Ok(self.store.import(bytes)?)
    }

    /// Take the writer lock and load the current document
    pub fn lock(&self) -> EngineResult<RegistryWriter<'_>> {
        let guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let registry = self.store.load()?;
        Ok(RegistryWriter {
            registry,
            store: self.store.as_ref(),
            _guard: guard,
        })
    }
}

/// Pending registry changes; nothing is persisted until [`commit`](Self::commit)
pub struct RegistryWriter<'a> {
    registry: Registry,
    store: &'a dyn RegistryStore,
    _guard: MutexGuard<'a, ()>,
}

impl RegistryWriter<'_> {
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn add(&mut self, domain: Domain) -> EngineResult<()> {
        let name = domain.name.clone();
        if !self.registry.insert(domain) {
            return Err(EngineError::validation(format!(
                "domain '{}' already exists",
                name
            )));
        }
        Ok(())
    }

    /// Replace a record that must already exist
    pub fn replace(&mut self, domain: Domain) -> EngineResult<()> {
        if !self.registry.contains(&domain.name) {
            return Err(EngineError::not_found("domain", domain.name.as_str()));
        }
        self.registry.upsert(domain);
        Ok(())
    }

    pub fn delete(&mut self, name: &DomainName) -> EngineResult<Domain> {
        self.registry
            .remove(name)
            .ok_or_else(|| EngineError::not_found("domain", name.as_str()))
    }

    pub fn put_certificate(&mut self, record: CertificateRecord) {
        self.registry.upsert_certificate(record);
    }

    pub fn remove_certificate(&mut self, name: &DomainName) -> Option<CertificateRecord> {
        self.registry.remove_certificate(name)
    }

    /// Swap in a whole document (restore and checkout)
    pub fn replace_all(&mut self, registry: Registry) {
        self.registry = registry;
    }

    /// Persist atomically and release the lock
    pub fn commit(self) -> EngineResult<Registry> {
        self.store.save(&self.registry)?;
        Ok(self.registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::DomainPatch;
    use crate::domain::ports::RegistryError;
    use chrono::Utc;
    use crate::domain::value_objects::BackendPort;

    struct InMemoryRegistryStore {
        registry: Mutex<Registry>,
        saves: Mutex<usize>,
    }

    impl InMemoryRegistryStore {
        fn new() -> Self {
            Self {
                registry: Mutex::new(Registry::new()),
                saves: Mutex::new(0),
            }
        }
    }

    impl RegistryStore for InMemoryRegistryStore {
        fn load(&self) -> Result<Registry, RegistryError> {
            Ok(self.registry.lock().unwrap().clone())
        }

        fn save(&self, registry: &Registry) -> Result<(), RegistryError> {
            *self.registry.lock().unwrap() = registry.clone();
            *self.saves.lock().unwrap() += 1;
            Ok(())
        }

        fn export(&self, _registry: &Registry) -> Result<Vec<u8>, RegistryError> {
            Ok(Vec::new())
        }

        fn import(&self, _bytes: &[u8]) -> Result<Registry, RegistryError> {
            Ok(Registry::new())
        }
    }

    fn domain(name: &str, port: u32) -> Domain {
        Domain::new(DomainName::parse(name).unwrap(), BackendPort::new(port).unwrap())
    }

    fn registry() -> (Arc<InMemoryRegistryStore>, DomainRegistry) {
        let store = Arc::new(InMemoryRegistryStore::new());
        let reg = DomainRegistry::new(store.clone());
        (store, reg)
    }

    #[test]
    fn add_then_get() {
        let (_, reg) = registry();
        let mut w = reg.lock().unwrap();
        w.add(domain("a.com", 3000)).unwrap();
        w.commit().unwrap();

        let got = reg.get(&DomainName::parse("a.com").unwrap()).unwrap();
        assert_eq!(got.port.get(), 3000);
        assert_eq!(reg.list().unwrap().len(), 1);
    }

    #[test]
    fn duplicate_add_is_validation_error() {
        let (_, reg) = registry();
        let mut w = reg.lock().unwrap();
        w.add(domain("a.com", 3000)).unwrap();
        let err = w.add(domain("a.com", 4000)).unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));
    }

    #[test]
    fn replace_missing_is_not_found() {
        let (_, reg) = registry();
        let mut w = reg.lock().unwrap();
        let err = w.replace(domain("nope.com", 3000)).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { kind: "domain", .. }));
    }

    #[test]
    fn dropped_writer_persists_nothing() {
        let (store, reg) = registry();
        {
            let mut w = reg.lock().unwrap();
            w.add(domain("a.com", 3000)).unwrap();
        }
        assert_eq!(*store.saves.lock().unwrap(), 0);
        assert!(reg.list().unwrap().is_empty());
    }

    #[test]
    fn replace_patched_keeps_order_and_bumps_updated_at() {
        let (_, reg) = registry();
        let mut w = reg.lock().unwrap();
        w.add(domain("a.com", 3000)).unwrap();
        w.add(domain("b.com", 3001)).unwrap();
        let later = Utc::now() + chrono::Duration::seconds(5);
        let patch = DomainPatch {
            port: Some(BackendPort::new(4000).unwrap()),
            ..Default::default()
        };
        let edited = domain("a.com", 3000).patched(&patch, later);
        assert_eq!(edited.updated_at, later);
        w.replace(edited).unwrap();
        let saved = w.commit().unwrap();
        assert_eq!(saved.domains[0].name.as_str(), "a.com");
        assert_eq!(saved.domains[0].port.get(), 4000);
        assert_eq!(saved.domains[1].name.as_str(), "b.com");
    }
}
