//! Use Case Factory
//!
//! Creates use cases with infrastructure dependencies wired up.
//! This is the dependency injection point for the application.

use std::sync::Arc;

use crate::application::{
    BackupManager, CertificateProvisioner, DeployUseCase, Doctor, DomainRegistry,
    ProvisionSettings, VersionControl,
};
use crate::config::Config;
use crate::domain::ports::DeployEventSink;
use crate::infrastructure::{
    CertbotClient, CommandDaemon, FanoutEventSink, FsHistoryStore, FsTemplateSource,
    JsonEventSink, JsonRegistryStore, LocalFs, TracingEventSink, X509Inspector,
};

/// Type alias for the concrete DeployUseCase with all dependencies
pub type ConcreteDeployUseCase = DeployUseCase<LocalFs>;

/// Create a deploy use case with all dependencies wired up
///
/// With `json` set, engine events are also streamed as NDJSON on stderr.
pub fn create_deploy_use_case(config: &Config, json: bool) -> ConcreteDeployUseCase {
    let paths = &config.paths;

    let registry = DomainRegistry::new(Arc::new(JsonRegistryStore::with_path(
        paths.registry_path(),
    )));
    let history = VersionControl::new(
        Arc::new(FsHistoryStore::new(paths.history_dir())),
        config.history.default_branch.clone(),
        config.history.author(),
    );
    let certificates = CertificateProvisioner::new(
        Arc::new(CertbotClient::from_config(&config.certificates)),
        Arc::new(X509Inspector),
        ProvisionSettings::from_config(&config.certificates),
    );

    DeployUseCase::new(
        LocalFs::new(),
        paths.layout(),
        registry,
        history,
        Arc::new(CommandDaemon::from_config(&config.daemon)),
        certificates,
        Arc::new(FsTemplateSource::new(paths.templates_dir())),
    )
    .with_activation(config.daemon.activation)
    .with_events(create_event_sink(json))
}

/// Tracing always; NDJSON on stderr when `json` is set
pub fn create_event_sink(json: bool) -> Arc<dyn DeployEventSink> {
    if json {
        Arc::new(FanoutEventSink::new(vec![
            Box::new(TracingEventSink),
            Box::new(JsonEventSink::stderr()),
        ]))
    } else {
        Arc::new(TracingEventSink)
    }
}

/// Backup manager writing to the configured backup directory
pub fn create_backup_manager<'a>(
    config: &Config,
    deploy: &'a ConcreteDeployUseCase,
) -> BackupManager<'a, LocalFs> {
    BackupManager::new(deploy, config.paths.backup_dir())
}

/// Doctor checking the configured certificate client
pub fn create_doctor<'a>(config: &Config, deploy: &'a ConcreteDeployUseCase) -> Doctor<'a, LocalFs> {
    Doctor::new(
        deploy,
        config.certificates.client.clone(),
        config.daemon.timeout(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config_in(root: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.paths.state_dir = root.join("state");
        config.paths.available_dir = root.join("available");
        config.paths.enabled_dir = root.join("enabled");
        config
    }

    #[test]
    fn create_deploy_use_case_uses_configured_paths() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let use_case = create_deploy_use_case(&config, false);

        assert_eq!(use_case.layout().available_dir(), dir.path().join("available"));
        assert_eq!(use_case.history().default_branch(), "main");
        assert!(use_case.registry().list().unwrap().is_empty());
    }

    #[test]
    fn backup_manager_uses_backup_dir() {
        let dir = tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.paths.backup_dir = Some(dir.path().join("archives"));
        let use_case = create_deploy_use_case(&config, true);

        let manager = create_backup_manager(&config, &use_case);
        assert_eq!(manager.dir(), dir.path().join("archives"));
    }
}
