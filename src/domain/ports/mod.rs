//! Domain Ports (Interfaces)
//!
//! These traits define the boundaries of the domain layer.
//! Infrastructure layer provides concrete implementations.

pub mod certificate_client;
pub mod daemon;
pub mod deploy_events;
pub mod file_system;
pub mod history_store;
pub mod registry_store;
pub mod template_source;

pub use certificate_client::{
    CertClientError, CertificateClient, CertificateInspector, CertificatePaths,
    CertificateRequest, DnsCredentials,
};
pub use daemon::{DaemonControl, DaemonError, DaemonStatus};
pub use deploy_events::{DeployEvent, DeployEventSink, DeployStage, NoopEventSink};
pub use file_system::{Entry, FileSystem, FsError, FsResult};
pub use history_store::{HistoryError, HistoryStore};
pub use registry_store::{RegistryError, RegistryStore};
pub use template_source::{TemplateError, TemplateSource};
