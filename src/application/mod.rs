//! Application Layer
//!
//! Use cases that orchestrate the business flow.
//! This layer:
//! - Depends on Domain layer (entities, services, ports)
//! - Does NOT contain business rules (those are in Domain)
//! - Coordinates between Infrastructure and Domain
//!
//! ## Use Cases
//!
//! - `DeployUseCase` - Every change to the managed configuration (add, edit,
//!   remove, renew, checkout, restore) with validation and rollback
//! - `DomainRegistry` - Serialized access to the registry document
//! - `VersionControl` - Snapshots, commits, branches and refs
//! - `CertificateProvisioner` - Certificate lifecycle against the client
//! - `BackupManager` - Archive and restore registry, tree and certificates
//! - `Doctor` - Environment checks

pub mod backup;
pub mod certificates;
pub mod deploy;
pub mod doctor;
pub mod history;
pub mod locks;
pub mod registry;

pub use backup::{BackupInfo, BackupManager, Manifest};
pub use certificates::{CertAction, CertificateProvisioner, Provision, ProvisionSettings};
pub use deploy::{
    ApplyOptions, ApplyReport, DeployUseCase, DomainRequest, EditRequest, RemoveOptions,
    RemoveReport, RenewOutcome, RestoreReport,
};
pub use doctor::{CheckStatus, Doctor, DoctorCheck, DoctorReport};
pub use history::{
    BranchInfo, CommitLog, HistoryStats, HistoryStatus, PruneReport, VersionControl, HEAD,
};
pub use locks::{CancelToken, OperationGuard, OperationLocks};
pub use registry::{DomainRegistry, RegistryWriter};
