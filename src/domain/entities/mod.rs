//! Domain Entities
//!
//! - `Domain` - a hostname routed to an upstream endpoint
//! - `CertificateRecord` - TLS material for a domain and its lifecycle state
//! - `Registry` - the authoritative set of domains and certificates
//! - `Snapshot` / `ConfigTree` - managed configuration, by hash and by content
//! - `Commit` / `Refs` - the history graph

mod certificate;
mod commit;
mod registry;
mod site;
mod tree;

pub use certificate::{CertState, CertificateRecord, InvalidTransition};
pub use commit::{
    validate_branch_name, validate_tag_name, Commit, CommitId, Outcome, Refs, Tag, MIN_SHORT_ID,
};
pub use registry::{Registry, REGISTRY_VERSION};
pub use site::{Domain, DomainPatch, IssuanceMode};
pub use tree::{ConfigTree, EntryKind, Snapshot, SnapshotEntry, TreeEntry};
