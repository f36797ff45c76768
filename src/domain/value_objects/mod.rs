//! Domain Value Objects
//!
//! Immutable, validated value types. Parsing happens once at the edge; the
//! rest of the engine can rely on these being well-formed.

mod backend;
mod config_warning;
mod domain_name;
mod hash;
mod layout;

pub use backend::{BackendAddress, BackendPort};
pub use config_warning::ConfigWarning;
pub use domain_name::{label_problem, DomainName, DomainNameError, MAX_LABEL_LEN, MAX_NAME_LEN};
pub use hash::ContentHash;
pub use layout::{SiteLayout, AVAILABLE_KEY, ENABLED_KEY};
