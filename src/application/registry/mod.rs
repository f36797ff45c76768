//! Domain Registry
//!
//! - `use_case` - [`DomainRegistry`] and its lock-holding [`RegistryWriter`]

mod use_case;

pub use use_case::{DomainRegistry, RegistryWriter};
