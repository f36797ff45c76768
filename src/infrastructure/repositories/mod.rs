//! Repository Implementations
//!
//! Concrete implementations of the registry and history storage ports.

mod history;
mod registry;

pub use history::FsHistoryStore;
pub use registry::JsonRegistryStore;
