//! Domain Layer
//!
//! Pure business logic for the configuration change engine.
//!
//! ## Structure
//!
//! - `entities/` - Domains, certificates, registry, snapshots, commits
//! - `value_objects/` - Validated names, ports, hashes, directory layout
//! - `services/` - Template rendering and tree diffing
//! - `ports/` - Interfaces for the daemon, certificate client and stores
//!
//! Nothing in here touches the file system or spawns processes; all I/O goes
//! through the traits in `ports`.

pub mod entities;
pub mod ports;
pub mod services;
pub mod value_objects;
