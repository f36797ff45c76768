//! Infrastructure Layer
//!
//! Concrete implementations of domain ports.
//! This layer handles all I/O operations.
//!
//! ## Structure
//!
//! - `fs/` - Local file system with atomic writes and link replacement
//! - `repositories/` - Registry (JSON) and history (content-addressed) stores
//! - `daemon/` - Reverse-proxy control through external commands
//! - `certs/` - certbot client and X.509 expiry inspection
//! - `events/` - Event sinks (NDJSON, tracing)
//! - `templates` - Named templates on disk
//! - `archive` - tar.gz backup archives

pub mod archive;
pub mod certs;
pub mod daemon;
pub mod events;
pub mod fs;
pub mod repositories;
pub mod templates;

pub use certs::{CertbotClient, X509Inspector};
pub use daemon::CommandDaemon;
pub use events::{FanoutEventSink, JsonEventSink, TracingEventSink};
pub use fs::LocalFs;
pub use repositories::{FsHistoryStore, JsonRegistryStore};
pub use templates::FsTemplateSource;
