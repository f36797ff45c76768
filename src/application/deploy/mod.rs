//! Deploy Module
//!
//! Orchestrates every change to the managed configuration: rendering,
//! staging, daemon validation and reload, rollback and the history commit.
//!
//! ## Structure
//!
//! - `options` - Requests and per-call options (`DomainRequest`, `ApplyOptions`)
//! - `result` - Reports (`ApplyReport`, `RemoveReport`, `RestoreReport`)
//! - `use_case` - Core orchestration (`DeployUseCase`)
//!
//! ## Usage
//!
//! ```ignore
//! use sitekeeper::application::deploy::{ApplyOptions, DeployUseCase, DomainRequest};
//!
//! let deploy = DeployUseCase::new(fs, layout, registry, history, daemon, certs, templates);
//! let report = deploy.add(DomainRequest::new("app.example.com", 3000), &ApplyOptions::new())?;
//! ```

mod options;
mod result;
mod use_case;

pub use options::{parse_name, ApplyOptions, DomainRequest, EditRequest, RemoveOptions};
pub use result::{ApplyReport, RemoveReport, RenewOutcome, RestoreReport};
pub use use_case::DeployUseCase;
