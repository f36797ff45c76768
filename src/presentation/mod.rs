//! Presentation Layer
//!
//! This layer handles:
//! - CLI argument parsing (via clap)
//! - Creating use cases with infrastructure dependencies
//! - Output formatting (text/JSON)
//!
//! ## Structure
//!
//! - `cli` - Command line definition
//! - `factory` - Creates use cases with proper dependencies (dependency injection)
//! - `output` - Text views and JSON documents
//!
//! ## Usage
//!
//! ```ignore
//! use sitekeeper::presentation::factory;
//!
//! let (config, _warnings) = sitekeeper::Config::discover(None)?;
//! let deploy = factory::create_deploy_use_case(&config, false);
//! let report = deploy.apply("example.com", &ApplyOptions::new())?;
//! ```

pub mod cli;
pub mod factory;
pub mod output;

pub use cli::Cli;
pub use factory::create_deploy_use_case;
pub use output::{OutputFormat, TextRenderer};
