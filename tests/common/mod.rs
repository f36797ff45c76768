//! Common test utilities for sitekeeper scenario and CLI tests.
//!
//! This module provides:
//! - `Engine`: the deploy use case over temp directories with scripted fakes
//!   for the daemon and the certificate client
//! - `TestEnv`: isolated temp directory plus helpers to run the CLI binary

#![allow(dead_code)]

pub mod engine;
pub mod env;

pub use engine::*;
pub use env::*;
