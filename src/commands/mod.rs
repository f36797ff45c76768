//! Command handlers
//!
//! Each handler loads what it needs through the factory, calls one use case
//! and prints either the text view or a JSON document.

pub mod backup;
pub mod certs;
pub mod doctor;
pub mod domain;
pub mod history;

use anyhow::Result;

use sitekeeper::application::{ApplyOptions, CancelToken, RemoveOptions};
use sitekeeper::config::Config;
use sitekeeper::presentation::factory::{self, ConcreteDeployUseCase};
use sitekeeper::presentation::output::{self, OutputFormat, TextRenderer};

/// Everything a handler needs from the command line and the environment
pub struct Context {
    pub config: Config,
    pub format: OutputFormat,
    pub renderer: TextRenderer,
    pub cancel: CancelToken,
}

impl Context {
    pub fn new(config: Config, json: bool, verbose: u8, cancel: CancelToken) -> Self {
        Self {
            config,
            format: OutputFormat::from_flag(json),
            renderer: TextRenderer::new(supports_unicode(), verbose),
            cancel,
        }
    }

    pub fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    pub fn deploy(&self) -> ConcreteDeployUseCase {
        factory::create_deploy_use_case(&self.config, self.json())
    }

    pub fn apply_options(&self, message: Option<String>) -> ApplyOptions {
        let options = ApplyOptions::new().with_cancel(self.cancel.clone());
        match message {
            Some(message) => options.with_message(message),
            None => options,
        }
    }

    pub fn remove_options(&self, message: Option<String>, purge: bool) -> RemoveOptions {
        let options = RemoveOptions::new()
            .with_cancel(self.cancel.clone())
            .with_purge_certificate(purge);
        match message {
            Some(message) => options.with_message(message),
            None => options,
        }
    }

    /// Print the text view, or the JSON document with `--json`
    pub fn print(&self, text: impl FnOnce() -> String, json: impl FnOnce() -> serde_json::Value) -> Result<()> {
        if self.json() {
            output::emit(json())?;
        } else {
            print!("{}", text());
        }
        Ok(())
    }
}

fn supports_unicode() -> bool {
    std::env::var("TERM").map_or(true, |term| term != "dumb")
}
