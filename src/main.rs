//! Sitekeeper CLI - reverse-proxy domain and TLS certificate manager
//!
//! Usage: sitekeeper <COMMAND>
//!
//! Commands:
//!   add, edit, delete, apply   Change a domain and deploy it
//!   list, show                 Inspect the registry
//!   certs                      Check and renew certificates
//!   history                    Log, diff, branch, checkout, commit, prune
//!   backup                     Create, list and restore archives
//!   doctor                     Check the daemon, the certificate client and state

mod commands;

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sitekeeper::application::CancelToken;
use sitekeeper::config::{Config, ConfigError, LoggingConfig};
use sitekeeper::presentation::cli::{CertCommands, Cli, Commands};
use sitekeeper::presentation::output;
use sitekeeper::EngineError;

use commands::domain::{AddArgs, EditArgs};
use commands::Context;

fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(err) = run(cli) {
        print_error(&err, json);
        std::process::exit(exit_code(&err));
    }
}

fn run(cli: Cli) -> Result<()> {
    let (config, warnings) = Config::discover(cli.config.as_deref())?;
    init_logging(cli.verbose, &config.logging)?;
    for warning in &warnings {
        tracing::warn!("{}", warning);
    }

    // Ctrl+C before the reload point abandons the operation cleanly
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        tracing::warn!(error = %e, "could not install Ctrl+C handler");
    }

    let ctx = Context::new(config, cli.json, cli.verbose, cancel);

    match cli.command {
        Commands::Add {
            domain,
            port,
            backend,
            tls,
            template,
            message,
        } => commands::domain::cmd_add(
            &ctx,
            AddArgs {
                domain,
                port,
                backend,
                tls,
                template,
                message: message.message,
            },
        ),
        Commands::Edit {
            domain,
            port,
            backend,
            tls,
            no_tls,
            template,
            default_template,
            message,
        } => commands::domain::cmd_edit(
            &ctx,
            EditArgs {
                domain,
                port,
                backend,
                tls,
                no_tls,
                template,
                default_template,
                message: message.message,
            },
        ),
        Commands::Delete {
            domain,
            purge_cert,
            message,
        } => commands::domain::cmd_delete(&ctx, &domain, purge_cert, message.message),
        Commands::Apply { domain, message } => {
            commands::domain::cmd_apply(&ctx, &domain, message.message)
        }
        Commands::List => commands::domain::cmd_list(&ctx),
        Commands::Show { domain, rendered } => commands::domain::cmd_show(&ctx, &domain, rendered),
        Commands::Certs(CertCommands::Check) => commands::certs::cmd_check(&ctx),
        Commands::Certs(CertCommands::Renew { domain, due, force }) => {
            commands::certs::cmd_renew(&ctx, domain.as_deref(), due, force)
        }
        Commands::History(command) => commands::history::cmd_history(&ctx, command),
        Commands::Backup(command) => commands::backup::cmd_backup(&ctx, command),
        Commands::Doctor => commands::doctor::cmd_doctor(&ctx),
    }
}

/// `-v` wins over `SITEKEEPER_LOG`, which wins over `[logging] level`
fn init_logging(verbose: u8, logging: &LoggingConfig) -> Result<()> {
    let filter = match verbose {
        0 => EnvFilter::try_from_env("SITEKEEPER_LOG").unwrap_or_else(|_| {
            EnvFilter::new(logging.level.as_deref().unwrap_or("warn"))
        }),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match &logging.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(engine) = err.downcast_ref::<EngineError>() {
        return engine.exit_code();
    }
    if err.downcast_ref::<ConfigError>().is_some() {
        return 2;
    }
    1
}

fn print_error(err: &anyhow::Error, json: bool) {
    if json {
        let engine = err.downcast_ref::<EngineError>();
        let _ = output::emit(serde_json::json!({
            "event": "error",
            "kind": engine.map(|e| e.kind()).unwrap_or("error"),
            "message": err.to_string(),
            "diagnostics": engine.and_then(|e| e.diagnostics()),
            "exit_code": exit_code(err),
        }));
        return;
    }
    eprintln!("[ERROR] {}", err);
}
