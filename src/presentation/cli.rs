//! CLI Argument Parsing
//!
//! This module defines the CLI interface using clap.
//!
//! ## Design Notes
//!
//! - Global flags (--config, --json, --verbose) are inherited by all subcommands
//! - Every command that changes the managed configuration accepts `-m` for the
//!   commit message

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Sitekeeper - reverse-proxy domain and TLS certificate manager
#[derive(Parser, Debug)]
#[command(name = "sitekeeper")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (default: SITEKEEPER_CONFIG, /etc/sitekeeper/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format for scripts
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register a domain and put it live
    Add {
        /// Domain name (`example.com`, `*.example.com`)
        domain: String,

        /// Backend port to proxy to
        #[arg(short, long)]
        port: u32,

        /// Backend address (default: 127.0.0.1)
        #[arg(short, long, value_name = "ADDR")]
        backend: Option<String>,

        /// Obtain a certificate and serve HTTPS
        #[arg(long)]
        tls: bool,

        /// Template name from the templates directory
        #[arg(long)]
        template: Option<String>,

        #[command(flatten)]
        message: MessageArg,
    },

    /// Change a registered domain and redeploy it
    Edit {
        domain: String,

        #[arg(short, long)]
        port: Option<u32>,

        #[arg(short, long, value_name = "ADDR")]
        backend: Option<String>,

        /// Turn TLS on
        #[arg(long, conflicts_with = "no_tls")]
        tls: bool,

        /// Turn TLS off
        #[arg(long)]
        no_tls: bool,

        /// Use a named template
        #[arg(long, conflicts_with = "default_template")]
        template: Option<String>,

        /// Go back to the built-in template
        #[arg(long)]
        default_template: bool,

        #[command(flatten)]
        message: MessageArg,
    },

    /// Take a domain offline and unregister it
    #[command(alias = "remove")]
    Delete {
        domain: String,

        /// Also delete the certificate from the certificate client
        #[arg(long)]
        purge_cert: bool,

        #[command(flatten)]
        message: MessageArg,
    },

    /// Render and deploy a registered domain again
    Apply {
        domain: String,

        #[command(flatten)]
        message: MessageArg,
    },

    /// List registered domains
    List,

    /// Show one domain
    Show {
        domain: String,

        /// Print the rendered configuration instead of the summary
        #[arg(long)]
        rendered: bool,
    },

    /// Certificate maintenance
    #[command(subcommand)]
    Certs(CertCommands),

    /// Configuration history
    #[command(subcommand)]
    History(HistoryCommands),

    /// Archive and restore registry, configuration and certificates
    #[command(subcommand)]
    Backup(BackupCommands),

    /// Check the daemon, the certificate client and local state
    Doctor,
}

#[derive(Args, Debug, Clone, Default)]
pub struct MessageArg {
    /// Commit message
    #[arg(short, long)]
    pub message: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum CertCommands {
    /// Re-read expiry dates and show certificate states
    Check,

    /// Renew one certificate, or every certificate that is due
    Renew {
        /// Domain to renew
        #[arg(required_unless_present = "due", conflicts_with = "due")]
        domain: Option<String>,

        /// Renew every TLS domain inside the renewal window
        #[arg(long)]
        due: bool,

        /// Renew even when the certificate is not due
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommands {
    /// Commits reachable from a branch or commit, newest first
    Log {
        /// Branch or commit (default: HEAD)
        reference: Option<String>,

        /// Show at most N commits
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Changes between two commits
    Diff {
        from: String,

        /// Default: HEAD
        to: Option<String>,

        /// Include line diffs of changed files
        #[arg(long)]
        patch: bool,
    },

    /// Commit details and its changes
    Show {
        /// Default: HEAD
        reference: Option<String>,
    },

    /// List, create or delete branches
    Branch {
        #[command(subcommand)]
        action: Option<BranchCommands>,
    },

    /// List, create or delete tags
    Tag {
        #[command(subcommand)]
        action: Option<TagCommands>,
    },

    /// Commit counts, refs and store size
    Stats,

    /// Restore the configuration of a branch or commit
    Checkout {
        reference: String,

        #[command(flatten)]
        message: MessageArg,
    },

    /// Record the live configuration as a commit
    Commit {
        #[arg(short, long)]
        message: String,
    },

    /// Current branch, head and drift of the live configuration
    Status,

    /// Drop commits and blobs no branch or tag can reach
    Prune,
}

#[derive(Subcommand, Debug)]
pub enum BranchCommands {
    List,

    Create {
        name: String,

        /// Start point (default: HEAD)
        #[arg(long)]
        from: Option<String>,
    },

    Delete { name: String },
}

#[derive(Subcommand, Debug)]
pub enum TagCommands {
    List,

    Create {
        name: String,

        /// Commit to tag (default: HEAD)
        reference: Option<String>,

        #[arg(short, long, default_value = "")]
        message: String,
    },

    Delete { name: String },
}

#[derive(Subcommand, Debug)]
pub enum BackupCommands {
    /// Write a new archive to the backup directory
    Create,

    /// Archives in the backup directory, newest first
    List,

    /// Verify an archive and deploy its contents
    Restore {
        /// Archive path, or a file name inside the backup directory
        archive: PathBuf,

        #[command(flatten)]
        message: MessageArg,
    },
}
