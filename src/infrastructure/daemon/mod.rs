//! Reverse-proxy daemon control through external commands

mod command;
mod process;

pub use command::CommandDaemon;
pub use process::{run_with_timeout, CommandOutput, RunError};
