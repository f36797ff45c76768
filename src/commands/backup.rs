//! Backup command handlers

use anyhow::Result;
use serde_json::json;

use sitekeeper::presentation::cli::BackupCommands;
use sitekeeper::presentation::factory;
use sitekeeper::presentation::output;

use super::Context;

pub fn cmd_backup(ctx: &Context, command: BackupCommands) -> Result<()> {
    let deploy = ctx.deploy();
    let manager = factory::create_backup_manager(&ctx.config, &deploy);

    match command {
        BackupCommands::Create => {
            let info = manager.create()?;
            ctx.print(
                || ctx.renderer.backup_created(&info),
                || output::backup_json(&info),
            )
        }
        BackupCommands::List => {
            let backups = manager.list()?;
            ctx.print(
                || ctx.renderer.backups(&backups),
                || json!({ "backups": backups.iter().map(output::backup_json).collect::<Vec<_>>() }),
            )
        }
        BackupCommands::Restore { archive, message } => {
            let report = manager.restore(&archive, &ctx.apply_options(message.message))?;
            ctx.print(
                || ctx.renderer.restore(&report),
                || output::restore_json("backup restore", &report),
            )
        }
    }
}
