//! History command handlers

use anyhow::Result;
use serde_json::json;

use sitekeeper::application::HEAD;
use sitekeeper::domain::services::{Differ, TreeDiff};
use sitekeeper::presentation::output;
use sitekeeper::presentation::{
    cli::{BranchCommands, HistoryCommands, TagCommands},
    factory::ConcreteDeployUseCase,
};

use super::Context;

pub fn cmd_history(ctx: &Context, command: HistoryCommands) -> Result<()> {
    let deploy = ctx.deploy();
    match command {
        HistoryCommands::Log { reference, limit } => log(ctx, &deploy, reference, limit),
        HistoryCommands::Diff { from, to, patch } => {
            diff(ctx, &deploy, &from, to.as_deref().unwrap_or(HEAD), patch)
        }
        HistoryCommands::Show { reference } => {
            show(ctx, &deploy, reference.as_deref().unwrap_or(HEAD))
        }
        HistoryCommands::Branch { action } => branch(ctx, &deploy, action),
        HistoryCommands::Tag { action } => tag(ctx, &deploy, action),
        HistoryCommands::Stats => {
            let stats = deploy.history().stats()?;
            ctx.print(
                || ctx.renderer.stats(&stats),
                || output::stats_json(&stats),
            )
        }
        HistoryCommands::Checkout { reference, message } => {
            let report = deploy.checkout(&reference, &ctx.apply_options(message.message))?;
            ctx.print(
                || ctx.renderer.restore(&report),
                || output::restore_json("checkout", &report),
            )
        }
        HistoryCommands::Commit { message } => {
            let commit = deploy.checkpoint(&message)?;
            ctx.print(
                || format!("{}\n", ctx.renderer.commit_line(&commit)),
                || output::commit_json(&commit),
            )
        }
        HistoryCommands::Status => {
            let status = deploy.status()?;
            let domains = deploy.registry().list()?.len();
            ctx.print(
                || ctx.renderer.status(&status, domains),
                || output::status_json(&status, domains),
            )
        }
        HistoryCommands::Prune => {
            let _guard = deploy.locks().try_all()?;
            let report = deploy.history().prune()?;
            ctx.print(
                || ctx.renderer.prune(&report),
                || {
                    json!({
                        "commits": report.commits,
                        "snapshots": report.snapshots,
                        "blobs": report.blobs,
                    })
                },
            )
        }
    }
}

fn log(
    ctx: &Context,
    deploy: &ConcreteDeployUseCase,
    reference: Option<String>,
    limit: Option<usize>,
) -> Result<()> {
    let walk = deploy.history().log(reference.as_deref())?;
    let commits = walk
        .take(limit.unwrap_or(usize::MAX))
        .collect::<Result<Vec<_>, _>>()?;
    ctx.print(
        || ctx.renderer.log(&commits),
        || json!({ "commits": commits.iter().map(output::commit_json).collect::<Vec<_>>() }),
    )
}

fn diff(
    ctx: &Context,
    deploy: &ConcreteDeployUseCase,
    from: &str,
    to: &str,
    patch: bool,
) -> Result<()> {
    let changes = deploy.history().diff(from, to)?;
    let patch_text = if patch {
        Some(unified(deploy, &changes)?)
    } else {
        None
    };
    ctx.print(
        || {
            let mut out = ctx.renderer.tree_diff(&changes);
            if let Some(text) = &patch_text {
                out.push('\n');
                out.push_str(text);
            }
            out
        },
        || {
            json!({
                "from": from,
                "to": to,
                "changes": output::diff_json(&changes),
                "patch": patch_text,
            })
        },
    )
}

fn show(ctx: &Context, deploy: &ConcreteDeployUseCase, reference: &str) -> Result<()> {
    let history = deploy.history();
    let commit = history.get_commit(&history.resolve(reference)?)?;
    let parent = match &commit.parent {
        Some(id) => Some(history.get_commit(id)?),
        None => None,
    };
    let changes = history.diff_commits(parent.as_ref(), &commit)?;
    ctx.print(
        || ctx.renderer.commit(&commit, &changes),
        || {
            let mut value = output::commit_json(&commit);
            value["changes"] = output::diff_json(&changes);
            value
        },
    )
}

fn branch(
    ctx: &Context,
    deploy: &ConcreteDeployUseCase,
    action: Option<BranchCommands>,
) -> Result<()> {
    let history = deploy.history();
    match action.unwrap_or(BranchCommands::List) {
        BranchCommands::List => {
            let branches = history.branches()?;
            ctx.print(
                || ctx.renderer.branches(&branches),
                || {
                    json!({
                        "branches": branches
                            .iter()
                            .map(|b| json!({
                                "name": b.name,
                                "head": b.head.as_ref().map(|id| id.as_str().to_string()),
                                "current": b.current,
                            }))
                            .collect::<Vec<_>>(),
                    })
                },
            )
        }
        BranchCommands::Create { name, from } => {
            let info = history.create_branch(&name, from.as_deref())?;
            ctx.print(
                || format!("Created branch {}\n", info.name),
                || json!({ "created": info.name }),
            )
        }
        BranchCommands::Delete { name } => {
            history.delete_branch(&name)?;
            ctx.print(
                || format!("Deleted branch {}\n", name),
                || json!({ "deleted": name }),
            )
        }
    }
}

fn tag(ctx: &Context, deploy: &ConcreteDeployUseCase, action: Option<TagCommands>) -> Result<()> {
    let history = deploy.history();
    match action.unwrap_or(TagCommands::List) {
        TagCommands::List => {
            let tags = history.tags()?;
            ctx.print(
                || ctx.renderer.tags(&tags),
                || json!({ "tags": tags.iter().map(output::tag_json).collect::<Vec<_>>() }),
            )
        }
        TagCommands::Create {
            name,
            reference,
            message,
        } => {
            let tag = history.create_tag(&name, reference.as_deref(), &message)?;
            ctx.print(
                || format!("Tagged {} as {}\n", tag.commit.short(), tag.name),
                || output::tag_json(&tag),
            )
        }
        TagCommands::Delete { name } => {
            let tag = history.delete_tag(&name)?;
            ctx.print(
                || format!("Deleted tag {} (was {})\n", tag.name, tag.commit.short()),
                || json!({ "deleted": tag.name }),
            )
        }
    }
}

/// Line diffs for every changed entry
fn unified(deploy: &ConcreteDeployUseCase, changes: &TreeDiff) -> Result<String> {
    let history = deploy.history();
    let differ = Differ::new();
    let mut out = String::new();
    for change in &changes.changes {
        let old = match &change.old {
            Some(entry) => history.entry_text(entry)?,
            None => String::new(),
        };
        let new = match &change.new {
            Some(entry) => history.entry_text(entry)?,
            None => String::new(),
        };
        out.push_str(&differ.unified(&change.path, &old, &new));
    }
    Ok(out)
}
