//! Certificate command handlers

use anyhow::Result;
use chrono::Utc;
use serde_json::json;

use sitekeeper::application::RenewOutcome;
use sitekeeper::presentation::output;

use super::Context;

pub fn cmd_check(ctx: &Context) -> Result<()> {
    let deploy = ctx.deploy();
    let records = deploy.check_certificates()?;
    let threshold = deploy.certificates().settings().renew_before;

    ctx.print(
        || ctx.renderer.certificates(&records, Utc::now(), threshold),
        || {
            json!({
                "certificates": records
                    .iter()
                    .map(output::certificate_json)
                    .collect::<Vec<_>>(),
            })
        },
    )
}

pub fn cmd_renew(ctx: &Context, domain: Option<&str>, due: bool, force: bool) -> Result<()> {
    let deploy = ctx.deploy();
    let options = ctx.apply_options(None);

    let outcomes = match domain {
        Some(name) if !due => vec![RenewOutcome {
            domain: name.to_string(),
            result: deploy.renew(name, force, &options),
        }],
        _ => deploy.renew_due(&options)?,
    };

    ctx.print(
        || ctx.renderer.renewals(&outcomes),
        || {
            json!({
                "event": "complete",
                "command": "renew",
                "renewals": outcomes.iter().map(outcome_json).collect::<Vec<_>>(),
            })
        },
    )?;

    // Exit with the first failure
    let failure = outcomes.into_iter().find_map(|o| match o.result {
        Ok(report) => report.degraded,
        Err(err) => Some(err),
    });
    match failure {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

fn outcome_json(outcome: &RenewOutcome) -> serde_json::Value {
    match &outcome.result {
        Ok(report) => output::apply_json(report),
        Err(err) => json!({
            "domain": outcome.domain,
            "success": false,
            "error": err.to_string(),
        }),
    }
}
