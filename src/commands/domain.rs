//! Domain command handlers: add, edit, delete, apply, list, show

use anyhow::Result;
use chrono::Utc;
use serde_json::json;

use sitekeeper::application::{deploy::parse_name, ApplyReport, DomainRequest, EditRequest};
use sitekeeper::presentation::output;

use super::Context;

pub struct AddArgs {
    pub domain: String,
    pub port: u32,
    pub backend: Option<String>,
    pub tls: bool,
    pub template: Option<String>,
    pub message: Option<String>,
}

pub fn cmd_add(ctx: &Context, args: AddArgs) -> Result<()> {
    let mut request = DomainRequest::new(args.domain, args.port).with_tls(args.tls);
    if let Some(backend) = args.backend {
        request = request.with_backend(backend);
    }
    if let Some(template) = args.template {
        request = request.with_template(template);
    }

    let deploy = ctx.deploy();
    let report = deploy.add(request, &ctx.apply_options(args.message))?;
    finish(ctx, report)
}

pub struct EditArgs {
    pub domain: String,
    pub port: Option<u32>,
    pub backend: Option<String>,
    pub tls: bool,
    pub no_tls: bool,
    pub template: Option<String>,
    pub default_template: bool,
    pub message: Option<String>,
}

pub fn cmd_edit(ctx: &Context, args: EditArgs) -> Result<()> {
    let tls = match (args.tls, args.no_tls) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    };
    let template = if args.default_template {
        Some(None)
    } else {
        args.template.map(Some)
    };
    let request = EditRequest {
        port: args.port,
        backend_address: args.backend,
        tls,
        template,
    };

    let deploy = ctx.deploy();
    let report = deploy.edit(&args.domain, request, &ctx.apply_options(args.message))?;
    finish(ctx, report)
}

pub fn cmd_apply(ctx: &Context, domain: &str, message: Option<String>) -> Result<()> {
    let deploy = ctx.deploy();
    let report = deploy.apply(domain, &ctx.apply_options(message))?;
    finish(ctx, report)
}

pub fn cmd_delete(ctx: &Context, domain: &str, purge: bool, message: Option<String>) -> Result<()> {
    let deploy = ctx.deploy();
    let mut report = deploy.remove(domain, &ctx.remove_options(message, purge))?;
    ctx.print(
        || ctx.renderer.remove(&report),
        || output::remove_json(&report),
    )?;
    match report.degraded.take() {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

pub fn cmd_list(ctx: &Context) -> Result<()> {
    let deploy = ctx.deploy();
    let registry = deploy.registry().load()?;
    let threshold = deploy.certificates().settings().renew_before;

    ctx.print(
        || {
            ctx.renderer
                .domains(registry.all(), &registry.certificates, Utc::now(), threshold)
        },
        || {
            json!({
                "domains": registry
                    .all()
                    .iter()
                    .map(|d| output::domain_json(d, registry.certificate(&d.name)))
                    .collect::<Vec<_>>(),
            })
        },
    )
}

pub fn cmd_show(ctx: &Context, domain: &str, rendered: bool) -> Result<()> {
    let deploy = ctx.deploy();
    let name = parse_name(domain)?;
    let record = deploy.registry().get(&name)?;
    let certificate = deploy.registry().certificate(&name)?;
    let now = Utc::now();

    if rendered {
        let tls = record.tls && certificate.as_ref().is_some_and(|c| c.is_usable(now));
        let rendered = deploy.render(&record, tls)?;
        return ctx.print(
            || rendered.text.clone(),
            || {
                json!({
                    "domain": record.name.as_str(),
                    "tls": rendered.tls,
                    "text": rendered.text,
                    "unresolved": rendered.unresolved,
                })
            },
        );
    }

    ctx.print(
        || ctx.renderer.domain(&record, certificate.as_ref(), now),
        || output::domain_json(&record, certificate.as_ref()),
    )
}

/// Print the report; a degraded deploy still exits with its error
fn finish(ctx: &Context, report: ApplyReport) -> Result<()> {
    ctx.print(
        || ctx.renderer.apply(&report),
        || output::apply_json(&report),
    )?;
    report.into_result()?;
    Ok(())
}
