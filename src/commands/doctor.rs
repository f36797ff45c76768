//! Doctor command implementation

use anyhow::Result;

use sitekeeper::application::CheckStatus;
use sitekeeper::presentation::factory;
use sitekeeper::presentation::output;

use super::Context;

pub fn cmd_doctor(ctx: &Context) -> Result<()> {
    let deploy = ctx.deploy();
    let doctor = factory::create_doctor(&ctx.config, &deploy);

    if ctx.json() {
        output::emit(serde_json::json!({
            "event": "start",
            "command": "doctor",
        }))?;
    } else {
        println!("Sitekeeper Doctor");
        println!();
    }

    // Checks are printed as they finish; the daemon commands can be slow
    let report = doctor.run_with_callback(|check| {
        if ctx.json() {
            let _ = output::emit(output::doctor_check_json(check));
        } else {
            print!("{}", ctx.renderer.doctor_check(check));
        }
    });

    if ctx.json() {
        output::emit(serde_json::json!({
            "event": "complete",
            "command": "doctor",
            "passes": report.count(CheckStatus::Pass),
            "warnings": report.count(CheckStatus::Warning),
            "errors": report.count(CheckStatus::Error),
            "success": report.is_success(),
        }))?;
    } else {
        print!("{}", ctx.renderer.doctor_summary(&report));
    }

    if report.is_success() {
        Ok(())
    } else {
        anyhow::bail!(
            "doctor found {} error(s)",
            report.count(CheckStatus::Error)
        )
    }
}
