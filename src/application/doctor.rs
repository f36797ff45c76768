//! Doctor
//!
//! Environment checks run by `sitekeeper doctor`: the daemon accepts the
//! current configuration and is running, the certificate client can be
//! executed, and our own state can be read.

use std::time::Duration;

use chrono::Utc;

use crate::application::deploy::DeployUseCase;
use crate::domain::entities::CertState;
use crate::domain::ports::{DaemonError, FileSystem};
use crate::infrastructure::daemon::{run_with_timeout, RunError};

/// Status of a check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warning,
    Error,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "pass",
            CheckStatus::Warning => "warning",
            CheckStatus::Error => "error",
        }
    }
}

/// Result of a single check
#[derive(Debug, Clone)]
pub struct DoctorCheck {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
    /// Raw output from the daemon or client, if any
    pub details: Vec<String>,
}

impl DoctorCheck {
    fn pass(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Pass,
            message: message.into(),
            details: Vec::new(),
        }
    }

    fn warning(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Warning,
            ..Self::pass(name, message)
        }
    }

    fn error(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Error,
            ..Self::pass(name, message)
        }
    }

    fn with_details(mut self, text: &str) -> Self {
        self.details = text
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        self
    }
}

/// Result of the doctor run
#[derive(Debug, Clone, Default)]
pub struct DoctorReport {
    pub checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    pub fn count(&self, status: CheckStatus) -> usize {
        self.checks.iter().filter(|c| c.status == status).count()
    }

    /// No errors; warnings are allowed
    pub fn is_success(&self) -> bool {
        self.count(CheckStatus::Error) == 0
    }
}

pub struct Doctor<'a, FS: FileSystem> {
    deploy: &'a DeployUseCase<FS>,
    client_program: String,
    timeout: Duration,
}

impl<'a, FS: FileSystem> Doctor<'a, FS> {
    pub fn new(
        deploy: &'a DeployUseCase<FS>,
        client_program: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            deploy,
            client_program: client_program.into(),
            timeout,
        }
    }

    pub fn run(&self) -> DoctorReport {
        self.run_with_callback(|_| {})
    }

    /// Run every check, reporting each one as soon as it finishes
    pub fn run_with_callback<F>(&self, mut on_check: F) -> DoctorReport
    where
        F: FnMut(&DoctorCheck),
    {
        let mut report = DoctorReport::default();
        let checks: [fn(&Self) -> DoctorCheck; 6] = [
            Self::config_test,
            Self::daemon_status,
            Self::certificate_client,
            Self::directories,
            Self::state,
            Self::certificate_expiry,
        ];
        for check in checks {
            let result = check(self);
            on_check(&result);
            report.checks.push(result);
        }
        report
    }

    fn config_test(&self) -> DoctorCheck {
        const NAME: &str = "configuration test";
        match self.deploy.daemon().validate() {
            Ok(output) => DoctorCheck::pass(NAME, "daemon accepts the configuration")
                .with_details(&output),
            Err(err) => daemon_failure(NAME, &err),
        }
    }

    fn daemon_status(&self) -> DoctorCheck {
        const NAME: &str = "daemon status";
        match self.deploy.daemon().status() {
            Ok(status) if status.active => {
                DoctorCheck::pass(NAME, "daemon is running").with_details(&status.detail)
            }
            Ok(status) => {
                DoctorCheck::warning(NAME, "daemon is not running").with_details(&status.detail)
            }
            Err(err) => daemon_failure(NAME, &err),
        }
    }

    fn certificate_client(&self) -> DoctorCheck {
        const NAME: &str = "certificate client";
        let argv = vec![self.client_program.clone(), "--version".to_string()];
        match run_with_timeout(&argv, self.timeout) {
            Ok(output) if output.success() => {
                DoctorCheck::pass(NAME, format!("{} is available", self.client_program))
                    .with_details(&output.combined())
            }
            Ok(output) => DoctorCheck::warning(
                NAME,
                format!("{} --version exited with {}", self.client_program, output.status),
            )
            .with_details(&output.combined()),
            Err(RunError::Spawn { .. }) => DoctorCheck::error(
                NAME,
                format!(
                    "{} was not found; TLS domains cannot get certificates",
                    self.client_program
                ),
            ),
            Err(e) => DoctorCheck::warning(NAME, e.to_string()),
        }
    }

    fn directories(&self) -> DoctorCheck {
        const NAME: &str = "managed directories";
        let layout = self.deploy.layout();
        let missing: Vec<String> = [layout.available_dir(), layout.enabled_dir()]
            .into_iter()
            .filter(|dir| !dir.is_dir())
            .map(|dir| dir.display().to_string())
            .collect();
        if missing.is_empty() {
            DoctorCheck::pass(NAME, "available and enabled directories exist")
        } else {
            DoctorCheck::warning(
                NAME,
                format!("missing, will be created on first apply: {}", missing.join(", ")),
            )
        }
    }

    fn state(&self) -> DoctorCheck {
        const NAME: &str = "state";
        let registry = match self.deploy.registry().load() {
            Ok(registry) => registry,
            Err(e) => return DoctorCheck::error(NAME, e.to_string()),
        };
        match self.deploy.history().head() {
            Ok(head) => DoctorCheck::pass(
                NAME,
                format!(
                    "{} domain(s), history at {}",
                    registry.all().len(),
                    head.map(|c| c.id.short().to_string())
                        .unwrap_or_else(|| "no commits".to_string())
                ),
            ),
            Err(e) => DoctorCheck::error(NAME, e.to_string()),
        }
    }

    fn certificate_expiry(&self) -> DoctorCheck {
        const NAME: &str = "certificate expiry";
        let registry = match self.deploy.registry().load() {
            Ok(registry) => registry,
            Err(e) => return DoctorCheck::error(NAME, e.to_string()),
        };
        let now = Utc::now();
        let threshold = self.deploy.certificates().settings().renew_before;

        let mut attention = Vec::new();
        for record in &registry.certificates {
            let state = record.classify(now, threshold);
            if matches!(
                state,
                CertState::Expiring | CertState::Expired | CertState::RenewFailed
            ) {
                let days = record
                    .days_remaining(now)
                    .map(|d| format!("{} days left", d))
                    .unwrap_or_else(|| "expiry unknown".to_string());
                attention.push(format!("{} ({}, {})", record.domain, state, days));
            }
        }
        if attention.is_empty() {
            DoctorCheck::pass(
                NAME,
                format!("{} certificate(s) valid", registry.certificates.len()),
            )
        } else {
            DoctorCheck::warning(NAME, "certificates need renewal; run `certs renew --due`")
                .with_details(&attention.join("\n"))
        }
    }
}

fn daemon_failure(name: &'static str, err: &DaemonError) -> DoctorCheck {
    DoctorCheck::error(name, err.to_string()).with_details(err.diagnostics())
}
