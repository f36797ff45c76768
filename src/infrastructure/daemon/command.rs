//! Command-driven daemon control
//!
//! Validates with `nginx -t`, reloads through the service manager and asks
//! it for status. Every command is configurable and bounded by a timeout.

use std::time::Duration;

use tracing::info;

use super::process::{run_with_timeout, RunError};
use crate::config::DaemonConfig;
use crate::domain::ports::{DaemonControl, DaemonError, DaemonStatus};

#[derive(Debug, Clone)]
pub struct CommandDaemon {
    test_command: Vec<String>,
    reload_command: Vec<String>,
    status_command: Vec<String>,
    timeout: Duration,
}

impl CommandDaemon {
    pub fn new(
        test_command: Vec<String>,
        reload_command: Vec<String>,
        status_command: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            test_command,
            reload_command,
            status_command,
            timeout,
        }
    }

    pub fn from_config(config: &DaemonConfig) -> Self {
        Self::new(
            config.test_command.clone(),
            config.reload_command.clone(),
            config.status_command.clone(),
            config.timeout(),
        )
    }

    fn run(&self, action: &str, argv: &[String]) -> Result<String, DaemonError> {
        let output = run_with_timeout(argv, self.timeout).map_err(|e| match e {
            RunError::Timeout { after, .. } => DaemonError::Timeout {
                action: action.to_string(),
                after,
            },
            other => DaemonError::Spawn {
                action: action.to_string(),
                message: other.to_string(),
            },
        })?;

        if output.success() {
            Ok(output.combined())
        } else {
            Err(DaemonError::Failed {
                action: action.to_string(),
                diagnostics: output.combined(),
            })
        }
    }
}

impl DaemonControl for CommandDaemon {
    fn validate(&self) -> Result<String, DaemonError> {
        self.run("configuration test", &self.test_command)
    }

    fn reload(&self) -> Result<String, DaemonError> {
        let out = self.run("reload", &self.reload_command)?;
        info!("daemon reloaded");
        Ok(out)
    }

    fn status(&self) -> Result<DaemonStatus, DaemonError> {
        match self.run("status", &self.status_command) {
            Ok(detail) => Ok(DaemonStatus {
                active: true,
                detail,
            }),
            // `systemctl is-active` exits non-zero for inactive units
            Err(DaemonError::Failed { diagnostics, .. }) => Ok(DaemonStatus {
                active: false,
                detail: diagnostics,
            }),
            Err(other) => Err(other),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    fn daemon(test: &str, reload: &str, status: &str) -> CommandDaemon {
        CommandDaemon::new(sh(test), sh(reload), sh(status), Duration::from_secs(5))
    }

    #[test]
    fn validate_failure_carries_diagnostics() {
        let d = daemon(
            "echo 'nginx: [emerg] unknown directive \"sever\"' >&2; exit 1",
            "true",
            "true",
        );
        let err = d.validate().unwrap_err();
        assert!(matches!(err, DaemonError::Failed { .. }));
        assert!(err.diagnostics().contains("unknown directive"));
    }

    #[test]
    fn reload_success_returns_output() {
        let d = daemon("true", "echo reloaded", "true");
        assert_eq!(d.reload().unwrap(), "reloaded");
    }

    #[test]
    fn status_reports_inactive_without_error() {
        let d = daemon("true", "true", "echo inactive; exit 3");
        let status = d.status().unwrap();
        assert!(!status.active);
        assert_eq!(status.detail, "inactive");

        let d = daemon("true", "true", "echo active");
        assert!(d.status().unwrap().active);
    }

    #[test]
    fn slow_reload_times_out() {
        let d = CommandDaemon::new(
            sh("true"),
            sh("sleep 5"),
            sh("true"),
            Duration::from_millis(200),
        );
        assert!(matches!(d.reload(), Err(DaemonError::Timeout { .. })));
    }
}
