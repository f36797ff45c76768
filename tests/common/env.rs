//! Test environment for running the sitekeeper binary.
//!
//! `TestEnv` owns a temp directory holding the managed directories, state,
//! templates and a `config.toml` whose daemon commands are plain shell
//! programs, so no web server or certificate authority is needed.

use std::path::PathBuf;
use std::process::Command;

use tempfile::TempDir;

/// Result of running a sitekeeper CLI command
#[derive(Debug)]
pub struct TestResult {
    pub success: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl TestResult {
    /// Combine stdout and stderr
    pub fn combined_output(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }

    /// Parse stdout as a single JSON document
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.stdout)
            .unwrap_or_else(|e| panic!("stdout is not JSON ({}):\n{}", e, self.stdout))
    }

    /// Parse stdout as newline-delimited JSON
    pub fn json_lines(&self) -> Vec<serde_json::Value> {
        self.stdout
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).unwrap_or_else(|e| panic!("{}: {}", e, l)))
            .collect()
    }
}

/// Isolated environment with its own config file
pub struct TestEnv {
    pub root: TempDir,
    config: PathBuf,
}

impl TestEnv {
    pub fn builder() -> TestEnvBuilder {
        TestEnvBuilder::default()
    }

    /// Environment whose daemon accepts everything
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.path().join(relative)
    }

    pub fn config_path(&self) -> &PathBuf {
        &self.config
    }

    /// Rendered file for `domain` in the available directory
    pub fn available(&self, domain: &str) -> Option<String> {
        std::fs::read_to_string(self.path("sites-available").join(site_file(domain))).ok()
    }

    pub fn enabled(&self, domain: &str) -> bool {
        std::fs::symlink_metadata(self.path("sites-enabled").join(site_file(domain))).is_ok()
    }

    pub fn run(&self, args: &[&str]) -> TestResult {
        let output = Command::new(env!("CARGO_BIN_EXE_sitekeeper"))
            .arg("--config")
            .arg(&self.config)
            .args(args)
            .env_remove("SITEKEEPER_LOG")
            .env_remove("SITEKEEPER_CONFIG")
            .env("HOME", self.root.path())
            .env("TERM", "dumb")
            .output()
            .expect("failed to run sitekeeper");

        TestResult {
            success: output.status.success(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}

fn site_file(domain: &str) -> String {
    format!("sk-{}.conf", domain.replace('*', "_wildcard"))
}

/// Builder for `TestEnv`
pub struct TestEnvBuilder {
    test_command: String,
    reload_command: String,
    client: String,
    templates: Vec<(String, String)>,
}

impl Default for TestEnvBuilder {
    fn default() -> Self {
        Self {
            test_command: "true".to_string(),
            reload_command: "true".to_string(),
            client: "true".to_string(),
            templates: Vec::new(),
        }
    }
}

impl TestEnvBuilder {
    /// Shell snippet run as the daemon's configuration test
    pub fn with_test_command(mut self, script: &str) -> Self {
        self.test_command = script.to_string();
        self
    }

    pub fn with_reload_command(mut self, script: &str) -> Self {
        self.reload_command = script.to_string();
        self
    }

    /// Program standing in for the certificate client
    pub fn with_client(mut self, program: &str) -> Self {
        self.client = program.to_string();
        self
    }

    pub fn with_template(mut self, name: &str, body: &str) -> Self {
        self.templates.push((name.to_string(), body.to_string()));
        self
    }

    pub fn build(self) -> TestEnv {
        let root = TempDir::new().unwrap();
        let dir = root.path();

        let templates = dir.join("templates");
        std::fs::create_dir_all(&templates).unwrap();
        for (name, body) in &self.templates {
            std::fs::write(templates.join(name), body).unwrap();
        }

        let shell = |script: &str| format!("[\"sh\", \"-c\", {:?}]", script);
        let config = format!(
            r#"[paths]
state_dir = {state:?}
templates_dir = {templates:?}
available_dir = {available:?}
enabled_dir = {enabled:?}
managed_prefix = "sk-"
backup_dir = {backups:?}

[daemon]
test_command = {test}
reload_command = {reload}
status_command = ["true"]
timeout_secs = 10

[certificates]
client = {client:?}
cert_root = {certs:?}
timeout_secs = 10

[history]
author = "tester"
"#,
            state = dir.join("state").display().to_string(),
            templates = templates.display().to_string(),
            available = dir.join("sites-available").display().to_string(),
            enabled = dir.join("sites-enabled").display().to_string(),
            backups = dir.join("backups").display().to_string(),
            test = shell(&self.test_command),
            reload = shell(&self.reload_command),
            client = self.client,
            certs = dir.join("letsencrypt").display().to_string(),
        );
        let config_path = dir.join("config.toml");
        std::fs::write(&config_path, config).unwrap();

        TestEnv {
            root,
            config: config_path,
        }
    }
}
