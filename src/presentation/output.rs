//! Output Rendering
//!
//! Text views for the terminal and JSON documents for `--json`. Every text
//! view returns a `String` so it can be tested without a terminal.

use std::io::{self, Write};

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

use crate::application::{
    ApplyReport, BackupInfo, BranchInfo, CheckStatus, DoctorCheck, DoctorReport, HistoryStats,
    HistoryStatus, PruneReport, RemoveReport, RenewOutcome, RestoreReport,
};
use crate::domain::entities::{CertState, CertificateRecord, Commit, Domain, Tag};
use crate::domain::services::TreeDiff;

/// Output format for rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// One JSON document on stdout
    Json,
}

impl OutputFormat {
    pub fn from_flag(json: bool) -> Self {
        if json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Icons for output rendering
struct Icons {
    check: &'static str,
    cross: &'static str,
    warn: &'static str,
    arrow: &'static str,
}

impl Icons {
    fn unicode() -> Self {
        Self {
            check: "✓",
            cross: "✗",
            warn: "⚠",
            arrow: "→",
        }
    }

    fn ascii() -> Self {
        Self {
            check: "[OK]",
            cross: "[FAIL]",
            warn: "[WARN]",
            arrow: "->",
        }
    }
}

/// Write a single JSON document followed by a newline
pub fn write_json(out: &mut impl Write, value: &Value) -> io::Result<()> {
    let line = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());
    out.write_all(line.as_bytes())?;
    out.write_all(b"\n")
}

/// Convenience helper that writes to stdout
pub fn emit(value: Value) -> io::Result<()> {
    let mut out = io::stdout().lock();
    write_json(&mut out, &value)
}

/// Text renderer
pub struct TextRenderer {
    icons: Icons,
    /// Verbosity level
    pub verbose: u8,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self::new(true, 0)
    }
}

impl TextRenderer {
    pub fn new(unicode: bool, verbose: u8) -> Self {
        Self {
            icons: if unicode {
                Icons::unicode()
            } else {
                Icons::ascii()
            },
            verbose,
        }
    }

    pub fn apply(&self, report: &ApplyReport) -> String {
        let mut out = String::new();
        let domain = &report.domain;
        let scheme = if report.tls_live { "https" } else { "http" };

        match &report.commit {
            Some(commit) if report.is_degraded() => push_line(
                &mut out,
                format!(
                    "{} {} {} is live over plain HTTP ({})",
                    self.icons.warn,
                    report.operation,
                    domain.name,
                    commit.id.short()
                ),
            ),
            Some(commit) => push_line(
                &mut out,
                format!(
                    "{} {} {} {} {}://{} ({})",
                    self.icons.check,
                    report.operation,
                    domain.name,
                    self.icons.arrow,
                    scheme,
                    domain.name,
                    commit.id.short()
                ),
            ),
            None => push_line(
                &mut out,
                format!(
                    "{} {} {}: nothing to deploy",
                    self.icons.check, report.operation, domain.name
                ),
            ),
        }

        push_line(&mut out, format!("  Backend: {}", backend(domain)));
        if let Some(record) = &report.certificate {
            let action = report.cert_action.map(|a| a.as_str()).unwrap_or("none");
            push_line(
                &mut out,
                format!(
                    "  Certificate: {} ({}{})",
                    record.state,
                    action,
                    expiry_suffix(record, Utc::now())
                ),
            );
        }
        if self.verbose > 0 {
            let stages: Vec<&str> = report.stages.iter().map(|s| s.as_str()).collect();
            push_line(&mut out, format!("  Stages: {}", stages.join(" → ")));
        }
        if !report.unresolved.is_empty() {
            push_line(
                &mut out,
                format!(
                    "  {} Unresolved variables: {}",
                    self.icons.warn,
                    report.unresolved.join(", ")
                ),
            );
        }
        if let Some(err) = &report.degraded {
            push_line(&mut out, format!("  {} {}", self.icons.cross, err));
        }
        out
    }

    pub fn remove(&self, report: &RemoveReport) -> String {
        let mut out = String::new();
        push_line(
            &mut out,
            format!(
                "{} removed {} ({})",
                self.icons.check,
                report.domain.name,
                report.commit.id.short()
            ),
        );
        if report.certificate_deleted {
            push_line(&mut out, "  Certificate deleted".to_string());
        }
        if let Some(err) = &report.degraded {
            push_line(&mut out, format!("  {} {}", self.icons.warn, err));
        }
        out
    }

    pub fn domains(
        &self,
        domains: &[Domain],
        certificates: &[CertificateRecord],
        now: DateTime<Utc>,
        threshold: Duration,
    ) -> String {
        if domains.is_empty() {
            return "No domains registered.\n".to_string();
        }

        let rows: Vec<[String; 4]> = domains
            .iter()
            .map(|d| {
                let cert = certificates
                    .iter()
                    .find(|c| c.domain == d.name)
                    .map(|c| cert_cell(c, now, threshold))
                    .unwrap_or_else(|| "-".to_string());
                [
                    d.name.to_string(),
                    backend(d),
                    if d.tls { "yes" } else { "no" }.to_string(),
                    cert,
                ]
            })
            .collect();

        let header = [
            "DOMAIN".to_string(),
            "BACKEND".to_string(),
            "TLS".to_string(),
            "CERTIFICATE".to_string(),
        ];
        table(&header, &rows)
    }

    pub fn domain(
        &self,
        domain: &Domain,
        certificate: Option<&CertificateRecord>,
        now: DateTime<Utc>,
    ) -> String {
        let mut out = String::new();
        push_line(&mut out, domain.name.to_string());
        push_line(&mut out, format!("  Backend:  {}", backend(domain)));
        push_line(
            &mut out,
            format!("  TLS:      {}", if domain.tls { "yes" } else { "no" }),
        );
        if domain.wildcard {
            push_line(&mut out, "  Wildcard: yes (DNS challenge)".to_string());
        }
        push_line(
            &mut out,
            format!(
                "  Template: {}",
                domain.template.as_deref().unwrap_or("(built-in)")
            ),
        );
        push_line(
            &mut out,
            format!("  Created:  {}", domain.created_at.format("%Y-%m-%d %H:%M")),
        );
        push_line(
            &mut out,
            format!("  Updated:  {}", domain.updated_at.format("%Y-%m-%d %H:%M")),
        );
        if let Some(record) = certificate {
            push_line(
                &mut out,
                format!(
                    "  Certificate: {}{}",
                    record.state,
                    expiry_suffix(record, now)
                ),
            );
            push_line(&mut out, format!("    cert: {}", record.cert_path.display()));
            push_line(&mut out, format!("    key:  {}", record.key_path.display()));
        }
        out
    }

    pub fn certificates(
        &self,
        records: &[CertificateRecord],
        now: DateTime<Utc>,
        threshold: Duration,
    ) -> String {
        if records.is_empty() {
            return "No certificates.\n".to_string();
        }
        let rows: Vec<[String; 3]> = records
            .iter()
            .map(|r| {
                [
                    r.domain.to_string(),
                    r.classify(now, threshold).to_string(),
                    r.expires_at
                        .map(|at| at.format("%Y-%m-%d").to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ]
            })
            .collect();
        table(
            &[
                "DOMAIN".to_string(),
                "STATE".to_string(),
                "EXPIRES".to_string(),
            ],
            &rows,
        )
    }

    pub fn renewals(&self, outcomes: &[RenewOutcome]) -> String {
        if outcomes.is_empty() {
            return format!("{} No certificates are due for renewal\n", self.icons.check);
        }
        let mut out = String::new();
        for outcome in outcomes {
            match &outcome.result {
                Ok(report) if report.is_degraded() => push_line(
                    &mut out,
                    format!("{} {}: renewal failed", self.icons.cross, outcome.domain),
                ),
                Ok(report) => push_line(
                    &mut out,
                    format!(
                        "{} {}: {}",
                        self.icons.check,
                        outcome.domain,
                        report.cert_action.map(|a| a.as_str()).unwrap_or("kept")
                    ),
                ),
                Err(err) => push_line(
                    &mut out,
                    format!("{} {}: {}", self.icons.cross, outcome.domain, err),
                ),
            }
        }
        out
    }

    pub fn commit_line(&self, commit: &Commit) -> String {
        format!(
            "{}  {}  {:<11}  {}",
            commit.id.short(),
            commit.timestamp.format("%Y-%m-%d %H:%M"),
            commit.outcome.as_str(),
            commit.summary()
        )
    }

    pub fn log(&self, commits: &[Commit]) -> String {
        if commits.is_empty() {
            return "No commits yet.\n".to_string();
        }
        let mut out = String::new();
        for commit in commits {
            push_line(&mut out, self.commit_line(commit));
        }
        out
    }

    pub fn commit(&self, commit: &Commit, changes: &TreeDiff) -> String {
        let mut out = String::new();
        push_line(&mut out, format!("commit {}", commit.id));
        if let Some(parent) = &commit.parent {
            push_line(&mut out, format!("parent {}", parent));
        }
        push_line(&mut out, format!("outcome {}", commit.outcome));
        push_line(&mut out, format!("author  {}", commit.author));
        push_line(&mut out, format!("date    {}", commit.timestamp.to_rfc3339()));
        out.push('\n');
        for line in commit.message.lines() {
            push_line(&mut out, format!("    {}", line));
        }
        out.push('\n');
        out.push_str(&self.tree_diff(changes));
        out
    }

    pub fn tree_diff(&self, changes: &TreeDiff) -> String {
        if changes.is_empty() {
            return "No changes.\n".to_string();
        }
        let mut out = String::new();
        for change in &changes.changes {
            push_line(&mut out, format!("{} {}", change.kind.symbol(), change.path));
        }
        push_line(&mut out, changes.summary());
        out
    }

    pub fn status(&self, status: &HistoryStatus, domains: usize) -> String {
        let mut out = String::new();
        push_line(&mut out, format!("On branch {}", status.branch));
        match &status.head {
            Some(head) => push_line(&mut out, format!("Head: {}", self.commit_line(head))),
            None => push_line(&mut out, "Head: no commits yet".to_string()),
        }
        push_line(&mut out, format!("Domains: {}", domains));
        if status.is_clean() {
            push_line(
                &mut out,
                format!("{} Live configuration matches head", self.icons.check),
            );
        } else {
            push_line(
                &mut out,
                format!(
                    "{} Live configuration differs from head:",
                    self.icons.warn
                ),
            );
            for change in &status.drift.changes {
                push_line(&mut out, format!("  {} {}", change.kind.symbol(), change.path));
            }
        }
        out
    }

    pub fn restore(&self, report: &RestoreReport) -> String {
        let mut out = String::new();
        let what = match (&report.branch, &report.source) {
            (Some(branch), _) => format!("switched to branch {}", branch),
            (None, Some(source)) => format!("checked out {}", source.short()),
            (None, None) => "restored".to_string(),
        };
        push_line(
            &mut out,
            format!("{} {} ({})", self.icons.check, what, report.commit.id.short()),
        );
        push_line(&mut out, format!("  {}", report.changes.summary()));
        out
    }

    pub fn branches(&self, branches: &[BranchInfo]) -> String {
        let mut out = String::new();
        for branch in branches {
            let marker = if branch.current { "*" } else { " " };
            let head = branch
                .head
                .as_ref()
                .map(|id| id.short().to_string())
                .unwrap_or_else(|| "(empty)".to_string());
            push_line(&mut out, format!("{} {}  {}", marker, branch.name, head));
        }
        out
    }

    pub fn tags(&self, tags: &[Tag]) -> String {
        if tags.is_empty() {
            return "No tags.\n".to_string();
        }
        let rows: Vec<[String; 3]> = tags
            .iter()
            .map(|t| {
                [
                    t.name.clone(),
                    t.commit.short().to_string(),
                    t.message.lines().next().unwrap_or_default().to_string(),
                ]
            })
            .collect();
        table(
            &["TAG".to_string(), "COMMIT".to_string(), "MESSAGE".to_string()],
            &rows,
        )
    }

    pub fn stats(&self, stats: &HistoryStats) -> String {
        let mut out = String::new();
        push_line(&mut out, format!("commits   {}", stats.commits));
        for (outcome, count) in &stats.outcomes {
            push_line(&mut out, format!("  {:<12}{}", outcome, count));
        }
        push_line(&mut out, format!("branches  {}", stats.branches));
        push_line(&mut out, format!("tags      {}", stats.tags));
        push_line(&mut out, format!("size      {}", human_size(stats.size_bytes)));
        if !stats.authors.is_empty() {
            push_line(&mut out, "authors".to_string());
            for (author, count) in &stats.authors {
                push_line(&mut out, format!("  {:<12}{}", author, count));
            }
        }
        out
    }

    pub fn prune(&self, report: &PruneReport) -> String {
        format!(
            "{} Pruned {} commit(s), {} snapshot(s), {} blob(s)\n",
            self.icons.check, report.commits, report.snapshots, report.blobs
        )
    }

    pub fn backup_created(&self, info: &BackupInfo) -> String {
        format!(
            "{} Backup written: {} ({} items, {} bytes)\n",
            self.icons.check,
            info.path.display(),
            info.items,
            info.size
        )
    }

    pub fn backups(&self, backups: &[BackupInfo]) -> String {
        if backups.is_empty() {
            return "No backups.\n".to_string();
        }
        let rows: Vec<[String; 4]> = backups
            .iter()
            .map(|b| {
                [
                    b.file_name(),
                    b.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    b.commit
                        .as_deref()
                        .map(|c| c.chars().take(12).collect())
                        .unwrap_or_else(|| "-".to_string()),
                    b.items.to_string(),
                ]
            })
            .collect();
        table(
            &[
                "FILE".to_string(),
                "CREATED".to_string(),
                "COMMIT".to_string(),
                "ITEMS".to_string(),
            ],
            &rows,
        )
    }

    pub fn doctor_check(&self, check: &DoctorCheck) -> String {
        let icon = match check.status {
            CheckStatus::Pass => self.icons.check,
            CheckStatus::Warning => self.icons.warn,
            CheckStatus::Error => self.icons.cross,
        };
        let mut out = String::new();
        push_line(&mut out, format!("{} {} - {}", icon, check.name, check.message));
        let show_details = self.verbose > 0 || check.status != CheckStatus::Pass;
        if show_details {
            for line in &check.details {
                push_line(&mut out, format!("    {}", line));
            }
        }
        out
    }

    pub fn doctor_summary(&self, report: &DoctorReport) -> String {
        format!(
            "\nSummary: {} passed, {} warnings, {} errors\n",
            report.count(CheckStatus::Pass),
            report.count(CheckStatus::Warning),
            report.count(CheckStatus::Error)
        )
    }
}

fn push_line(out: &mut String, line: String) {
    out.push_str(&line);
    out.push('\n');
}

fn backend(domain: &Domain) -> String {
    format!("{}:{}", domain.backend_address.url_host(), domain.port)
}

fn expiry_suffix(record: &CertificateRecord, now: DateTime<Utc>) -> String {
    match record.days_remaining(now) {
        Some(days) if days >= 0 => format!(", {} days left", days),
        Some(_) => ", expired".to_string(),
        None => String::new(),
    }
}

fn cert_cell(record: &CertificateRecord, now: DateTime<Utc>, threshold: Duration) -> String {
    let state = record.classify(now, threshold);
    if state == CertState::None {
        return "-".to_string();
    }
    format!("{}{}", state, expiry_suffix(record, now))
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    while size >= 1024.0 && unit + 1 < UNITS.len() {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}

/// Left-aligned columns separated by two spaces
fn table<const N: usize>(header: &[String; N], rows: &[[String; N]]) -> String {
    let mut widths = [0usize; N];
    for row in std::iter::once(header).chain(rows.iter()) {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }
    let mut out = String::new();
    for row in std::iter::once(header).chain(rows.iter()) {
        let line = row
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
            .collect::<Vec<_>>()
            .join("  ");
        push_line(&mut out, line.trim_end().to_string());
    }
    out
}

// JSON documents

pub fn domain_json(domain: &Domain, certificate: Option<&CertificateRecord>) -> Value {
    json!({
        "name": domain.name.as_str(),
        "port": domain.port.get(),
        "backend_address": domain.backend_address.as_str(),
        "tls": domain.tls,
        "wildcard": domain.wildcard,
        "template": domain.template,
        "created_at": domain.created_at.to_rfc3339(),
        "updated_at": domain.updated_at.to_rfc3339(),
        "certificate": certificate.map(certificate_json),
    })
}

pub fn certificate_json(record: &CertificateRecord) -> Value {
    json!({
        "domain": record.domain.as_str(),
        "state": record.state.as_str(),
        "mode": record.mode.as_str(),
        "cert_path": record.cert_path.display().to_string(),
        "key_path": record.key_path.display().to_string(),
        "expires_at": record.expires_at.map(|t| t.to_rfc3339()),
        "last_checked": record.last_checked.map(|t| t.to_rfc3339()),
    })
}

pub fn commit_json(commit: &Commit) -> Value {
    json!({
        "id": commit.id.as_str(),
        "parent": commit.parent.as_ref().map(|p| p.as_str().to_string()),
        "snapshot": commit.snapshot.as_str(),
        "registry": commit.registry.as_ref().map(|r| r.as_str().to_string()),
        "message": commit.message,
        "author": commit.author,
        "outcome": commit.outcome.as_str(),
        "timestamp": commit.timestamp.to_rfc3339(),
    })
}

pub fn diff_json(changes: &TreeDiff) -> Value {
    Value::Array(
        changes
            .changes
            .iter()
            .map(|c| json!({ "path": c.path, "change": c.kind.as_str() }))
            .collect(),
    )
}

pub fn apply_json(report: &ApplyReport) -> Value {
    json!({
        "event": "complete",
        "command": report.operation,
        "success": !report.is_degraded(),
        "domain": domain_json(&report.domain, report.certificate.as_ref()),
        "commit": report.commit.as_ref().map(commit_json),
        "stages": report.stages.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
        "tls_live": report.tls_live,
        "certificate_action": report.cert_action.map(|a| a.as_str()),
        "unresolved": report.unresolved,
        "error": report.degraded.as_ref().map(|e| e.to_string()),
    })
}

pub fn remove_json(report: &RemoveReport) -> Value {
    json!({
        "event": "complete",
        "command": "delete",
        "success": report.degraded.is_none(),
        "domain": report.domain.name.as_str(),
        "commit": commit_json(&report.commit),
        "certificate_deleted": report.certificate_deleted,
        "error": report.degraded.as_ref().map(|e| e.to_string()),
    })
}

pub fn restore_json(command: &str, report: &RestoreReport) -> Value {
    json!({
        "event": "complete",
        "command": command,
        "success": true,
        "source": report.source.as_ref().map(|s| s.as_str().to_string()),
        "branch": report.branch,
        "commit": commit_json(&report.commit),
        "changes": diff_json(&report.changes),
    })
}

pub fn status_json(status: &HistoryStatus, domains: usize) -> Value {
    json!({
        "branch": status.branch,
        "head": status.head.as_ref().map(commit_json),
        "domains": domains,
        "clean": status.is_clean(),
        "drift": diff_json(&status.drift),
    })
}

pub fn backup_json(info: &BackupInfo) -> Value {
    json!({
        "path": info.path.display().to_string(),
        "created_at": info.created_at.to_rfc3339(),
        "commit": info.commit,
        "items": info.items,
        "size": info.size,
    })
}

pub fn tag_json(tag: &Tag) -> Value {
    json!({
        "name": tag.name,
        "commit": tag.commit.as_str(),
        "message": tag.message,
        "created_at": tag.created_at.to_rfc3339(),
    })
}

pub fn stats_json(stats: &HistoryStats) -> Value {
    json!({
        "commits": stats.commits,
        "branches": stats.branches,
        "tags": stats.tags,
        "outcomes": stats.outcomes,
        "authors": stats.authors,
        "size_bytes": stats.size_bytes,
    })
}

pub fn doctor_check_json(check: &DoctorCheck) -> Value {
    json!({
        "event": "check",
        "name": check.name,
        "status": check.status.as_str(),
        "message": check.message,
        "details": check.details,
    })
}
