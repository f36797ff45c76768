//! Deploy Use Case
//!
//! Orchestrates every change to the managed configuration:
//! 1. Render the desired entries for a domain (or take a stored tree)
//! 2. Stage them in the managed directories, remembering what was there
//! 3. Ask the daemon to validate, then reload
//! 4. On any daemon failure, put the remembered entries back
//! 5. Persist the registry and record exactly one commit
//!
//! Two locks are involved. The per-domain operation lock rejects a second
//! concurrent operation on the same name with `Conflict`. The pipeline mutex
//! serializes daemon sessions across domains, because the daemon validates
//! the whole directory at once. Certificate requests run outside the
//! pipeline mutex so a slow issuance does not stall other domains.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::application::certificates::{CertAction, CertificateProvisioner};
use crate::application::history::{HistoryStatus, VersionControl, HEAD};
use crate::application::locks::{CancelToken, OperationGuard, OperationLocks};
use crate::application::registry::DomainRegistry;
use crate::config::ActivationMode;
use crate::domain::entities::{
    CertState, CertificateRecord, Commit, ConfigTree, Domain, DomainPatch, Outcome, Registry,
    Snapshot, TreeEntry,
};
use crate::domain::ports::{
    DaemonControl, DaemonError, DeployEvent, DeployEventSink, DeployStage, Entry, FileSystem,
    FsError, FsResult, NoopEventSink, TemplateSource,
};
use crate::domain::services::{
    Differ, RenderContext, Rendered, TemplateRenderer, DEFAULT_TEMPLATE,
};
use crate::domain::value_objects::{DomainName, SiteLayout, AVAILABLE_KEY, ENABLED_KEY};
use crate::error::{EngineError, EngineResult, FailedStage};

use super::options::{parse_name, ApplyOptions, DomainRequest, EditRequest, RemoveOptions};
use super::result::{ApplyReport, RemoveReport, RenewOutcome, RestoreReport};

/// Desired state per snapshot key; `None` removes the entry
type Plan = BTreeMap<String, Option<TreeEntry>>;

/// An entry we changed and what it held before
struct Staged {
    path: PathBuf,
    prior: Entry,
}

pub struct DeployUseCase<FS>
where
    FS: FileSystem,
{
    fs: FS,
    layout: SiteLayout,
    activation: ActivationMode,
    registry: DomainRegistry,
    history: VersionControl,
    daemon: Arc<dyn DaemonControl>,
    certificates: CertificateProvisioner,
    templates: Arc<dyn TemplateSource>,
    renderer: TemplateRenderer,
    locks: OperationLocks,
    pipeline: Mutex<()>,
    events: Arc<dyn DeployEventSink>,
}

impl<FS> DeployUseCase<FS>
where
    FS: FileSystem,
{
    pub fn new(
        fs: FS,
        layout: SiteLayout,
        registry: DomainRegistry,
        history: VersionControl,
        daemon: Arc<dyn DaemonControl>,
        certificates: CertificateProvisioner,
        templates: Arc<dyn TemplateSource>,
    ) -> Self {
        Self {
            fs,
            layout,
            activation: ActivationMode::default(),
            registry,
            history,
            daemon,
            certificates,
            templates,
            renderer: TemplateRenderer::new(),
            locks: OperationLocks::new(),
            pipeline: Mutex::new(()),
            events: Arc::new(NoopEventSink),
        }
    }

    pub fn with_activation(mut self, activation: ActivationMode) -> Self {
        self.activation = activation;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn DeployEventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn registry(&self) -> &DomainRegistry {
        &self.registry
    }

    pub fn history(&self) -> &VersionControl {
        &self.history
    }

    pub fn certificates(&self) -> &CertificateProvisioner {
        &self.certificates
    }

    pub fn layout(&self) -> &SiteLayout {
        &self.layout
    }

    pub fn locks(&self) -> &OperationLocks {
        &self.locks
    }

    pub fn file_system(&self) -> &FS {
        &self.fs
    }

    pub fn daemon(&self) -> &dyn DaemonControl {
        self.daemon.as_ref()
    }

    /// Register a domain and bring it live
    pub fn add(&self, request: DomainRequest, options: &ApplyOptions) -> EngineResult<ApplyReport> {
        let domain = request.into_domain()?;
        let target = domain.name.to_string();
        self.started("add", &target);
        let result = self.add_inner(domain, options);
        self.finished("add", &target, result)
    }

    /// Change an existing domain; the name itself cannot change
    pub fn edit(
        &self,
        name: &str,
        request: EditRequest,
        options: &ApplyOptions,
    ) -> EngineResult<ApplyReport> {
        let name = parse_name(name)?;
        let patch = request.into_patch()?;
        if patch.is_empty() {
            return Err(EngineError::validation(format!(
                "nothing to change for {}",
                name
            )));
        }
        let target = name.to_string();
        self.started("edit", &target);
        let result = self.edit_inner(&name, &patch, options);
        self.finished("edit", &target, result)
    }

    /// Re-render and redeploy a domain as it is registered
    pub fn apply(&self, name: &str, options: &ApplyOptions) -> EngineResult<ApplyReport> {
        let name = parse_name(name)?;
        let target = name.to_string();
        self.started("apply", &target);
        let result = self.apply_inner(&name, options);
        self.finished("apply", &target, result)
    }

    /// Take a domain offline and drop it from the registry
    pub fn remove(&self, name: &str, options: &RemoveOptions) -> EngineResult<RemoveReport> {
        let name = parse_name(name)?;
        let target = name.to_string();
        self.started("remove", &target);
        let result = self.remove_inner(&name, options);
        self.finished("remove", &target, result)
    }

    /// Renew the certificate of one domain and reload the daemon
    pub fn renew(
        &self,
        name: &str,
        force: bool,
        options: &ApplyOptions,
    ) -> EngineResult<ApplyReport> {
        let name = parse_name(name)?;
        let target = name.to_string();
        self.started("renew", &target);
        let result = self.renew_inner(&name, force, options);
        self.finished("renew", &target, result)
    }

    /// Renew every TLS domain whose certificate is inside the renewal window
    ///
    /// One failing domain does not stop the others.
    pub fn renew_due(&self, options: &ApplyOptions) -> EngineResult<Vec<RenewOutcome>> {
        let registry = self.registry.load()?;
        let now = Utc::now();
        let threshold = self.certificates.settings().renew_before;

        let mut outcomes = Vec::new();
        for domain in registry.all().iter().filter(|d| d.tls) {
            let due = registry
                .certificate(&domain.name)
                .map_or(true, |r| !r.is_fresh(now, threshold));
            if !due {
                debug!(domain = %domain.name, "certificate not due");
                continue;
            }
            if options.cancel.is_cancelled() {
                break;
            }
            outcomes.push(RenewOutcome {
                domain: domain.name.to_string(),
                result: self.renew(domain.name.as_str(), false, options),
            });
        }
        Ok(outcomes)
    }

    /// Re-read expiry of every certificate on disk and store the result
    pub fn check_certificates(&self) -> EngineResult<Vec<CertificateRecord>> {
        let now = Utc::now();
        let mut writer = self.registry.lock()?;
        let records = writer.registry().certificates.clone();

        let mut checked = Vec::with_capacity(records.len());
        for record in records {
            match self.certificates.check_expiry(&record, now) {
                Ok(updated) => {
                    writer.put_certificate(updated.clone());
                    checked.push(updated);
                }
                Err(e) => {
                    warn!(domain = %record.domain, error = %e, "could not check certificate");
                    checked.push(record);
                }
            }
        }
        writer.commit()?;
        Ok(checked)
    }

    /// Make the managed tree and registry match a commit
    ///
    /// Checking out a branch name also switches to that branch; any other
    /// reference keeps the current branch and records the restore on it.
    pub fn checkout(&self, reference: &str, options: &ApplyOptions) -> EngineResult<RestoreReport> {
        self.started("checkout", reference);
        let result = self.checkout_inner(reference, options);
        self.finished("checkout", reference, result)
    }

    /// Deploy a complete tree from outside history (backup restore)
    ///
    /// `guard` must be the exclusive lock from [`DeployUseCase::locks`], so
    /// the caller can prepare files under the same lock.
    pub fn restore_tree(
        &self,
        guard: &OperationGuard<'_>,
        label: &str,
        tree: ConfigTree,
        registry: Option<Registry>,
        options: &ApplyOptions,
    ) -> EngineResult<RestoreReport> {
        self.started("restore", label);
        let result = if self.locks.holds_all(guard) {
            let message = options.message_or(|| format!("restore {}", label));
            self.restore_locked(label, tree, registry, None, &message, &options.cancel)
        } else {
            Err(EngineError::validation(
                "restore needs the exclusive operation lock",
            ))
        };
        self.finished("restore", label, result)
    }

    /// Record the live tree as a manual commit
    pub fn checkpoint(&self, message: &str) -> EngineResult<Commit> {
        let _guard = self.locks.try_all()?;
        let _pipeline = self.pipeline();
        let registry = self.registry.load()?;
        self.commit_live(&registry, message, Outcome::Manual)
    }

    /// Compare the live tree with the head of the current branch
    pub fn status(&self) -> EngineResult<HistoryStatus> {
        self.history.status(&self.live_tree()?)
    }

    /// Managed entries as they are on disk right now
    pub fn live_tree(&self) -> EngineResult<ConfigTree> {
        let mut tree = ConfigTree::new();
        for (key_dir, dir) in [
            (AVAILABLE_KEY, self.layout.available_dir()),
            (ENABLED_KEY, self.layout.enabled_dir()),
        ] {
            for file in self.fs.list(dir)? {
                if !self.layout.is_managed(&file) {
                    continue;
                }
                let entry = match self.fs.entry(&dir.join(&file))? {
                    Entry::Absent => continue,
                    Entry::File(bytes) => TreeEntry::File(bytes),
                    Entry::Link(target) => TreeEntry::Link(target.to_string_lossy().into_owned()),
                };
                tree.insert(format!("{}/{}", key_dir, file), entry);
            }
        }
        Ok(tree)
    }

    /// Render the configuration text for `domain` without touching disk
    pub fn render(&self, domain: &Domain, tls: bool) -> EngineResult<Rendered> {
        let template = match &domain.template {
            Some(name) => self.templates.load(name)?,
            None => DEFAULT_TEMPLATE.to_string(),
        };
        let paths = self.certificates.paths(&domain.name);
        let ctx = RenderContext {
            domain,
            layout: &self.layout,
            certificate: &paths,
            tls,
        };
        self.renderer.render(&template, &ctx)
    }

    fn add_inner(&self, domain: Domain, options: &ApplyOptions) -> EngineResult<ApplyReport> {
        let _guard = self.locks.try_domain(&domain.name)?;
        if self.registry.load()?.contains(&domain.name) {
            return Err(EngineError::validation(format!(
                "domain '{}' is already registered",
                domain.name
            )));
        }
        let message = options.message_or(|| describe_add(&domain));
        self.deploy_domain("add", domain, true, options, &message)
    }

    fn edit_inner(
        &self,
        name: &DomainName,
        patch: &DomainPatch,
        options: &ApplyOptions,
    ) -> EngineResult<ApplyReport> {
        let _guard = self.locks.try_domain(name)?;
        let current = self.registry.get(name)?;
        let next = current.patched(patch, Utc::now());
        let message = options.message_or(|| format!("edit {}: {}", name, describe_patch(patch)));
        self.deploy_domain("edit", next, false, options, &message)
    }

    fn apply_inner(&self, name: &DomainName, options: &ApplyOptions) -> EngineResult<ApplyReport> {
        let _guard = self.locks.try_domain(name)?;
        let current = self.registry.get(name)?;
        let message = options.message_or(|| format!("apply {}", name));
        self.deploy_domain("apply", current, false, options, &message)
    }

    /// Shared flow of add, edit and apply
    ///
    /// Without a usable certificate a TLS domain first goes live over plain
    /// HTTP, which the HTTP challenge needs anyway; the TLS variant follows
    /// once issuance succeeded. A certificate failure leaves the plain
    /// configuration live and is reported as `degraded`.
    fn deploy_domain(
        &self,
        operation: &'static str,
        domain: Domain,
        is_new: bool,
        options: &ApplyOptions,
        message: &str,
    ) -> EngineResult<ApplyReport> {
        let target = domain.name.to_string();
        let now = Utc::now();
        let mut report = ApplyReport::new(operation, domain.clone());
        let mut record = self.registry.certificate(&domain.name)?;

        let tls_ready = domain.tls && record.as_ref().is_some_and(|r| r.is_usable(now));
        let rendered = self.render(&domain, tls_ready)?;
        self.note_rendered(&target, &rendered, &mut report);

        {
            let _pipeline = self.pipeline();
            let plan = self.domain_plan(&domain, &rendered.text);
            self.activate_or_record(&target, &plan, &options.cancel, message)?;
        }
        went_live(&mut report);
        report.tls_live = tls_ready;

        if domain.tls && !tls_ready {
            let provision =
                self.certificates
                    .provision(&domain, record.as_ref(), now, self.events.as_ref());
            report.cert_action = Some(provision.action);
            let usable = provision.record.is_usable(Utc::now());
            record = Some(provision.record);

            match provision.error {
                Some(err) => {
                    warn!(domain = %target, error = %err, "serving without TLS");
                    report.degraded = Some(err);
                }
                None if usable => match self.activate_tls(&domain, &mut report) {
                    Ok(()) => report.tls_live = true,
                    Err(err) => {
                        warn!(domain = %target, error = %err, "TLS configuration was not activated");
                        report.degraded = Some(err);
                    }
                },
                None => {
                    report.degraded = Some(EngineError::Certificate {
                        domain: target.clone(),
                        message: "certificate is not usable".to_string(),
                        diagnostics: String::new(),
                    });
                }
            }
        }

        if report.tls_live {
            if let Some(r) = record.as_mut() {
                promote(r);
            }
        }
        report.certificate = record.clone().filter(|_| domain.tls);

        let _pipeline = self.pipeline();
        let saved = {
            let mut writer = self.registry.lock()?;
            if is_new {
                writer.add(domain.clone())?;
            } else {
                writer.replace(domain.clone())?;
            }
            match record.filter(|_| domain.tls) {
                Some(r) => writer.put_certificate(r),
                None => {
                    if writer.remove_certificate(&domain.name).is_some() {
                        info!(domain = %target, "certificate record dropped with TLS turned off");
                    }
                }
            }
            writer.commit()?
        };
        report.commit = Some(self.commit_live(&saved, message, Outcome::Applied)?);
        Ok(report)
    }

    /// Second daemon session swapping the plain variant for the TLS one
    fn activate_tls(&self, domain: &Domain, report: &mut ApplyReport) -> EngineResult<()> {
        let target = domain.name.to_string();
        let rendered = self.render(domain, true)?;
        self.note_rendered(&target, &rendered, report);

        let _pipeline = self.pipeline();
        let plan = self.domain_plan(domain, &rendered.text);
        // The plain variant is already live; cancelling now would not undo it
        self.activate(&target, &plan, &CancelToken::new())
    }

    fn remove_inner(
        &self,
        name: &DomainName,
        options: &RemoveOptions,
    ) -> EngineResult<RemoveReport> {
        let _guard = self.locks.try_domain(name)?;
        let domain = self.registry.get(name)?;
        let target = name.to_string();
        let message = options
            .message
            .clone()
            .unwrap_or_else(|| format!("remove {}", name));

        let mut plan = Plan::new();
        plan.insert(self.layout.available_key(name), None);
        plan.insert(self.layout.enabled_key(name), None);

        let pipeline = self.pipeline();
        self.activate_or_record(&target, &plan, &options.cancel, &message)?;
        let (saved, certificate) = {
            let mut writer = self.registry.lock()?;
            let certificate = writer.registry().certificate(name).cloned();
            writer.delete(name)?;
            writer.remove_certificate(name);
            (writer.commit()?, certificate)
        };
        let commit = self.commit_live(&saved, &message, Outcome::Applied)?;
        drop(pipeline);

        let mut report = RemoveReport {
            domain,
            commit,
            certificate_deleted: false,
            degraded: None,
        };
        if options.purge_certificate && certificate.is_some() {
            let shared = saved
                .all()
                .iter()
                .any(|d| d.tls && d.name.base() == name.base());
            if shared {
                info!(domain = %name, "certificate is shared with another domain; keeping it");
            } else {
                match self.certificates.delete(name) {
                    Ok(()) => report.certificate_deleted = true,
                    Err(err) => report.degraded = Some(err),
                }
            }
        }
        Ok(report)
    }

    fn renew_inner(
        &self,
        name: &DomainName,
        force: bool,
        options: &ApplyOptions,
    ) -> EngineResult<ApplyReport> {
        let _guard = self.locks.try_domain(name)?;
        let domain = self.registry.get(name)?;
        if !domain.tls {
            return Err(EngineError::validation(format!(
                "TLS is not enabled for {}",
                name
            )));
        }
        let target = name.to_string();
        let now = Utc::now();
        let existing = self.registry.certificate(name)?;
        let was_usable = existing.as_ref().is_some_and(|r| r.is_usable(now));

        let mut report = ApplyReport::new("renew", domain.clone());
        let provision =
            self.certificates
                .renew(&domain, existing.as_ref(), force, now, self.events.as_ref());
        report.cert_action = Some(provision.action);
        let mut record = provision.record;

        if let Some(err) = provision.error {
            warn!(domain = %target, error = %err, "renewal failed");
            self.save_certificate(record.clone())?;
            report.tls_live = was_usable;
            report.certificate = Some(record);
            report.degraded = Some(err);
            return Ok(report);
        }
        if provision.action == CertAction::Kept {
            report.tls_live = was_usable;
            report.certificate = Some(record);
            return Ok(report);
        }

        // New material on disk; the daemon only picks it up on reload
        self.save_certificate(record.clone())?;
        let message = options.message_or(|| format!("renew {}", name));
        let rendered = self.render(&domain, true)?;
        self.note_rendered(&target, &rendered, &mut report);

        let _pipeline = self.pipeline();
        let plan = self.domain_plan(&domain, &rendered.text);
        self.activate_or_record(&target, &plan, &options.cancel, &message)?;
        went_live(&mut report);
        report.tls_live = true;

        promote(&mut record);
        let saved = {
            let mut writer = self.registry.lock()?;
            writer.put_certificate(record.clone());
            writer.commit()?
        };
        report.commit = Some(self.commit_live(&saved, &message, Outcome::Applied)?);
        report.certificate = Some(record);
        Ok(report)
    }

    fn checkout_inner(
        &self,
        reference: &str,
        options: &ApplyOptions,
    ) -> EngineResult<RestoreReport> {
        let _guard = self.locks.try_all()?;
        let id = self.history.resolve(reference)?;
        let branch = if reference != HEAD && self.history.is_branch(reference)? {
            Some(reference)
        } else {
            None
        };

        let commit = self.history.get_commit(&id)?;
        let tree = self.history.materialize(&commit.snapshot)?;
        let registry = self
            .history
            .registry_at(&commit)?
            .map(|bytes| self.registry.import(&bytes))
            .transpose()?;

        let message = options.message_or(|| format!("checkout {} ({})", reference, id.short()));
        let mut report =
            self.restore_locked(reference, tree, registry, branch, &message, &options.cancel)?;
        report.source = Some(id);
        Ok(report)
    }

    /// Replace the managed tree wholesale; caller holds the exclusive lock
    fn restore_locked(
        &self,
        target: &str,
        tree: ConfigTree,
        registry: Option<Registry>,
        branch: Option<&str>,
        message: &str,
        cancel: &CancelToken,
    ) -> EngineResult<RestoreReport> {
        if let Some(key) = tree.keys().find(|k| self.layout.resolve_key(k).is_none()) {
            return Err(EngineError::validation(format!(
                "entry '{}' is outside the managed directories",
                key
            )));
        }

        let live = self.live_tree()?;
        let mut plan: Plan = live
            .keys()
            .filter(|k| !tree.contains_key(*k))
            .map(|k| (k.clone(), None))
            .collect();
        plan.extend(tree.iter().map(|(k, e)| (k.clone(), Some(e.clone()))));
        let changes =
            Differ::new().diff_snapshots(&Snapshot::from_tree(&live).0, &Snapshot::from_tree(&tree).0);

        let _pipeline = self.pipeline();
        self.activate_or_record(target, &plan, cancel, message)?;

        if let Some(branch) = branch {
            self.history.switch_branch(branch)?;
        }
        let saved = match registry {
            Some(registry) => {
                let mut writer = self.registry.lock()?;
                writer.replace_all(registry);
                writer.commit()?
            }
            None => self.registry.load()?,
        };
        let commit = self.commit_live(&saved, message, Outcome::Manual)?;
        Ok(RestoreReport {
            source: None,
            branch: branch.map(str::to_string),
            commit,
            changes,
        })
    }

    fn domain_plan(&self, domain: &Domain, text: &str) -> Plan {
        let bytes = text.as_bytes().to_vec();
        let enabled = match self.activation {
            ActivationMode::Symlink => TreeEntry::Link(
                self.layout
                    .available_path(&domain.name)
                    .to_string_lossy()
                    .into_owned(),
            ),
            ActivationMode::Copy => TreeEntry::File(bytes.clone()),
        };

        let mut plan = Plan::new();
        plan.insert(
            self.layout.available_key(&domain.name),
            Some(TreeEntry::File(bytes)),
        );
        plan.insert(self.layout.enabled_key(&domain.name), Some(enabled));
        plan
    }

    /// Run a daemon session, committing a rolled-back attempt on failure
    ///
    /// A cancelled session changed nothing and records nothing.
    fn activate_or_record(
        &self,
        target: &str,
        plan: &Plan,
        cancel: &CancelToken,
        message: &str,
    ) -> EngineResult<()> {
        let err = match self.activate(target, plan, cancel) {
            Ok(()) => return Ok(()),
            Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
            Err(err) => err,
        };

        let note = match &err {
            EngineError::Deployment { stage, .. } => {
                format!("{} (rolled back at {} stage)", message, stage)
            }
            _ => format!("{} (rolled back)", message),
        };
        let recorded = self
            .registry
            .load()
            .and_then(|registry| self.commit_live(&registry, &note, Outcome::RolledBack));
        if let Err(commit_err) = recorded {
            warn!(error = %commit_err, "could not record the rolled-back attempt");
        }
        Err(err)
    }

    /// Stage `plan`, validate, reload; every failure puts the prior entries back
    ///
    /// Enabled entries are staged together with the rendered files because
    /// the daemon only reads the enabled directory when validating.
    /// Reloading is the point of no return for cancellation.
    fn activate(&self, target: &str, plan: &Plan, cancel: &CancelToken) -> EngineResult<()> {
        cancel.check()?;

        let mut staged = Vec::new();
        if let Err(err) = self.stage(plan, &mut staged) {
            let problems = self.revert(&staged);
            self.rolled_back(target, FailedStage::Write, problems.is_empty());
            return Err(EngineError::Deployment {
                stage: FailedStage::Write,
                message: format!("could not stage configuration: {}", err),
                diagnostics: problems.join("\n"),
            });
        }

        if let Err(err) = self.daemon.validate() {
            let problems = self.revert(&staged);
            self.rolled_back(target, FailedStage::Validate, problems.is_empty());
            return Err(deployment_error(
                FailedStage::Validate,
                "configuration rejected, changes reverted",
                &err,
                &problems,
            ));
        }
        self.stage_event(target, DeployStage::Validated);
        self.stage_event(target, DeployStage::Enabled);

        if let Err(err) = cancel.check() {
            let problems = self.revert(&staged);
            for problem in &problems {
                warn!(site = target, "{}", problem);
            }
            return Err(err);
        }

        if let Err(err) = self.daemon.reload() {
            let mut problems = self.revert(&staged);
            let mut recovered = problems.is_empty();
            if recovered {
                if let Err(e) = self.daemon.validate().and_then(|_| self.daemon.reload()) {
                    problems.push(format!("previous configuration could not be reloaded: {}", e));
                    recovered = false;
                }
            }
            self.rolled_back(target, FailedStage::Reload, recovered);
            let message = if recovered {
                "reload failed, previous configuration restored"
            } else {
                "reload failed and the previous configuration could not be restored"
            };
            return Err(deployment_error(
                FailedStage::Reload,
                message,
                &err,
                &problems,
            ));
        }
        self.stage_event(target, DeployStage::Live);
        Ok(())
    }

    /// Writes in key order (`available/` before `enabled/`), removals in
    /// reverse so nothing enabled ever points at a missing file
    fn stage(&self, plan: &Plan, staged: &mut Vec<Staged>) -> FsResult<()> {
        let writes = plan.iter().filter(|(_, desired)| desired.is_some());
        let removals = plan.iter().rev().filter(|(_, desired)| desired.is_none());

        for (key, desired) in writes.chain(removals) {
            let path = self
                .layout
                .resolve_key(key)
                .ok_or_else(|| FsError::Unsupported(format!("unmanaged entry {}", key)))?;
            let prior = self.fs.entry(&path)?;
            if entry_matches(&prior, desired.as_ref()) {
                continue;
            }
            staged.push(Staged {
                path: path.clone(),
                prior,
            });
            match desired {
                Some(TreeEntry::File(bytes)) => self.fs.write(&path, bytes)?,
                Some(TreeEntry::Link(target)) => self.fs.symlink(Path::new(target), &path)?,
                None => self.fs.remove(&path)?,
            }
        }
        Ok(())
    }

    /// Put staged entries back, newest first; returns what could not be restored
    fn revert(&self, staged: &[Staged]) -> Vec<String> {
        let mut problems = Vec::new();
        for change in staged.iter().rev() {
            if let Err(e) = self.fs.restore(&change.path, &change.prior) {
                problems.push(format!("could not restore {}: {}", change.path.display(), e));
            }
        }
        problems
    }

    fn save_certificate(&self, record: CertificateRecord) -> EngineResult<()> {
        let mut writer = self.registry.lock()?;
        writer.put_certificate(record);
        writer.commit()?;
        Ok(())
    }

    fn commit_live(
        &self,
        registry: &Registry,
        message: &str,
        outcome: Outcome,
    ) -> EngineResult<Commit> {
        let tree = self.live_tree()?;
        let bytes = self.registry.export(registry)?;
        let commit = self.history.record(&tree, Some(&bytes), message, outcome)?;
        info!(commit = commit.id.short(), outcome = %outcome, "{}", message);
        self.events.on_event(DeployEvent::Committed {
            id: commit.id.to_string(),
            outcome,
            message: message.to_string(),
        });
        Ok(commit)
    }

    fn pipeline(&self) -> MutexGuard<'_, ()> {
        self.pipeline.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn note_rendered(&self, target: &str, rendered: &Rendered, report: &mut ApplyReport) {
        report.reached(DeployStage::Rendered);
        self.stage_event(target, DeployStage::Rendered);
        if rendered.unresolved.is_empty() {
            return;
        }
        warn!(site = target, names = ?rendered.unresolved, "template placeholders left unresolved");
        self.events.on_event(DeployEvent::UnresolvedVariables {
            target: target.to_string(),
            names: rendered.unresolved.clone(),
        });
        for name in &rendered.unresolved {
            if !report.unresolved.contains(name) {
                report.unresolved.push(name.clone());
            }
        }
    }

    fn stage_event(&self, target: &str, stage: DeployStage) {
        debug!(site = target, stage = %stage, "stage reached");
        if self.events.wants_detailed_events() {
            self.events.on_event(DeployEvent::Stage {
                target: target.to_string(),
                stage,
            });
        }
    }

    fn rolled_back(&self, target: &str, stage: FailedStage, recovered: bool) {
        warn!(site = target, stage = %stage, recovered, "changes rolled back");
        self.stage_event(target, DeployStage::RolledBack);
        self.events.on_event(DeployEvent::RolledBack {
            target: target.to_string(),
            stage,
            recovered,
        });
    }

    fn started(&self, operation: &'static str, target: &str) {
        debug!(operation, site = target, "operation started");
        self.events.on_event(DeployEvent::Started {
            operation,
            target: target.to_string(),
        });
    }

    fn finished<T>(
        &self,
        operation: &'static str,
        target: &str,
        result: EngineResult<T>,
    ) -> EngineResult<T> {
        if let Err(err) = &result {
            warn!(operation, site = target, error = %err, "operation failed");
        }
        self.events.on_event(DeployEvent::Completed {
            operation,
            target: target.to_string(),
            success: result.is_ok(),
        });
        result
    }
}

fn went_live(report: &mut ApplyReport) {
    for stage in [
        DeployStage::Validated,
        DeployStage::Enabled,
        DeployStage::Live,
    ] {
        report.reached(stage);
    }
}

/// Issued and renewed certificates become active once the daemon serves them
fn promote(record: &mut CertificateRecord) {
    if matches!(record.state, CertState::Issued | CertState::Renewed) {
        if let Err(e) = record.advance(CertState::Active) {
            debug!(domain = %record.domain, error = %e, "certificate state unchanged");
        }
    }
}

fn entry_matches(current: &Entry, desired: Option<&TreeEntry>) -> bool {
    match (current, desired) {
        (Entry::Absent, None) => true,
        (Entry::File(have), Some(TreeEntry::File(want))) => have == want,
        (Entry::Link(have), Some(TreeEntry::Link(want))) => have.as_os_str() == want.as_str(),
        _ => false,
    }
}

fn deployment_error(
    stage: FailedStage,
    message: &str,
    err: &DaemonError,
    problems: &[String],
) -> EngineError {
    let mut diagnostics = err.diagnostics().trim().to_string();
    for problem in problems {
        if !diagnostics.is_empty() {
            diagnostics.push('\n');
        }
        diagnostics.push_str(problem);
    }
    EngineError::Deployment {
        stage,
        message: format!("{}: {}", message, err),
        diagnostics,
    }
}

fn describe_add(domain: &Domain) -> String {
    let mut text = format!(
        "add {} -> {}:{}",
        domain.name, domain.backend_address, domain.port
    );
    if domain.tls {
        text.push_str(" (tls)");
    }
    text
}

fn describe_patch(patch: &DomainPatch) -> String {
    let mut parts = Vec::new();
    if let Some(port) = patch.port {
        parts.push(format!("port {}", port));
    }
    if let Some(address) = &patch.backend_address {
        parts.push(format!("backend {}", address));
    }
    if let Some(tls) = patch.tls {
        parts.push(if tls { "tls on" } else { "tls off" }.to_string());
    }
    if let Some(template) = &patch.template {
        parts.push(format!(
            "template {}",
            template.as_deref().unwrap_or("default")
        ));
    }
    parts.join(", ")
}
