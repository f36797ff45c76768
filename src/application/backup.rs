//! Backup Manager
//!
//! Bundles the registry document, the live managed tree and the certificate
//! material of registered domains into one `.tar.gz` with a `manifest.json`
//! listing every entry and its SHA-256. Restoring verifies the manifest,
//! takes the exclusive operation lock, puts missing certificate files back,
//! then hands the tree and registry to the deploy use case so the usual
//! validate/reload/rollback path applies.
//!
//! Certificate files are placed where the configured certificate client
//! keeps material for each restored domain. Nothing in the archive decides
//! where a file lands.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::application::deploy::{ApplyOptions, DeployUseCase, RestoreReport};
use crate::domain::entities::{ConfigTree, EntryKind, Registry, TreeEntry};
use crate::domain::ports::FileSystem;
use crate::domain::value_objects::ContentHash;
use crate::error::{EngineError, EngineResult};
use crate::infrastructure::archive::{read_archive, write_archive};

const MANIFEST: &str = "manifest.json";
const REGISTRY: &str = "registry.json";
const TREE_DIR: &str = "tree/";
const CERTS_DIR: &str = "certs/";
const FILE_PREFIX: &str = "sitekeeper-";
const FILE_SUFFIX: &str = ".tar.gz";
const FORMAT: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Registry,
    File,
    Link,
    Certificate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestItem {
    pub path: String,
    pub kind: ItemKind,
    pub sha256: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub format: u32,
    pub created_at: DateTime<Utc>,
    /// Head commit at the time of the backup
    #[serde(default)]
    pub commit: Option<String>,
    pub items: Vec<ManifestItem>,
}

/// A backup archive on disk
#[derive(Debug, Clone)]
pub struct BackupInfo {
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub commit: Option<String>,
    pub items: usize,
    pub size: u64,
}

impl BackupInfo {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

pub struct BackupManager<'a, FS: FileSystem> {
    deploy: &'a DeployUseCase<FS>,
    dir: PathBuf,
}

impl<'a, FS: FileSystem> BackupManager<'a, FS> {
    pub fn new(deploy: &'a DeployUseCase<FS>, dir: impl Into<PathBuf>) -> Self {
        Self {
            deploy,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a new archive into the backup directory
    pub fn create(&self) -> EngineResult<BackupInfo> {
        let _guard = self.deploy.locks().try_all()?;
        let created_at = Utc::now();

        let registry = self.deploy.registry().load()?;
        let tree = self.deploy.live_tree()?;
        let commit = self.deploy.history().head()?.map(|c| c.id.to_string());

        let mut entries = BTreeMap::new();
        let mut items = Vec::new();
        let mut add = |path: String, kind: ItemKind, bytes: Vec<u8>| {
            items.push(ManifestItem {
                path: path.clone(),
                kind,
                sha256: ContentHash::from_bytes(&bytes).hex().to_string(),
                size: bytes.len() as u64,
            });
            entries.insert(path, bytes);
        };

        add(
            REGISTRY.to_string(),
            ItemKind::Registry,
            self.deploy.registry().export(&registry)?,
        );
        for (key, entry) in &tree {
            let kind = match entry.kind() {
                EntryKind::File => ItemKind::File,
                EntryKind::Link => ItemKind::Link,
            };
            add(format!("{}{}", TREE_DIR, key), kind, entry.blob().to_vec());
        }

        let fs = self.deploy.file_system();
        for file in self.certificate_files(&registry) {
            match fs.read(&file.target) {
                Ok(bytes) => add(file.entry, ItemKind::Certificate, bytes),
                Err(e) => {
                    warn!(path = %file.target.display(), error = %e, "certificate file left out of backup")
                }
            }
        }

        let manifest = Manifest {
            format: FORMAT,
            created_at,
            commit: commit.clone(),
            items,
        };
        let mut manifest_bytes = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| EngineError::storage(format!("could not encode manifest: {}", e)))?;
        manifest_bytes.push(b'\n');
        entries.insert(MANIFEST.to_string(), manifest_bytes);

        let path = self.next_path(created_at);
        write_archive(&path, &entries).map_err(|e| EngineError::storage(e.to_string()))?;
        let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        info!(path = %path.display(), items = manifest.items.len(), "backup written");

        Ok(BackupInfo {
            path,
            created_at,
            commit,
            items: manifest.items.len(),
            size,
        })
    }

    /// Archives in the backup directory, newest first
    pub fn list(&self) -> EngineResult<Vec<BackupInfo>> {
        let read_dir = match std::fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(EngineError::storage(format!(
                    "{}: {}",
                    self.dir.display(),
                    e
                )))
            }
        };

        let mut backups = Vec::new();
        for item in read_dir {
            let item = item.map_err(|e| EngineError::storage(e.to_string()))?;
            let name = item.file_name().to_string_lossy().into_owned();
            if !name.starts_with(FILE_PREFIX) || !name.ends_with(FILE_SUFFIX) {
                continue;
            }
            let path = item.path();
            match self.inspect(&path) {
                Ok(info) => backups.push(info),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable backup"),
            }
        }
        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.path.cmp(&a.path)));
        Ok(backups)
    }

    /// Read an archive's manifest without restoring it
    pub fn inspect(&self, path: &Path) -> EngineResult<BackupInfo> {
        let (manifest, _) = self.open(path)?;
        Ok(BackupInfo {
            path: path.to_path_buf(),
            created_at: manifest.created_at,
            commit: manifest.commit,
            items: manifest.items.len(),
            size: std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
        })
    }

    /// Verify an archive and deploy its contents
    ///
    /// Certificate files are only written where nothing exists yet, so a
    /// restore never replaces newer material from the certificate client.
    /// Files written here are removed again if the deploy fails.
    pub fn restore(&self, archive: &Path, options: &ApplyOptions) -> EngineResult<RestoreReport> {
        let path = self.resolve(archive);
        let (manifest, mut entries) = self.open(&path)?;
        verify(&manifest, &entries)?;

        let registry_bytes = entries
            .remove(REGISTRY)
            .ok_or_else(|| corrupt(&path, "registry.json is missing"))?;
        let registry = self.deploy.registry().import(&registry_bytes)?;

        let mut tree = ConfigTree::new();
        let mut certificates = BTreeMap::new();
        for item in &manifest.items {
            let Some(bytes) = entries.remove(&item.path) else {
                continue;
            };
            match item.kind {
                ItemKind::Registry => {}
                ItemKind::File | ItemKind::Link => {
                    let key = item.path.trim_start_matches(TREE_DIR).to_string();
                    let kind = if item.kind == ItemKind::Link {
                        EntryKind::Link
                    } else {
                        EntryKind::File
                    };
                    tree.insert(key, TreeEntry::from_blob(kind, bytes));
                }
                ItemKind::Certificate => {
                    certificates.insert(item.path.clone(), bytes);
                }
            }
        }

        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let options = ApplyOptions {
            message: Some(
                options
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("restore backup {}", label)),
            ),
            ..options.clone()
        };

        let guard = self.deploy.locks().try_all()?;
        let written = self.put_certificates(&registry, certificates)?;
        let result = self
            .deploy
            .restore_tree(&guard, &label, tree, Some(registry), &options);
        if result.is_err() {
            self.discard(&written);
        }
        result
    }

    /// Where each registered domain's certificate material lives
    fn certificate_files(&self, registry: &Registry) -> Vec<CertificateFile> {
        let provisioner = self.deploy.certificates();
        let mut files = Vec::new();
        for record in &registry.certificates {
            let paths = provisioner.paths(&record.domain);
            for (target, private) in [(paths.cert, false), (paths.key, true)] {
                let Some(file) = target.file_name() else {
                    continue;
                };
                let entry = format!(
                    "{}{}/{}",
                    CERTS_DIR,
                    record.domain.file_stem(),
                    file.to_string_lossy()
                );
                files.push(CertificateFile {
                    entry,
                    target,
                    private,
                });
            }
        }
        files
    }

    /// Write archived certificate files that are missing on disk
    fn put_certificates(
        &self,
        registry: &Registry,
        mut archived: BTreeMap<String, Vec<u8>>,
    ) -> EngineResult<Vec<PathBuf>> {
        let fs = self.deploy.file_system();
        let mut written = Vec::new();
        for file in self.certificate_files(registry) {
            let Some(bytes) = archived.remove(&file.entry) else {
                continue;
            };
            if fs.exists(&file.target) {
                continue;
            }
            let result = if file.private {
                fs.write_private(&file.target, &bytes)
            } else {
                fs.write(&file.target, &bytes)
            };
            if let Err(e) = result {
                self.discard(&written);
                return Err(e.into());
            }
            info!(path = %file.target.display(), "certificate file restored");
            written.push(file.target);
        }
        for entry in archived.keys() {
            warn!(entry = %entry, "ignoring certificate file with no registered domain");
        }
        Ok(written)
    }

    fn discard(&self, written: &[PathBuf]) {
        let fs = self.deploy.file_system();
        for path in written {
            if let Err(e) = fs.remove(path) {
                warn!(path = %path.display(), error = %e, "could not remove restored certificate file");
            }
        }
    }

    /// Bare file names are looked up in the backup directory
    fn resolve(&self, archive: &Path) -> PathBuf {
        if archive.components().count() == 1 && !archive.exists() {
            self.dir.join(archive)
        } else {
            archive.to_path_buf()
        }
    }

    fn open(&self, path: &Path) -> EngineResult<(Manifest, BTreeMap<String, Vec<u8>>)> {
        if !path.is_file() {
            return Err(EngineError::not_found("backup", path.display().to_string()));
        }
        let mut entries = read_archive(path).map_err(|e| EngineError::storage(e.to_string()))?;
        let raw = entries
            .remove(MANIFEST)
            .ok_or_else(|| corrupt(path, "manifest.json is missing"))?;
        let manifest: Manifest = serde_json::from_slice(&raw)
            .map_err(|e| corrupt(path, &format!("manifest is unreadable: {}", e)))?;
        if manifest.format != FORMAT {
            return Err(corrupt(
                path,
                &format!("unsupported backup format {}", manifest.format),
            ));
        }
        Ok((manifest, entries))
    }

    fn next_path(&self, at: DateTime<Utc>) -> PathBuf {
        let stem = format!("{}{}", FILE_PREFIX, at.format("%Y%m%d-%H%M%S"));
        let mut path = self.dir.join(format!("{}{}", stem, FILE_SUFFIX));
        let mut n = 1;
        while path.exists() {
            path = self.dir.join(format!("{}-{}{}", stem, n, FILE_SUFFIX));
            n += 1;
        }
        path
    }
}

/// Every manifest item must be present with a matching hash
fn verify(manifest: &Manifest, entries: &BTreeMap<String, Vec<u8>>) -> EngineResult<()> {
    for item in &manifest.items {
        let bytes = entries.get(&item.path).ok_or_else(|| {
            EngineError::storage(format!("backup is incomplete: {} is missing", item.path))
        })?;
        if ContentHash::from_bytes(bytes).hex() != item.sha256 {
            return Err(EngineError::storage(format!(
                "backup is corrupt: checksum mismatch for {}",
                item.path
            )));
        }
    }
    for extra in entries.keys().filter(|k| !manifest.items.iter().any(|i| &i.path == *k)) {
        warn!(entry = %extra, "ignoring archive entry not listed in the manifest");
    }
    Ok(())
}

struct CertificateFile {
    /// Archive entry name, `certs/<stem>/<file>`
    entry: String,
    target: PathBuf,
    private: bool,
}

fn corrupt(path: &Path, message: &str) -> EngineError {
    EngineError::storage(format!("backup {} is invalid: {}", path.display(), message))
}
