//! Local File System Implementation
//!
//! Implements the FileSystem port for local disk operations. Every write and
//! every link replacement goes through a temporary sibling plus `rename`, so
//! the daemon never observes a half-written file.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::domain::ports::file_system::{Entry, FileSystem, FsError, FsResult};

/// Local file system implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }
}

fn parent_of(path: &Path) -> FsResult<&Path> {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| FsError::Unsupported(format!("{} has no parent directory", path.display())))
}

/// Mode for ordinary managed files
pub const PUBLIC_MODE: u32 = 0o644;
/// Mode for key material and archives that contain it
pub const PRIVATE_MODE: u32 = 0o600;

/// Write `content` to `path` atomically (temp file in the same directory + rename)
pub fn atomic_write(path: &Path, content: &[u8]) -> FsResult<()> {
    atomic_write_mode(path, content, PUBLIC_MODE)
}

/// [`atomic_write`] with explicit permission bits; `mode` is ignored off unix
pub fn atomic_write_mode(path: &Path, content: &[u8], mode: u32) -> FsResult<()> {
    let parent = parent_of(path)?;
    std::fs::create_dir_all(parent).map_err(|e| FsError::at(parent, e))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| FsError::at(parent, e))?;
    tmp.write_all(content).map_err(|e| FsError::at(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| FsError::at(tmp.path(), e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(mode))
            .map_err(|e| FsError::at(path, e))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    tmp.persist(path).map_err(|e| FsError::at(path, e.error))?;
    Ok(())
}

#[cfg(unix)]
fn replace_symlink(target: &Path, link: &Path) -> FsResult<()> {
    let parent = parent_of(link)?;
    std::fs::create_dir_all(parent).map_err(|e| FsError::at(parent, e))?;

    let file_name = link
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staging = parent.join(format!(".{}.{}.tmp", file_name, std::process::id()));
    let _ = std::fs::remove_file(&staging);

    std::os::unix::fs::symlink(target, &staging).map_err(|e| FsError::at(&staging, e))?;
    if let Err(e) = std::fs::rename(&staging, link) {
        let _ = std::fs::remove_file(&staging);
        return Err(FsError::at(link, e));
    }
    Ok(())
}

#[cfg(not(unix))]
fn replace_symlink(_target: &Path, link: &Path) -> FsResult<()> {
    Err(FsError::Unsupported(format!(
        "symbolic links are not available here; set daemon.activation = \"copy\" ({})",
        link.display()
    )))
}

impl FileSystem for LocalFs {
    fn read(&self, path: &Path) -> FsResult<Vec<u8>> {
        std::fs::read(path).map_err(|e| FsError::at(path, e))
    }

    fn write(&self, path: &Path, content: &[u8]) -> FsResult<()> {
        atomic_write(path, content)
    }

    fn write_private(&self, path: &Path, content: &[u8]) -> FsResult<()> {
        atomic_write_mode(path, content, PRIVATE_MODE)
    }

    fn exists(&self, path: &Path) -> bool {
        path.symlink_metadata().is_ok()
    }

    fn remove(&self, path: &Path) -> FsResult<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FsError::at(path, e)),
        }
    }

    fn create_dir_all(&self, path: &Path) -> FsResult<()> {
        std::fs::create_dir_all(path).map_err(|e| FsError::at(path, e))
    }

    fn symlink(&self, target: &Path, link: &Path) -> FsResult<()> {
        replace_symlink(target, link)
    }

    fn entry(&self, path: &Path) -> FsResult<Entry> {
        let meta = match path.symlink_metadata() {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Entry::Absent),
            Err(e) => return Err(FsError::at(path, e)),
        };
        let file_type = meta.file_type();
        if file_type.is_symlink() {
            let target: PathBuf = std::fs::read_link(path).map_err(|e| FsError::at(path, e))?;
            Ok(Entry::Link(target))
        } else if file_type.is_file() {
            Ok(Entry::File(self.read(path)?))
        } else {
            Err(FsError::Unsupported(format!(
                "{} is neither a file nor a link",
                path.display()
            )))
        }
    }

    fn list(&self, dir: &Path) -> FsResult<Vec<String>> {
        let read_dir = match std::fs::read_dir(dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(FsError::at(dir, e)),
        };
        let mut names = Vec::new();
        for item in read_dir {
            let item = item.map_err(|e| FsError::at(dir, e))?;
            if let Some(name) = item.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
