//! FileSystem port - abstraction over the managed directories
//!
//! Besides plain byte I/O the engine needs to stage and inspect activation
//! references, so links are first-class here.

use std::path::{Path, PathBuf};

/// Result type for file system operations
pub type FsResult<T> = Result<T, FsError>;

/// File system operation errors
#[derive(Debug)]
pub enum FsError {
    NotFound(PathBuf),
    PermissionDenied(PathBuf),
    Io { path: PathBuf, source: std::io::Error },
    Unsupported(String),
}

impl FsError {
    /// Attach the path an `io::Error` happened on
    pub fn at(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => FsError::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => FsError::PermissionDenied(path.to_path_buf()),
            _ => FsError::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }
}

impl std::fmt::Display for FsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FsError::NotFound(path) => write!(f, "file not found: {}", path.display()),
            FsError::PermissionDenied(path) => {
                write!(f, "permission denied: {}", path.display())
            }
            FsError::Io { path, source } => write!(f, "I/O error on {}: {}", path.display(), source),
            FsError::Unsupported(msg) => write!(f, "unsupported: {}", msg),
        }
    }
}

impl std::error::Error for FsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FsError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<FsError> for crate::error::EngineError {
    fn from(err: FsError) -> Self {
        crate::error::EngineError::storage(err.to_string())
    }
}

/// What sits at a path, without following links
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Absent,
    File(Vec<u8>),
    Link(PathBuf),
}

/// Abstract file system interface
///
/// Implementations:
/// - `LocalFs` - real disk, atomic replace via temp file + rename
/// - in-memory fakes in tests
pub trait FileSystem: Send + Sync {
    fn read(&self, path: &Path) -> FsResult<Vec<u8>>;

    /// Write content atomically, creating parent directories
    fn write(&self, path: &Path, content: &[u8]) -> FsResult<()>;

    /// Like [`FileSystem::write`], readable by the owner only
    fn write_private(&self, path: &Path, content: &[u8]) -> FsResult<()> {
        self.write(path, content)
    }

    /// True for files, directories and links (dangling links included)
    fn exists(&self, path: &Path) -> bool;

    /// Remove a file or link; removing something absent is not an error
    fn remove(&self, path: &Path) -> FsResult<()>;

    fn create_dir_all(&self, path: &Path) -> FsResult<()>;

    /// Replace whatever is at `link` with a symbolic link to `target`
    fn symlink(&self, target: &Path, link: &Path) -> FsResult<()>;

    /// Describe the entry at `path` without following links
    fn entry(&self, path: &Path) -> FsResult<Entry>;

    /// File names directly inside `dir`, sorted; empty when `dir` is missing
    fn list(&self, dir: &Path) -> FsResult<Vec<String>>;

    /// Put back an entry captured with [`FileSystem::entry`]
    fn restore(&self, path: &Path, entry: &Entry) -> FsResult<()> {
        match entry {
            Entry::Absent => self.remove(path),
            Entry::File(bytes) => self.write(path, bytes),
            Entry::Link(target) => self.symlink(target, path),
        }
    }
}
