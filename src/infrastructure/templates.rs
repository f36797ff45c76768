//! Named templates from a directory
//!
//! `<templates_dir>/<name>.conf`. Names are plain file stems; anything that
//! could escape the directory is refused.

use std::path::PathBuf;

use crate::domain::ports::{TemplateError, TemplateSource};

const EXTENSION: &str = "conf";

#[derive(Debug, Clone)]
pub struct FsTemplateSource {
    dir: PathBuf,
}

impl FsTemplateSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn check_name(name: &str) -> Result<(), TemplateError> {
        let reason = if name.is_empty() {
            Some("is empty")
        } else if name.contains('/') || name.contains('\\') {
            Some("must not contain a path separator")
        } else if name.contains("..") || name.starts_with('.') {
            Some("must not start with '.' or contain '..'")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(TemplateError::InvalidName {
                name: name.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }
}

impl TemplateSource for FsTemplateSource {
    fn load(&self, name: &str) -> Result<String, TemplateError> {
        Self::check_name(name)?;
        let path = self.dir.join(format!("{}.{}", name, EXTENSION));
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(TemplateError::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(TemplateError::Unreadable {
                name: name.to_string(),
                message: format!("{}: {}", path.display(), e),
            }),
        }
    }

    fn names(&self) -> Result<Vec<String>, TemplateError> {
        let read_dir = match std::fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(TemplateError::Unreadable {
                    name: self.dir.display().to_string(),
                    message: e.to_string(),
                })
            }
        };
        let mut names: Vec<String> = read_dir
            .filter_map(|item| item.ok())
            .filter_map(|item| {
                let path = item.path();
                if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                    return None;
                }
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .map(str::to_string)
            })
            .collect();
        names.sort();
        Ok(names)
    }
}
