//! gzip-compressed tar archives of named byte entries
//!
//! Backups are small (a registry, a snapshot's files and some PEM files), so
//! archives are built and read fully in memory.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Component, Path};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Archive, Builder, EntryType, Header};

use crate::infrastructure::fs::{atomic_write_mode, PRIVATE_MODE};

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("failed to write archive {path}: {message}")]
    Write { path: String, message: String },

    #[error("failed to read archive {path}: {message}")]
    Read { path: String, message: String },

    #[error("archive {path} contains unsafe entry '{entry}'")]
    UnsafeEntry { path: String, entry: String },
}

/// Encode `entries` as tar.gz bytes; entry order follows the map
pub fn encode(entries: &BTreeMap<String, Vec<u8>>) -> std::io::Result<Vec<u8>> {
    let mut data = Vec::new();
    {
        let encoder = GzEncoder::new(&mut data, Compression::default());
        let mut builder = Builder::new(encoder);
        for (name, bytes) in entries {
            let mut header = Header::new_gnu();
            header.set_size(bytes.len() as u64);
            header.set_mode(0o600);
            header.set_entry_type(EntryType::Regular);
            header.set_cksum();
            builder.append_data(&mut header, name, bytes.as_slice())?;
        }
        builder.into_inner()?.finish()?;
    }
    Ok(data)
}

fn is_safe(name: &Path) -> bool {
    name.components().all(|c| matches!(c, Component::Normal(_)))
}

/// Decode tar.gz bytes; `label` names the source in errors
pub fn decode(label: &str, data: &[u8]) -> Result<BTreeMap<String, Vec<u8>>, ArchiveError> {
    let read_err = |message: String| ArchiveError::Read {
        path: label.to_string(),
        message,
    };

    let mut archive = Archive::new(GzDecoder::new(data));
    let mut entries = BTreeMap::new();
    for entry in archive.entries().map_err(|e| read_err(e.to_string()))? {
        let mut entry = entry.map_err(|e| read_err(e.to_string()))?;
        if entry.header().entry_type() != EntryType::Regular {
            continue;
        }
        let name = entry
            .path()
            .map_err(|e| read_err(e.to_string()))?
            .into_owned();
        if !is_safe(&name) {
            return Err(ArchiveError::UnsafeEntry {
                path: label.to_string(),
                entry: name.display().to_string(),
            });
        }
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| read_err(e.to_string()))?;
        entries.insert(name.to_string_lossy().into_owned(), bytes);
    }
    Ok(entries)
}

/// Archives may hold private keys, so they are written owner-only
pub fn write_archive(path: &Path, entries: &BTreeMap<String, Vec<u8>>) -> Result<(), ArchiveError> {
    let write_err = |message: String| ArchiveError::Write {
        path: path.display().to_string(),
        message,
    };
    let data = encode(entries).map_err(|e| write_err(e.to_string()))?;
    atomic_write_mode(path, &data, PRIVATE_MODE).map_err(|e| write_err(e.to_string()))
}

pub fn read_archive(path: &Path) -> Result<BTreeMap<String, Vec<u8>>, ArchiveError> {
    let label = path.display().to_string();
    let data = std::fs::read(path).map_err(|e| ArchiveError::Read {
        path: label.clone(),
        message: e.to_string(),
    })?;
    decode(&label, &data)
}
