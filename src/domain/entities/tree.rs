//! Managed configuration tree and its content-addressed snapshot
//!
//! A [`ConfigTree`] holds the actual bytes of every managed entry; a
//! [`Snapshot`] records only hashes. Link entries store their target path as
//! the blob content so symlinks survive a round trip through the store.

use std::collections::BTreeMap;

use crate::domain::value_objects::ContentHash;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEntry {
    File(Vec<u8>),
    Link(String),
}

impl TreeEntry {
    pub fn kind(&self) -> EntryKind {
        match self {
            TreeEntry::File(_) => EntryKind::File,
            TreeEntry::Link(_) => EntryKind::Link,
        }
    }

    /// Bytes stored in the blob store for this entry
    pub fn blob(&self) -> &[u8] {
        match self {
            TreeEntry::File(bytes) => bytes,
            TreeEntry::Link(target) => target.as_bytes(),
        }
    }

    pub fn from_blob(kind: EntryKind, bytes: Vec<u8>) -> Self {
        match kind {
            EntryKind::File => TreeEntry::File(bytes),
            EntryKind::Link => TreeEntry::Link(String::from_utf8_lossy(&bytes).into_owned()),
        }
    }
}

/// Relative key (`available/<file>`) to entry
pub type ConfigTree = BTreeMap<String, TreeEntry>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Link,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Link => "link",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "file" => Some(EntryKind::File),
            "link" => Some(EntryKind::Link),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub hash: ContentHash,
    pub kind: EntryKind,
}

/// Immutable manifest of a managed tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub entries: BTreeMap<String, SnapshotEntry>,
}

impl Snapshot {
    pub fn new(entries: BTreeMap<String, SnapshotEntry>) -> Self {
        Self { entries }
    }

    /// Build the manifest for a tree, returning the blobs it references
    pub fn from_tree(tree: &ConfigTree) -> (Self, Vec<(ContentHash, &[u8])>) {
        let mut entries = BTreeMap::new();
        let mut blobs = Vec::with_capacity(tree.len());
        for (key, entry) in tree {
            let bytes = entry.blob();
            let hash = ContentHash::from_bytes(bytes);
            blobs.push((hash.clone(), bytes));
            entries.insert(
                key.clone(),
                SnapshotEntry {
                    hash,
                    kind: entry.kind(),
                },
            );
        }
        (Self { entries }, blobs)
    }

    /// Canonical text form; the snapshot id is its hash
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        for (key, entry) in &self.entries {
            out.push_str(entry.kind.as_str());
            out.push(' ');
            out.push_str(entry.hash.hex());
            out.push(' ');
            out.push_str(key);
            out.push('\n');
        }
        out
    }

    pub fn id(&self) -> ContentHash {
        ContentHash::from_content(&self.canonical())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
