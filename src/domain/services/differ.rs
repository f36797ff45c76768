//! Differ Domain Service
//!
//! Compares snapshots entry by entry and renders line diffs of file
//! contents for `history diff` and `history show`.

use similar::{ChangeTag, TextDiff};

use crate::domain::entities::{Snapshot, SnapshotEntry};

/// How an entry differs between two snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

impl ChangeKind {
    pub fn symbol(&self) -> char {
        match self {
            ChangeKind::Added => 'A',
            ChangeKind::Removed => 'D',
            ChangeKind::Modified => 'M',
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Removed => "removed",
            ChangeKind::Modified => "modified",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryChange {
    pub path: String,
    pub kind: ChangeKind,
    pub old: Option<SnapshotEntry>,
    pub new: Option<SnapshotEntry>,
}

/// Entry-level differences, sorted by path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeDiff {
    pub changes: Vec<EntryChange>,
}

impl TreeDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind == kind).count()
    }

    /// e.g. "1 added, 0 removed, 2 modified"
    pub fn summary(&self) -> String {
        format!(
            "{} added, {} removed, {} modified",
            self.count(ChangeKind::Added),
            self.count(ChangeKind::Removed),
            self.count(ChangeKind::Modified)
        )
    }
}

/// A single line change in a text diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub tag: DiffTag,
    pub old_line: Option<usize>,
    pub new_line: Option<usize>,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffTag {
    Delete,
    Insert,
    Equal,
}

impl From<ChangeTag> for DiffTag {
    fn from(tag: ChangeTag) -> Self {
        match tag {
            ChangeTag::Delete => DiffTag::Delete,
            ChangeTag::Insert => DiffTag::Insert,
            ChangeTag::Equal => DiffTag::Equal,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    pub lines: Vec<DiffLine>,
    pub additions: usize,
    pub deletions: usize,
}

impl DiffResult {
    pub fn has_changes(&self) -> bool {
        self.additions > 0 || self.deletions > 0
    }

    /// e.g. "+5, -3"
    pub fn summary(&self) -> String {
        format!("+{}, -{}", self.additions, self.deletions)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Differ;

impl Differ {
    pub fn new() -> Self {
        Self
    }

    /// Entries added, removed or changed (by hash or kind) from `old` to `new`
    pub fn diff_snapshots(&self, old: &Snapshot, new: &Snapshot) -> TreeDiff {
        let mut changes = Vec::new();

        for (path, old_entry) in &old.entries {
            match new.entries.get(path) {
                None => changes.push(EntryChange {
                    path: path.clone(),
                    kind: ChangeKind::Removed,
                    old: Some(old_entry.clone()),
                    new: None,
                }),
                Some(new_entry) if new_entry != old_entry => changes.push(EntryChange {
                    path: path.clone(),
                    kind: ChangeKind::Modified,
                    old: Some(old_entry.clone()),
                    new: Some(new_entry.clone()),
                }),
                Some(_) => {}
            }
        }

        for (path, new_entry) in &new.entries {
            if !old.entries.contains_key(path) {
                changes.push(EntryChange {
                    path: path.clone(),
                    kind: ChangeKind::Added,
                    old: None,
                    new: Some(new_entry.clone()),
                });
            }
        }

        changes.sort_by(|a, b| a.path.cmp(&b.path));
        TreeDiff { changes }
    }

    /// Line diff between two texts
    pub fn diff_text(&self, old: &str, new: &str) -> DiffResult {
        let text_diff = TextDiff::from_lines(old, new);
        let mut result = DiffResult::default();

        for change in text_diff.iter_all_changes() {
            let tag = DiffTag::from(change.tag());
            match tag {
                DiffTag::Delete => result.deletions += 1,
                DiffTag::Insert => result.additions += 1,
                DiffTag::Equal => {}
            }
            result.lines.push(DiffLine {
                tag,
                old_line: change.old_index().map(|i| i + 1),
                new_line: change.new_index().map(|i| i + 1),
                content: change.value().to_string(),
            });
        }

        result
    }

    /// Unified diff with `a/` and `b/` headers, empty when the texts match
    pub fn unified(&self, path: &str, old: &str, new: &str) -> String {
        if old == new {
            return String::new();
        }
        TextDiff::from_lines(old, new)
            .unified_diff()
            .context_radius(3)
            .header(&format!("a/{}", path), &format!("b/{}", path))
            .to_string()
    }
}
