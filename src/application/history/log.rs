//! Lazy commit log

use std::collections::HashSet;

use crate::domain::entities::{Commit, CommitId};
use crate::domain::ports::HistoryStore;
use crate::error::{EngineError, EngineResult};

/// Walks parent pointers from a starting commit, newest first
///
/// Each commit is loaded only when the iterator reaches it. Cloning gives an
/// independent walk from the same position, so a log can be restarted.
#[derive(Clone)]
pub struct CommitLog<'a> {
    store: &'a dyn HistoryStore,
    next: Option<CommitId>,
    seen: HashSet<CommitId>,
}

impl<'a> CommitLog<'a> {
    pub(crate) fn new(store: &'a dyn HistoryStore, start: Option<CommitId>) -> Self {
        Self {
            store,
            next: start,
            seen: HashSet::new(),
        }
    }
}

impl Iterator for CommitLog<'_> {
    type Item = EngineResult<Commit>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next.take()?;
        if !self.seen.insert(id.clone()) {
            return Some(Err(EngineError::storage(format!(
                "commit {} appears twice in its own ancestry",
                id.short()
            ))));
        }
        match self.store.get_commit(&id) {
            Ok(commit) => {
                self.next = commit.parent.clone();
                Some(Ok(commit))
            }
            Err(e) => Some(Err(e.into())),
        }
    }
}
