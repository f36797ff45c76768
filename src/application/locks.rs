//! Operation locks and cancellation
//!
//! Per-domain locks are try-locks: a second operation on a domain that is
//! already being changed fails with a conflict instead of queueing. Restore
//! and checkout take the whole set, since they rewrite every managed file.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::value_objects::DomainName;
use crate::error::{EngineError, EngineResult};

const ALL_DOMAINS: &str = "all domains";

#[derive(Debug, Default)]
struct LockState {
    held: HashSet<String>,
    exclusive: bool,
}

#[derive(Debug, Default)]
pub struct OperationLocks {
    state: Mutex<LockState>,
}

#[derive(Debug)]
enum Held {
    Domain(String),
    All,
}

/// Releases its lock on drop
#[derive(Debug)]
pub struct OperationGuard<'a> {
    locks: &'a OperationLocks,
    held: Held,
}

impl OperationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Lock one domain, or fail with [`EngineError::Conflict`]
    pub fn try_domain(&self, name: &DomainName) -> EngineResult<OperationGuard<'_>> {
        let mut state = self.state();
        if state.exclusive {
            return Err(EngineError::Conflict {
                domain: ALL_DOMAINS.to_string(),
            });
        }
        if !state.held.insert(name.to_string()) {
            return Err(EngineError::Conflict {
                domain: name.to_string(),
            });
        }
        Ok(OperationGuard {
            locks: self,
            held: Held::Domain(name.to_string()),
        })
    }

    /// Lock every domain; fails if any single domain is busy
    pub fn try_all(&self) -> EngineResult<OperationGuard<'_>> {
        let mut state = self.state();
        if state.exclusive {
            return Err(EngineError::Conflict {
                domain: ALL_DOMAINS.to_string(),
            });
        }
        if let Some(busy) = state.held.iter().min() {
            return Err(EngineError::Conflict {
                domain: busy.clone(),
            });
        }
        state.exclusive = true;
        Ok(OperationGuard {
            locks: self,
            held: Held::All,
        })
    }

    /// Whether `guard` is the exclusive lock taken from this set
    pub fn holds_all(&self, guard: &OperationGuard<'_>) -> bool {
        std::ptr::eq(guard.locks, self) && matches!(guard.held, Held::All)
    }

    pub fn is_locked(&self, name: &DomainName) -> bool {
        let state = self.state();
        state.exclusive || state.held.contains(name.as_str())
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.locks.state();
        match &self.held {
            Held::Domain(name) => {
                state.held.remove(name);
            }
            Held::All => state.exclusive = false,
        }
    }
}

/// Cooperative cancellation flag shared with a signal handler
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancellation was requested
    pub fn check(&self) -> EngineResult<()> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }
}
