//! Version Control Module
//!
//! ## Structure
//!
//! - `use_case` - [`VersionControl`]: snapshots, commits, branches, diff, prune
//! - `log` - [`CommitLog`], the lazy parent walk

mod log;
mod use_case;

pub use log::CommitLog;
pub use use_case::{BranchInfo, HistoryStats, HistoryStatus, PruneReport, VersionControl, HEAD};

#[cfg(test)]
mod tests;
