//! Domain Services
//!
//! Pure business logic with no I/O: rendering templates and comparing
//! snapshots.

mod differ;
mod renderer;

pub use differ::{ChangeKind, DiffLine, DiffResult, DiffTag, Differ, EntryChange, TreeDiff};
pub use renderer::{variables, RenderContext, Rendered, TemplateRenderer, DEFAULT_TEMPLATE};
