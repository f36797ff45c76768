//! File System Implementations
//!
//! Concrete implementations of the FileSystem port.

mod local;

pub use local::{atomic_write, atomic_write_mode, LocalFs, PRIVATE_MODE, PUBLIC_MODE};
