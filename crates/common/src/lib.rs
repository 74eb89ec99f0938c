//! Shared utilities for the lumen workspace.
//!
//! # Invariants
//! - Logging is initialized once per process, before the first frame.
//! - File reads never fail loudly: missing files log and yield empty content.

pub mod fs;
pub mod log;

pub use fs::{FileError, read_file, read_file_lines, try_read_file};

pub fn crate_info() -> &'static str {
    "lumen-common v0.1.0"
}
