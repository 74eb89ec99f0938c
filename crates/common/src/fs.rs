//! File-reading helpers.
//!
//! Shader sources and other text assets are loaded through these. The lenient
//! variants log and return empty content instead of failing; callers must
//! tolerate empty text (an empty shader source simply fails to compile).

use std::path::{Path, PathBuf};

use crate::log::CORE;

/// Errors from file reads.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Read a whole file as UTF-8 text.
pub fn try_read_file(path: impl AsRef<Path>) -> Result<String, FileError> {
    let path = path.as_ref();
    std::fs::read_to_string(path).map_err(|source| FileError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a whole file, or an empty string if it cannot be read.
pub fn read_file(path: impl AsRef<Path>) -> String {
    match try_read_file(path) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(target: CORE, "{e}");
            String::new()
        }
    }
}

/// Read a file line by line, or an empty list if it cannot be read.
///
/// Line terminators (`\n` and `\r\n`) are stripped.
pub fn read_file_lines(path: impl AsRef<Path>) -> Vec<String> {
    match try_read_file(path) {
        Ok(text) => text.lines().map(str::to_owned).collect(),
        Err(e) => {
            tracing::error!(target: CORE, "{e}");
            Vec::new()
        }
    }
}
