//! File system helpers

use std::fs;
use std::path::Path;

use super::error::{ProxyError, Result};

/// Check that `path` exists and is a regular file
pub fn check_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(ProxyError::Config(format!("File not found: {}", path.display())));
    }

    if !path.is_file() {
        return Err(ProxyError::Config(format!("Path is not a file: {}", path.display())));
    }

    Ok(())
}

/// Read the full contents of a file
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    check_file_exists(path)?;

    fs::read(path).map_err(ProxyError::Io)
}
