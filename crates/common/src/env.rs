//! Environment/runtime helpers
//!
//! Sanity checks to ensure expected directories exist before a cache file is touched.

use std::path::Path;

use tracing::debug;

/// Ensure the parent directory of `file` exists, creating it recursively.
/// A bare filename (no parent component) needs nothing.
pub fn ensure_parent_dir(file: &Path) -> std::io::Result<()> {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            if !parent.exists() {
                debug!(dir = %parent.display(), "creating cache directory");
            }
            std::fs::create_dir_all(parent)
        }
        _ => Ok(()),
    }
}
