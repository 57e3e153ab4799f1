//! I/O helpers for journey persistence.

pub mod audit_log;
pub mod config;
pub mod declaration;
pub mod init;
pub mod progress_store;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Write `contents` via a sibling temp file (`<path>.<tmp_ext>`) and rename,
/// so readers never observe a partial file.
fn write_atomic(path: &Path, tmp_ext: &str, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension(tmp_ext);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
