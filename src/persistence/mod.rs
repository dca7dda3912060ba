//! Crash-safe file writes
//!
//! Text goes to a hidden sibling file first and is renamed over the target,
//! so a reader sees either the old contents or the new ones on platforms
//! where rename replaces an existing file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Write `text` to `path`, creating parent directories as needed
pub fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir)?,
        _ => {}
    }

    let staging = staging_path(path);
    fs::write(&staging, text)?;
    commit(&staging, path).inspect_err(|_| {
        let _ = fs::remove_file(&staging);
    })
}

/// Move the staged file into place. Rename replaces the target in one step;
/// only when the platform refuses to rename over an existing file is the old
/// one removed first.
fn commit(staging: &Path, target: &Path) -> io::Result<()> {
    match fs::rename(staging, target) {
        Ok(()) => Ok(()),
        Err(e) if target.is_file() => {
            log::debug!("rename over {} failed ({}), replacing", target.display(), e);
            fs::remove_file(target)?;
            fs::rename(staging, target)
        }
        Err(e) => Err(e),
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "data".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}
