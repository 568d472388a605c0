//! Filesystem utilities.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Write a string to a file, creating parent directories if needed.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents)
        .with_context(|| format!("failed to write file: {}", path.display()))
}

/// Copy `src` into directory `dir` under its own filename.
///
/// Returns `None` if a file of that name is already present; an accepted
/// artifact is never overwritten.
pub fn copy_into_if_absent(src: &Path, dir: &Path) -> Result<Option<PathBuf>> {
    let name = src
        .file_name()
        .with_context(|| format!("not a file path: {}", src.display()))?;
    let dst = dir.join(name);
    if dst.exists() {
        return Ok(None);
    }
    ensure_dir(dir)?;
    fs::copy(src, &dst).with_context(|| {
        format!("failed to copy {} to {}", src.display(), dst.display())
    })?;
    Ok(Some(dst))
}

/// Files with the given extension directly inside `dir`, sorted by name.
pub fn list_files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in
        fs::read_dir(dir).with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
