//! Artifact store inspection.
//!
//! The store is a flat directory of wheels shared by every build. The closure
//! walk never asks a build what it produced; it snapshots the store before the
//! build and diffs afterwards. That is only sound while a single build writes
//! to the store at a time.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use glob::{glob_with, MatchOptions};

use crate::core::specifier::BaseId;

/// Extension of artifacts tracked in the store.
pub const WHEEL_EXTENSION: &str = "whl";

/// Point-in-time listing of artifact filenames.
pub type Snapshot = BTreeSet<String>;

/// The output directory accumulating validated and built wheels.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ArtifactStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of an artifact filename.
    pub fn path(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    /// Create the store directory if it does not exist.
    pub fn ensure(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    /// List artifact filenames currently in the store.
    ///
    /// A missing store is empty. Files without the wheel extension and
    /// directories are ignored.
    pub fn snapshot(&self) -> io::Result<Snapshot> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Snapshot::new()),
            Err(e) => return Err(e),
        };

        let mut names = Snapshot::new();
        for entry in entries {
            let path = entry?.path();
            // Follows symlinks; a dangling link is not an artifact.
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(WHEEL_EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.insert(name.to_string());
            }
        }
        Ok(names)
    }

    /// Filenames present in `after` but not in `before`.
    pub fn diff(before: &Snapshot, after: &Snapshot) -> Snapshot {
        after.difference(before).cloned().collect()
    }

    /// First artifact (in filename order) whose name belongs to `base`.
    ///
    /// Matching is a case-insensitive prefix test of `<form>-` for both the
    /// hyphen and underscore forms of the base identity.
    pub fn find(&self, base: &BaseId) -> io::Result<Option<String>> {
        let snapshot = self.snapshot()?;
        Ok(snapshot.into_iter().find(|name| matches_base(name, base)))
    }

    /// Whether any artifact in the store belongs to `base`.
    pub fn has(&self, base: &BaseId) -> io::Result<bool> {
        Ok(self.find(base)?.is_some())
    }

    /// Best-effort guess at artifacts for `base` when diffing found nothing.
    ///
    /// Looser than [`ArtifactStore::find`] only in how the name is spelled:
    /// the filename must start with the base identity, with any of `-`, `_`
    /// or `.` between its segments, followed by the `-` that ends the
    /// distribution name.
    pub fn guess(&self, base: &BaseId) -> Vec<String> {
        let options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::new()
        };
        let name = base
            .as_str()
            .split('-')
            .map(glob::Pattern::escape)
            .collect::<Vec<_>>()
            .join("[-_.]");
        let root = glob::Pattern::escape(&self.root.to_string_lossy());
        let pattern = format!("{}/{}-*.{}", root, name, WHEEL_EXTENSION);

        let paths = match glob_with(&pattern, options) {
            Ok(paths) => paths,
            Err(e) => {
                tracing::debug!("invalid glob pattern {}: {}", pattern, e);
                return Vec::new();
            }
        };

        let mut found = BTreeSet::new();
        for entry in paths {
            match entry {
                Ok(path) if path.is_file() => {
                    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                        found.insert(name.to_string());
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("glob error: {}", e),
            }
        }
        found.into_iter().collect()
    }
}

/// Whether a wheel filename belongs to `base`.
pub fn matches_base(filename: &str, base: &BaseId) -> bool {
    let lower = filename.to_lowercase();
    base.forms()
        .iter()
        .any(|form| lower.starts_with(&format!("{}-", form)))
}
