//! Test utilities and fakes for wheelwright unit tests.
//!
//! Provides a scripted [`BuildStep`] that writes empty wheels into a store
//! directory, a table-driven [`DependencyReader`], and a helper that writes
//! real wheel archives with a given `Requires-Dist` list.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::builder::{BuildError, BuildStep};
use crate::core::{BaseId, Specifier};
use crate::metadata::DependencyReader;

/// What the fake build step does for a package.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Succeed and write these filenames into the store.
    Produce(Vec<String>),
    /// Succeed without writing anything.
    Nothing,
    /// Fail with a non-zero exit.
    Fail,
}

/// Scripted build step keyed by base identity.
///
/// Packages without a scripted outcome succeed without writing anything.
#[derive(Debug)]
pub struct FakeBuildStep {
    store: PathBuf,
    outcomes: HashMap<BaseId, Outcome>,
    calls: Vec<String>,
}

impl FakeBuildStep {
    pub fn new(store: &Path) -> Self {
        FakeBuildStep {
            store: store.to_path_buf(),
            outcomes: HashMap::new(),
            calls: Vec::new(),
        }
    }

    pub fn outcome(mut self, package: &str, outcome: Outcome) -> Self {
        self.outcomes.insert(BaseId::canonicalize(package), outcome);
        self
    }

    pub fn produce(self, package: &str, files: &[&str]) -> Self {
        let files = files.iter().map(|f| f.to_string()).collect();
        self.outcome(package, Outcome::Produce(files))
    }

    pub fn fail(self, package: &str) -> Self {
        self.outcome(package, Outcome::Fail)
    }

    /// Specifiers passed to `build`, in call order.
    pub fn calls(&self) -> &[String] {
        &self.calls
    }
}

impl BuildStep for FakeBuildStep {
    fn build(&mut self, specifier: &Specifier, base: &BaseId) -> Result<(), BuildError> {
        self.calls.push(specifier.to_string());
        match self.outcomes.get(base).cloned().unwrap_or(Outcome::Nothing) {
            Outcome::Produce(files) => {
                for file in files {
                    std::fs::write(self.store.join(file), b"").unwrap();
                }
                Ok(())
            }
            Outcome::Nothing => Ok(()),
            Outcome::Fail => Err(BuildError::Failed {
                specifier: specifier.to_string(),
                code: Some(1),
                log: self.store.join(format!("build-{}.log", base)),
            }),
        }
    }
}

/// Dependency reader answering from a filename table.
#[derive(Debug, Default)]
pub struct FakeReader {
    deps: HashMap<String, Vec<Specifier>>,
}

impl FakeReader {
    pub fn new() -> Self {
        FakeReader::default()
    }

    pub fn with(mut self, artifact: &str, deps: &[&str]) -> Self {
        self.deps.insert(
            artifact.to_string(),
            deps.iter().map(|d| Specifier::from(*d)).collect(),
        );
        self
    }
}

impl DependencyReader for FakeReader {
    fn dependencies(&self, artifact: &Path) -> Vec<Specifier> {
        artifact
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| self.deps.get(n))
            .cloned()
            .unwrap_or_default()
    }
}

/// Write a minimal wheel declaring `requires` into `dir`.
pub fn write_wheel(dir: &Path, filename: &str, requires: &[&str]) -> PathBuf {
    let mut parts = filename.splitn(3, '-');
    let name = parts.next().unwrap_or("pkg");
    let version = parts.next().unwrap_or("0");

    let mut metadata = format!("Metadata-Version: 2.1\nName: {}\nVersion: {}\n", name, version);
    for req in requires {
        metadata.push_str(&format!("Requires-Dist: {}\n", req));
    }
    metadata.push('\n');

    let path = dir.join(filename);
    let file = File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    zip.start_file(format!("{}-{}.dist-info/METADATA", name, version), options)
        .unwrap();
    zip.write_all(metadata.as_bytes()).unwrap();
    zip.start_file(format!("{}/__init__.py", name), options)
        .unwrap();
    zip.finish().unwrap();
    path
}
