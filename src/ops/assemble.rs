//! Implementation of a full wheelwright run.
//!
//! Seeds are processed one at a time in filename order: validate, accept
//! into the store, then walk the closure of the seed's own dependencies.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::builder::{BuildStep, ClosureBuilder, ClosureReport};
use crate::core::store::WHEEL_EXTENSION;
use crate::core::ArtifactStore;
use crate::metadata::DependencyReader;
use crate::ops::validate::Validator;
use crate::util::fs::{copy_into_if_absent, list_files_with_extension};

/// Outcome for one seed.
#[derive(Debug, Clone, Serialize)]
pub struct SeedReport {
    /// Seed wheel filename
    pub seed: String,
    /// Whether the isolated install check passed
    pub validated: bool,
    /// Why validation failed, if it did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<String>,
    /// Why a valid seed could not be copied into the store, if it could not
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept_error: Option<String>,
    /// The closure walk over the seed's dependencies
    pub closure: ClosureReport,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub seeds: Vec<SeedReport>,
}

impl RunReport {
    /// Build failures across every seed's closure walk.
    pub fn failure_count(&self) -> usize {
        self.seeds.iter().map(|s| s.closure.failure_count()).sum()
    }

    /// Seeds whose closure walk had at least one failure.
    pub fn failed_seeds(&self) -> Vec<&str> {
        self.seeds
            .iter()
            .filter(|s| s.closure.has_failures())
            .map(|s| s.seed.as_str())
            .collect()
    }

    pub fn validation_failures(&self) -> usize {
        self.seeds.iter().filter(|s| !s.validated).count()
    }

    pub fn built_any(&self) -> bool {
        self.seeds.iter().any(|s| s.closure.built_any())
    }
}

/// Seed wheels in `dir`, sorted by filename. A missing directory has none.
pub fn discover_seeds(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        warn!("seed directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }
    list_files_with_extension(dir, WHEEL_EXTENSION)
        .with_context(|| format!("failed to list seed wheels in {}", dir.display()))
}

/// Sequences validation and closure walks across all seeds.
pub struct Assembler<'a> {
    store: &'a ArtifactStore,
    validator: &'a Validator,
    step: &'a mut dyn BuildStep,
    reader: &'a dyn DependencyReader,
}

impl<'a> Assembler<'a> {
    pub fn new(
        store: &'a ArtifactStore,
        validator: &'a Validator,
        step: &'a mut dyn BuildStep,
        reader: &'a dyn DependencyReader,
    ) -> Self {
        Assembler {
            store,
            validator,
            step,
            reader,
        }
    }

    /// Process every seed. Only failing to create the store aborts the run.
    pub fn run(&mut self, seeds: &[PathBuf]) -> Result<RunReport> {
        self.store
            .ensure()
            .with_context(|| format!("failed to create store {}", self.store.root().display()))?;

        let mut report = RunReport::default();
        for seed in seeds {
            report.seeds.push(self.process_seed(seed));
        }

        info!(
            "processed {} seed(s); {} build failure(s)",
            report.seeds.len(),
            report.failure_count()
        );
        Ok(report)
    }

    fn process_seed(&mut self, seed: &Path) -> SeedReport {
        let name = seed
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| seed.display().to_string());
        info!("Validating {}", name);

        // Either way the seed's declared dependencies are still explored.
        let mut accept_error = None;
        let (validated, validation_error) = match self.validator.validate(seed) {
            Ok(()) => {
                match copy_into_if_absent(seed, self.store.root()) {
                    Ok(Some(dst)) => info!("accepted {} -> {}", name, dst.display()),
                    Ok(None) => info!("accepted {} (already in store)", name),
                    Err(e) => {
                        error!("could not accept {} into the store: {:#}", name, e);
                        accept_error = Some(format!("{:#}", e));
                    }
                }
                (true, None)
            }
            Err(e) => {
                error!("validation of {} failed: {}", name, e);
                (false, Some(e.to_string()))
            }
        };

        let deps = self.reader.dependencies(seed);
        if deps.is_empty() {
            info!("{} declares no applicable dependencies", name);
        }

        let closure = ClosureBuilder::new(self.store, &mut *self.step, self.reader).run(deps);
        if closure.has_failures() {
            error!(
                "{} failure(s) in the closure of {}: {}",
                closure.failure_count(),
                name,
                closure
                    .failures
                    .iter()
                    .map(|f| f.base.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        } else if !closure.undetermined.is_empty() {
            warn!(
                "{} build(s) in the closure of {} produced no identifiable artifacts",
                closure.undetermined.len(),
                name
            );
        }

        SeedReport {
            seed: name,
            validated,
            validation_error,
            accept_error,
            closure,
        }
    }
}
