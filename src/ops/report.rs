//! The `report.json` summary written at the end of a run.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::warn;

use crate::builder::Failure;
use crate::core::{ArtifactStore, BaseId, Specifier};
use crate::ops::assemble::{RunReport, SeedReport};
use crate::util::fs::write_string;
use crate::util::hash::artifact_digest;

/// Report filename inside the log directory.
pub const REPORT_FILE: &str = "report.json";

#[derive(Debug, Serialize)]
struct ReportDocument<'a> {
    store: String,
    failures: usize,
    seeds: Vec<SeedEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct SeedEntry<'a> {
    seed: &'a str,
    validated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    validation_error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    accept_error: Option<&'a str>,
    built: Vec<BuiltEntry<'a>>,
    present: &'a [BaseId],
    undetermined: &'a [Specifier],
    failures: &'a [Failure],
}

#[derive(Debug, Serialize)]
struct BuiltEntry<'a> {
    specifier: &'a Specifier,
    base: &'a BaseId,
    artifacts: Vec<ArtifactEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct ArtifactEntry<'a> {
    name: &'a str,
    /// `sha256:<hex>`, absent if the file could not be read
    #[serde(skip_serializing_if = "Option::is_none")]
    sha256: Option<String>,
}

fn seed_entry<'a>(seed: &'a SeedReport, store: &ArtifactStore) -> SeedEntry<'a> {
    let built = seed
        .closure
        .built
        .iter()
        .map(|pkg| BuiltEntry {
            specifier: &pkg.specifier,
            base: &pkg.base,
            artifacts: pkg
                .artifacts
                .iter()
                .map(|name| {
                    let sha256 = match artifact_digest(&store.path(name)) {
                        Ok(digest) => Some(digest),
                        Err(e) => {
                            warn!("{:#}", e);
                            None
                        }
                    };
                    ArtifactEntry { name, sha256 }
                })
                .collect(),
        })
        .collect();

    SeedEntry {
        seed: &seed.seed,
        validated: seed.validated,
        validation_error: seed.validation_error.as_deref(),
        accept_error: seed.accept_error.as_deref(),
        built,
        present: &seed.closure.present,
        undetermined: &seed.closure.undetermined,
        failures: &seed.closure.failures,
    }
}

/// Render the run report as pretty JSON.
pub fn render_report(report: &RunReport, store: &ArtifactStore) -> Result<String> {
    let document = ReportDocument {
        store: store.root().display().to_string(),
        failures: report.failure_count(),
        seeds: report.seeds.iter().map(|s| seed_entry(s, store)).collect(),
    };
    serde_json::to_string_pretty(&document).context("failed to serialize run report")
}

/// Write `report.json` into `log_dir`.
pub fn write_report(log_dir: &Path, report: &RunReport, store: &ArtifactStore) -> Result<()> {
    let path = log_dir.join(REPORT_FILE);
    let json = render_report(report, store)?;
    write_string(&path, &json)
}
