//! Transitive closure builder.
//!
//! Walks the dependency graph breadth-first from a set of initial
//! specifiers. Every dequeued specifier is reduced to its base identity; the
//! first specifier seen for a base is the only one ever considered, and a
//! base that already has an artifact in the store is never built. Anything
//! else is handed to the [`BuildStep`], the store is diffed to find what it
//! produced, and the dependencies of those artifacts are appended to the
//! queue.
//!
//! Identity is name-only. Whichever version the first build (or an existing
//! artifact) provides satisfies every later requirement on that name; no
//! version constraint is ever checked against another.

use std::collections::{HashSet, VecDeque};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::builder::step::BuildStep;
use crate::core::store::Snapshot;
use crate::core::{ArtifactStore, BaseId, Specifier};
use crate::metadata::DependencyReader;

/// Base identities already processed in a walk.
///
/// Entries are inserted at most once and never removed.
#[derive(Debug, Default)]
pub struct SeenSet {
    inner: HashSet<BaseId>,
}

impl SeenSet {
    pub fn new() -> Self {
        SeenSet::default()
    }

    /// Insert `base`, returning `false` if it was already present.
    pub fn insert(&mut self, base: BaseId) -> bool {
        self.inner.insert(base)
    }

    pub fn contains(&self, base: &BaseId) -> bool {
        self.inner.contains(base)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// A package whose build step succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuiltPackage {
    pub specifier: Specifier,
    pub base: BaseId,
    /// Artifact filenames attributed to the build.
    pub artifacts: Vec<String>,
}

/// A package that could not be built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub specifier: Specifier,
    pub base: BaseId,
    pub message: String,
}

/// Outcome of one closure walk.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClosureReport {
    /// Successful builds, in build order.
    pub built: Vec<BuiltPackage>,
    /// Bases satisfied by an artifact already in the store.
    pub present: Vec<BaseId>,
    /// Builds that failed.
    pub failures: Vec<Failure>,
    /// Successful builds whose artifacts could not be determined.
    pub undetermined: Vec<Specifier>,
}

impl ClosureReport {
    /// Whether at least one build step succeeded.
    pub fn built_any(&self) -> bool {
        !self.built.is_empty()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Breadth-first closure builder.
///
/// Owns the queue and seen set of a walk; borrows the store, build step and
/// metadata reader. Single-threaded: the store diff assumes nothing else
/// writes to the store while a build runs.
pub struct ClosureBuilder<'a> {
    store: &'a ArtifactStore,
    step: &'a mut dyn BuildStep,
    reader: &'a dyn DependencyReader,
    queue: VecDeque<Specifier>,
    seen: SeenSet,
}

impl<'a> ClosureBuilder<'a> {
    pub fn new(
        store: &'a ArtifactStore,
        step: &'a mut dyn BuildStep,
        reader: &'a dyn DependencyReader,
    ) -> Self {
        ClosureBuilder {
            store,
            step,
            reader,
            queue: VecDeque::new(),
            seen: SeenSet::new(),
        }
    }

    /// Bases processed by the most recent walk.
    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    /// Walk the closure of `initial` until the queue is exhausted.
    pub fn run(&mut self, initial: impl IntoIterator<Item = Specifier>) -> ClosureReport {
        self.queue = initial.into_iter().collect();
        self.seen = SeenSet::new();

        let mut report = ClosureReport::default();
        while let Some(specifier) = self.queue.pop_front() {
            self.process(specifier, &mut report);
        }

        if report.has_failures() {
            warn!("{} failure(s) while building the closure", report.failure_count());
        }
        report
    }

    fn process(&mut self, specifier: Specifier, report: &mut ClosureReport) {
        if specifier.is_blank() {
            return;
        }

        let base = specifier.base();
        if self.seen.contains(&base) {
            debug!("skip {} (already processed {})", specifier, base);
            return;
        }
        self.seen.insert(base.clone());

        match self.store.find(&base) {
            Ok(Some(existing)) => {
                info!("have {} ({})", base, existing);
                report.present.push(base);
                return;
            }
            Ok(None) => {}
            Err(e) => {
                let message = format!("failed to inspect artifact store: {}", e);
                record_failure(specifier, base, message, report);
                return;
            }
        }

        let before = match self.store.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let message = format!("failed to inspect artifact store: {}", e);
                record_failure(specifier, base, message, report);
                return;
            }
        };

        info!("Building {}", specifier);
        if let Err(e) = self.step.build(&specifier, &base) {
            record_failure(specifier, base, format_chain(&e), report);
            return;
        }

        let artifacts = self.produced(&specifier, &base, &before, report);
        for artifact in &artifacts {
            let deps = self.reader.dependencies(&self.store.path(artifact));
            if !deps.is_empty() {
                debug!(
                    "{} requires {}",
                    artifact,
                    deps.iter().map(Specifier::as_str).collect::<Vec<_>>().join(", ")
                );
            }
            self.queue.extend(deps);
        }

        report.built.push(BuiltPackage {
            specifier,
            base,
            artifacts,
        });
    }

    /// Work out which artifacts a successful build produced.
    ///
    /// Only artifacts new to the store carry dependencies forward. When the
    /// diff is empty the build may have found its artifact already present;
    /// failing that, the store is searched for any separator spelling of the name.
    fn produced(
        &self,
        specifier: &Specifier,
        base: &BaseId,
        before: &Snapshot,
        report: &mut ClosureReport,
    ) -> Vec<String> {
        let diff = match self.store.snapshot() {
            Ok(after) => ArtifactStore::diff(before, &after),
            Err(e) => {
                warn!("failed to re-read artifact store after building {}: {}", specifier, e);
                Default::default()
            }
        };
        if !diff.is_empty() {
            info!(
                "built {} -> {}",
                base,
                diff.iter().cloned().collect::<Vec<_>>().join(", ")
            );
            return diff.into_iter().collect();
        }

        if let Ok(Some(existing)) = self.store.find(base) {
            info!("have {} ({}); build produced nothing new", base, existing);
            return Vec::new();
        }

        let guessed = self.store.guess(base);
        if !guessed.is_empty() {
            warn!(
                "could not diff artifacts for {}; guessed {}",
                specifier,
                guessed.join(", ")
            );
            return guessed;
        }

        warn!(
            "build of {} succeeded but its artifacts could not be determined; inspect {}",
            specifier,
            self.store.root().display()
        );
        report.undetermined.push(specifier.clone());
        Vec::new()
    }
}

fn record_failure(specifier: Specifier, base: BaseId, message: String, report: &mut ClosureReport) {
    warn!("failed to build {}: {}", specifier, message);
    report.failures.push(Failure {
        specifier,
        base,
        message,
    });
}

/// Render an error with its sources, `outer: inner: root`.
fn format_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
