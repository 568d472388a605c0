//! Pre-build hooks for packages with native prerequisites.
//!
//! Some packages cannot be built from source until a native library they
//! link against is installed. A hook builds that library once, and its
//! marker file makes it idempotent across runs. Hooks are looked up by base
//! identity, so the closure walk itself never special-cases a package.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::builder::errors::HookError;
use crate::core::BaseId;
use crate::util::config::HookConfig;
use crate::util::process::CommandTemplate;

/// A one-time prerequisite build for one package.
#[derive(Debug, Clone)]
pub struct PreBuildHook {
    package: BaseId,
    marker: PathBuf,
    command: CommandTemplate,
    env: BTreeMap<String, String>,
    build_env: BTreeMap<String, String>,
}

impl PreBuildHook {
    pub fn new(package: &str, marker: impl Into<PathBuf>, command: CommandTemplate) -> Self {
        PreBuildHook {
            package: BaseId::canonicalize(package),
            marker: marker.into(),
            command,
            env: BTreeMap::new(),
            build_env: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &HookConfig) -> Self {
        PreBuildHook {
            package: BaseId::canonicalize(&config.package),
            marker: config.marker.clone(),
            command: config.command.clone(),
            env: config.env.clone(),
            build_env: config.build_env.clone(),
        }
    }

    pub fn marker(&self) -> &Path {
        &self.marker
    }

    /// Whether the prerequisite is already installed.
    pub fn is_satisfied(&self) -> bool {
        self.marker.exists()
    }

    /// Run the prerequisite build unless the marker already exists.
    pub fn ensure(&self, python: &str, log: &Path) -> Result<(), HookError> {
        if self.is_satisfied() {
            info!(
                "prerequisite for {} present ({})",
                self.package,
                self.marker.display()
            );
            return Ok(());
        }

        let process = self
            .command
            .render(&[("python", python)])
            .map_err(HookError::Command)?
            .envs(&self.env);

        info!("Building prerequisite for {}: {}", self.package, process.display_command());
        let status = process.exec_logged(log).map_err(|source| HookError::Spawn {
            command: process.display_command(),
            source,
        })?;

        if !status.success() {
            return Err(HookError::Failed {
                code: status.code(),
                log: log.to_path_buf(),
            });
        }
        if !self.is_satisfied() {
            return Err(HookError::MarkerMissing {
                marker: self.marker.clone(),
            });
        }
        Ok(())
    }
}

/// Hook table keyed by base identity.
///
/// A hook that fails is remembered and not retried for the lifetime of the
/// registry.
#[derive(Debug, Default)]
pub struct HookRegistry {
    hooks: HashMap<BaseId, PreBuildHook>,
    failed: HashSet<BaseId>,
}

impl HookRegistry {
    pub fn new() -> Self {
        HookRegistry::default()
    }

    pub fn from_config(configs: &[HookConfig]) -> Self {
        let mut registry = HookRegistry::new();
        for config in configs {
            registry.register(PreBuildHook::from_config(config));
        }
        registry
    }

    /// Add a hook, replacing any previous hook for the same package.
    pub fn register(&mut self, hook: PreBuildHook) {
        self.hooks.insert(hook.package.clone(), hook);
    }

    pub fn get(&self, base: &BaseId) -> Option<&PreBuildHook> {
        self.hooks.get(base)
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run the hook for `base`, if one is registered.
    ///
    /// Returns the extra build environment the package's build needs.
    pub fn prepare(
        &mut self,
        base: &BaseId,
        python: &str,
        log_dir: &Path,
    ) -> Result<BTreeMap<String, String>, HookError> {
        let Some(hook) = self.hooks.get(base) else {
            return Ok(BTreeMap::new());
        };
        if self.failed.contains(base) {
            return Err(HookError::PreviouslyFailed);
        }

        let log = log_dir.join(format!("prereq-{}.log", base));
        match hook.ensure(python, &log) {
            Ok(()) => Ok(hook.build_env.clone()),
            Err(e) => {
                error!("prerequisite build for {} failed: {}", base, e);
                self.failed.insert(base.clone());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sh(script: &str) -> CommandTemplate {
        CommandTemplate::new(["sh", "-c", script])
    }

    #[test]
    fn test_unhooked_package_needs_nothing() {
        let tmp = TempDir::new().unwrap();
        let mut registry = HookRegistry::new();
        let env = registry
            .prepare(&BaseId::canonicalize("six"), "python3", tmp.path())
            .unwrap();
        assert!(env.is_empty());
    }

    #[test]
    fn test_hook_runs_once_and_is_memoized_by_marker() {
        let tmp = TempDir::new().unwrap();
        let marker = tmp.path().join("prefix/lib/libarrow.so");
        let counter = tmp.path().join("runs");
        let script = format!(
            "echo run >> {} && mkdir -p {} && touch {}",
            counter.display(),
            marker.parent().unwrap().display(),
            marker.display()
        );

        let mut hook = PreBuildHook::new("PyArrow", &marker, sh(&script));
        hook.build_env.insert("ARROW_HOME".into(), "/prefix".into());
        let mut registry = HookRegistry::new();
        registry.register(hook);

        let base = BaseId::canonicalize("pyarrow");
        let env = registry.prepare(&base, "python3", tmp.path()).unwrap();
        assert_eq!(env.get("ARROW_HOME").map(String::as_str), Some("/prefix"));
        registry.prepare(&base, "python3", tmp.path()).unwrap();

        let runs = std::fs::read_to_string(&counter).unwrap();
        assert_eq!(runs.lines().count(), 1);
        assert!(tmp.path().join("prereq-pyarrow.log").exists());
    }

    #[test]
    fn test_failed_hook_is_not_retried() {
        let tmp = TempDir::new().unwrap();
        let mut registry = HookRegistry::new();
        registry.register(PreBuildHook::new(
            "pyarrow",
            tmp.path().join("never"),
            sh("exit 3"),
        ));

        let base = BaseId::canonicalize("pyarrow");
        let first = registry.prepare(&base, "python3", tmp.path()).unwrap_err();
        assert!(matches!(first, HookError::Failed { code: Some(3), .. }));

        let second = registry.prepare(&base, "python3", tmp.path()).unwrap_err();
        assert!(matches!(second, HookError::PreviouslyFailed));
    }

    #[test]
    fn test_success_without_marker_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let hook = PreBuildHook::new("pyarrow", tmp.path().join("missing.so"), sh("true"));

        let err = hook.ensure("python3", &tmp.path().join("log")).unwrap_err();
        assert!(matches!(err, HookError::MarkerMissing { .. }));
    }

    #[test]
    fn test_from_config_canonicalizes_package() {
        let registry = HookRegistry::from_config(&crate::util::config::default_hooks());
        assert_eq!(registry.len(), 1);
        let hook = registry.get(&BaseId::canonicalize("pyarrow")).unwrap();
        assert_eq!(hook.marker(), Path::new("/opt/arrow/lib/libarrow.so"));
    }
}
