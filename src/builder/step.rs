//! The per-package build step.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::builder::errors::BuildError;
use crate::builder::hooks::HookRegistry;
use crate::core::{ArtifactStore, BaseId, Specifier};
use crate::util::process::CommandTemplate;

/// Builds exactly one specifier into the shared artifact store.
///
/// Implementations write zero or more artifacts into the store as a side
/// effect; the caller discovers them by diffing the store.
pub trait BuildStep {
    fn build(&mut self, specifier: &Specifier, base: &BaseId) -> Result<(), BuildError>;
}

/// Build step that shells out to a configurable from-source build command.
#[derive(Debug)]
pub struct CommandBuildStep {
    command: CommandTemplate,
    python: String,
    store: PathBuf,
    log_dir: PathBuf,
    env: BTreeMap<String, String>,
    hooks: HookRegistry,
}

impl CommandBuildStep {
    pub fn new(
        command: CommandTemplate,
        python: impl Into<String>,
        store: &ArtifactStore,
        log_dir: impl Into<PathBuf>,
    ) -> Self {
        CommandBuildStep {
            command,
            python: python.into(),
            store: store.root().to_path_buf(),
            log_dir: log_dir.into(),
            env: BTreeMap::new(),
            hooks: HookRegistry::new(),
        }
    }

    /// Environment passed to every build.
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    /// Log file capturing the build output of `base`.
    pub fn log_path(&self, base: &BaseId) -> PathBuf {
        build_log_path(&self.log_dir, base)
    }
}

/// `<log_dir>/build-<base>.log`
pub fn build_log_path(log_dir: &Path, base: &BaseId) -> PathBuf {
    log_dir.join(format!("build-{}.log", base))
}

impl BuildStep for CommandBuildStep {
    fn build(&mut self, specifier: &Specifier, base: &BaseId) -> Result<(), BuildError> {
        let extra_env = self
            .hooks
            .prepare(base, &self.python, &self.log_dir)
            .map_err(|source| BuildError::Prerequisite {
                package: base.to_string(),
                source,
            })?;

        let store = self.store.display().to_string();
        let process = self
            .command
            .render(&[
                ("python", self.python.as_str()),
                ("specifier", specifier.as_str()),
                ("store", store.as_str()),
            ])
            .map_err(|source| BuildError::Command {
                specifier: specifier.to_string(),
                source,
            })?
            .envs(&self.env)
            .envs(&extra_env);

        let log = self.log_path(base);
        debug!("running `{}` (log: {})", process.display_command(), log.display());

        let status = process
            .exec_logged(&log)
            .map_err(|source| BuildError::Spawn {
                specifier: specifier.to_string(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(BuildError::Failed {
                specifier: specifier.to_string(),
                code: status.code(),
                log,
            })
        }
    }
}
