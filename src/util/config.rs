//! Configuration file support for wheelwright.
//!
//! Two configuration file locations are supported:
//! - Global: `~/.wheelwright/config.toml` - User-wide defaults
//! - Explicit: the file passed with `--config`
//!
//! The explicit file takes precedence over the global one, and command-line
//! flags take precedence over both.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::util::process::CommandTemplate;

/// Default seed directory.
pub const DEFAULT_SEEDS_DIR: &str = "/seeds";

/// Default artifact store directory.
pub const DEFAULT_STORE_DIR: &str = "/wheelhouse";

/// Default log directory.
pub const DEFAULT_LOG_DIR: &str = "/wheelhouse-logs";

/// Default Python interpreter name.
pub const DEFAULT_PYTHON: &str = "python3";

/// wheelwright configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory locations
    pub paths: PathsConfig,

    /// Interpreter settings
    pub python: PythonConfig,

    /// Per-package build step
    pub build: BuildConfig,

    /// Seed validation step
    pub validate: ValidateConfig,

    /// Marker variable overrides for the target environment
    pub target: BTreeMap<String, String>,

    /// Pre-build hooks; `None` installs the built-in defaults
    pub hooks: Option<Vec<HookConfig>>,
}

/// Directory locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the seed wheels
    pub seeds: Option<PathBuf>,

    /// Output artifact store
    pub store: Option<PathBuf>,

    /// Log directory
    pub logs: Option<PathBuf>,
}

/// Interpreter settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PythonConfig {
    /// Interpreter used by the default commands (e.g. python3.12)
    pub interpreter: Option<String>,
}

/// Build step settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Build command; placeholders `{python}`, `{specifier}`, `{store}`
    pub command: Option<CommandTemplate>,

    /// Extra environment for every build
    pub env: BTreeMap<String, String>,
}

/// Validation step settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidateConfig {
    /// Install command; placeholders `{python}`, `{artifact}`, `{scratch}`
    pub command: Option<CommandTemplate>,
}

/// A native prerequisite built once before a specific package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookConfig {
    /// Package the hook applies to (any spelling; it is canonicalized)
    pub package: String,

    /// File whose presence means the prerequisite is installed
    pub marker: PathBuf,

    /// Command that builds and installs the prerequisite; placeholder `{python}`
    pub command: CommandTemplate,

    /// Environment for the hook command
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Extra environment for the package's own build
    #[serde(default)]
    pub build_env: BTreeMap<String, String>,
}

/// The built-in hook table: Arrow C++ ahead of `pyarrow`.
pub fn default_hooks() -> Vec<HookConfig> {
    let prefix = "/opt/arrow";
    let mut build_env = BTreeMap::new();
    build_env.insert("ARROW_HOME".to_string(), prefix.to_string());
    build_env.insert(
        "CMAKE_PREFIX_PATH".to_string(),
        prefix.to_string(),
    );

    vec![HookConfig {
        package: "pyarrow".to_string(),
        marker: PathBuf::from(prefix).join("lib").join("libarrow.so"),
        command: CommandTemplate::new(["build-arrow-cpp", prefix]),
        env: BTreeMap::new(),
        build_env,
    }]
}

impl BuildConfig {
    /// The build command, defaulting to a forced from-source `pip wheel`.
    pub fn command(&self) -> CommandTemplate {
        self.command.clone().unwrap_or_else(|| {
            CommandTemplate::new([
                "{python}",
                "-m",
                "pip",
                "wheel",
                "--no-deps",
                "--no-binary",
                ":all:",
                "--wheel-dir",
                "{store}",
                "{specifier}",
            ])
        })
    }

    /// Build environment: the from-source default overlaid with `env`.
    pub fn environment(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert("PIP_NO_BINARY".to_string(), ":all:".to_string());
        env.insert("PIP_DISABLE_PIP_VERSION_CHECK".to_string(), "1".to_string());
        env.extend(self.env.clone());
        env
    }
}

impl ValidateConfig {
    /// The validation command, defaulting to an isolated `pip install --no-deps`.
    pub fn command(&self) -> CommandTemplate {
        self.command.clone().unwrap_or_else(|| {
            CommandTemplate::new([
                "{python}",
                "-m",
                "pip",
                "install",
                "--no-deps",
                "--no-index",
                "--no-compile",
                "--target",
                "{scratch}",
                "{artifact}",
            ])
        })
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.paths.seeds.is_some() {
            self.paths.seeds = other.paths.seeds;
        }
        if other.paths.store.is_some() {
            self.paths.store = other.paths.store;
        }
        if other.paths.logs.is_some() {
            self.paths.logs = other.paths.logs;
        }

        if other.python.interpreter.is_some() {
            self.python.interpreter = other.python.interpreter;
        }

        if other.build.command.is_some() {
            self.build.command = other.build.command;
        }
        self.build.env.extend(other.build.env);

        if other.validate.command.is_some() {
            self.validate.command = other.validate.command;
        }

        self.target.extend(other.target);

        // Hook tables replace rather than merge.
        if other.hooks.is_some() {
            self.hooks = other.hooks;
        }
    }

    /// Interpreter name, defaulting to `python3`.
    pub fn interpreter(&self) -> &str {
        self.python.interpreter.as_deref().unwrap_or(DEFAULT_PYTHON)
    }

    /// The configured hook table, or the built-in defaults.
    pub fn hooks(&self) -> Vec<HookConfig> {
        self.hooks.clone().unwrap_or_else(default_hooks)
    }
}

/// Get the global wheelwright config directory (~/.wheelwright).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".wheelwright"))
}

/// Get the global config path (~/.wheelwright/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Load merged configuration.
///
/// Order of precedence (highest to lowest):
/// 1. Explicit config file (must exist and parse)
/// 2. Global config (~/.wheelwright/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, explicit_path: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        config.merge(Config::load_or_default(global_path));
    }

    if let Some(explicit_path) = explicit_path {
        config.merge(Config::load(explicit_path)?);
    }

    Ok(config)
}
