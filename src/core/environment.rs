//! Target environment used for marker evaluation.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

use crate::util::process::ProcessBuilder;

/// Prints the interpreter's marker variables as a JSON object.
const MARKER_SCRIPT: &str = r#"
import json, os, platform, sys
impl = sys.implementation
iv = impl.version
impl_version = "{0.major}.{0.minor}.{0.micro}".format(iv)
if iv.releaselevel != "final":
    impl_version += iv.releaselevel[0] + str(iv.serial)
print(json.dumps({
    "implementation_name": impl.name,
    "implementation_version": impl_version,
    "os_name": os.name,
    "platform_machine": platform.machine(),
    "platform_python_implementation": platform.python_implementation(),
    "platform_release": platform.release(),
    "platform_system": platform.system(),
    "platform_version": platform.version(),
    "python_full_version": platform.python_version(),
    "python_version": ".".join(platform.python_version_tuple()[:2]),
    "sys_platform": sys.platform,
}))
"#;

/// Ask `python` for its marker variables.
pub fn query_interpreter(python: &str) -> Result<BTreeMap<String, String>> {
    let output = ProcessBuilder::new(python)
        .args(["-c", MARKER_SCRIPT])
        .exec()
        .with_context(|| format!("failed to run {}", python))?;
    if !output.status.success() {
        bail!("{} exited with {}", python, output.status);
    }
    serde_json::from_slice(&output.stdout)
        .with_context(|| format!("unexpected marker output from {}", python))
}

/// Marker variables describing the platform wheels are built for.
///
/// Defaults come from the build interpreter, falling back to the host;
/// `[target]` config entries and the `--sys-platform` flag override
/// individual variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetEnvironment {
    values: BTreeMap<String, String>,
}

impl TargetEnvironment {
    /// Environment describing the machine we are running on.
    pub fn host() -> Self {
        let (sys_platform, platform_system, os_name) = match std::env::consts::OS {
            "linux" => ("linux", "Linux", "posix"),
            "macos" => ("darwin", "Darwin", "posix"),
            "windows" => ("win32", "Windows", "nt"),
            "freebsd" => ("freebsd", "FreeBSD", "posix"),
            other => (other, other, "posix"),
        };

        let machine = match (std::env::consts::OS, std::env::consts::ARCH) {
            ("macos", "aarch64") => "arm64",
            ("windows", "x86_64") => "AMD64",
            ("windows", "aarch64") => "ARM64",
            (_, arch) => arch,
        };

        let mut values = BTreeMap::new();
        for (key, value) in [
            ("sys_platform", sys_platform),
            ("platform_system", platform_system),
            ("os_name", os_name),
            ("platform_machine", machine),
            ("python_version", "3.12"),
            ("python_full_version", "3.12.0"),
            ("implementation_name", "cpython"),
            ("implementation_version", "3.12.0"),
            ("platform_python_implementation", "CPython"),
            ("platform_release", ""),
            ("platform_version", ""),
        ] {
            values.insert(key.to_string(), value.to_string());
        }

        TargetEnvironment { values }
    }

    /// Environment of the interpreter `python`, over [`host`] defaults.
    ///
    /// If the interpreter cannot be queried the host defaults are used as is.
    ///
    /// [`host`]: TargetEnvironment::host
    pub fn for_interpreter(python: &str) -> Self {
        let env = TargetEnvironment::host();
        match query_interpreter(python) {
            Ok(values) => {
                debug!("marker variables from {}: {:?}", python, values);
                env.with_overrides(&values)
            }
            Err(e) => {
                warn!("{:#}; using default marker variables", e);
                env
            }
        }
    }

    /// Look up a marker variable.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Set a marker variable.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Apply a set of overrides, later entries winning.
    pub fn with_overrides<'a>(
        mut self,
        overrides: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) -> Self {
        for (key, value) in overrides {
            self.set(key.clone(), value.clone());
        }
        self
    }
}

impl Default for TargetEnvironment {
    fn default() -> Self {
        TargetEnvironment::host()
    }
}
