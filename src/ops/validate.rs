//! Seed validation.
//!
//! A seed is installed on its own, without dependencies, into a throwaway
//! directory. Passing says the wheel is structurally installable; it says
//! nothing about whether its dependencies can be satisfied.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;
use tracing::debug;

use crate::builder::errors::display_code;
use crate::util::process::{CommandTemplate, TemplateError};

/// Lines of installer stderr kept in a validation error.
const STDERR_TAIL_LINES: usize = 20;

/// Error validating a seed artifact.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid validation command")]
    Command(#[source] TemplateError),

    #[error("failed to create scratch directory")]
    Scratch(#[source] io::Error),

    #[error("failed to run install check for {}", .artifact.display())]
    Spawn {
        artifact: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} failed an isolated install (exit code {})\n{}", .artifact.display(), display_code(.code), .stderr)]
    Failed {
        artifact: PathBuf,
        code: Option<i32>,
        stderr: String,
    },
}

/// Runs the isolated install check.
#[derive(Debug, Clone)]
pub struct Validator {
    command: CommandTemplate,
    python: String,
}

impl Validator {
    pub fn new(command: CommandTemplate, python: impl Into<String>) -> Self {
        Validator {
            command,
            python: python.into(),
        }
    }

    /// Install `artifact` alone into a scratch directory that is removed
    /// afterwards.
    pub fn validate(&self, artifact: &Path) -> Result<(), ValidationError> {
        let scratch = TempDir::with_prefix("wheelwright-validate-").map_err(ValidationError::Scratch)?;
        let artifact_str = artifact.display().to_string();
        let scratch_str = scratch.path().display().to_string();

        let process = self
            .command
            .render(&[
                ("python", self.python.as_str()),
                ("artifact", artifact_str.as_str()),
                ("scratch", scratch_str.as_str()),
            ])
            .map_err(ValidationError::Command)?;
        debug!("validating with `{}`", process.display_command());

        let output = process.exec().map_err(|source| ValidationError::Spawn {
            artifact: artifact.to_path_buf(),
            source,
        })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(ValidationError::Failed {
                artifact: artifact.to_path_buf(),
                code: output.status.code(),
                stderr: tail(&String::from_utf8_lossy(&output.stderr), STDERR_TAIL_LINES),
            })
        }
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim_end().lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandTemplate {
        CommandTemplate::new(["sh", "-c", script, "validate", "{artifact}", "{scratch}"])
    }

    #[test]
    fn test_validate_success_uses_scratch_dir() {
        let tmp = TempDir::new().unwrap();
        let seen = tmp.path().join("scratch-path");
        let script = format!("test -d \"$2\" && echo \"$2\" > {}", seen.display());
        let validator = Validator::new(sh(&script), "python3");

        validator.validate(&tmp.path().join("seed-1.0.whl")).unwrap();

        let scratch = std::fs::read_to_string(&seen).unwrap();
        assert!(!Path::new(scratch.trim()).exists(), "scratch dir must be removed");
    }

    #[test]
    fn test_validate_failure_keeps_stderr_tail() {
        let validator = Validator::new(
            sh("echo first >&2; echo 'ERROR: bad wheel' >&2; exit 1"),
            "python3",
        );

        let err = validator.validate(Path::new("/seeds/bad-1.0.whl")).unwrap_err();
        match &err {
            ValidationError::Failed { code, stderr, .. } => {
                assert_eq!(*code, Some(1));
                assert!(stderr.contains("ERROR: bad wheel"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("bad-1.0.whl"));
    }

    #[test]
    fn test_tail() {
        assert_eq!(tail("a\nb\nc\n", 2), "b\nc");
        assert_eq!(tail("only", 5), "only");
        assert_eq!(tail("", 5), "");
    }
}
