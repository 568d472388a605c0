//! Build step error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::util::process::TemplateError;

/// Error building a single specifier.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid build command for `{specifier}`")]
    Command {
        specifier: String,
        #[source]
        source: TemplateError,
    },

    #[error("failed to run build for `{specifier}`")]
    Spawn {
        specifier: String,
        #[source]
        source: io::Error,
    },

    #[error("build of `{specifier}` failed (exit code {}); see {}", display_code(.code), .log.display())]
    Failed {
        specifier: String,
        code: Option<i32>,
        log: PathBuf,
    },

    #[error("prerequisite for `{package}` unavailable")]
    Prerequisite {
        package: String,
        #[source]
        source: HookError,
    },
}

/// Error running a pre-build hook.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("invalid hook command")]
    Command(#[source] TemplateError),

    #[error("failed to run prerequisite build `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("prerequisite build failed (exit code {}); see {}", display_code(.code), .log.display())]
    Failed { code: Option<i32>, log: PathBuf },

    #[error("prerequisite build succeeded but {} was not installed", .marker.display())]
    MarkerMissing { marker: PathBuf },

    #[error("prerequisite build already failed earlier in this run")]
    PreviouslyFailed,
}

pub(crate) fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none".to_string(),
    }
}
