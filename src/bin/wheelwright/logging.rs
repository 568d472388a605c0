//! Subscriber setup: live output on stderr plus the persistent
//! `warnings.log` / `errors.log` pair in the log directory.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

pub const WARNINGS_LOG: &str = "warnings.log";
pub const ERRORS_LOG: &str = "errors.log";

fn create(log_dir: &Path, name: &str) -> Result<Mutex<File>> {
    let path = log_dir.join(name);
    let file = File::create(&path)
        .with_context(|| format!("failed to create log file: {}", path.display()))?;
    Ok(Mutex::new(file))
}

pub fn init(log_dir: &Path, verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("wheelwright=debug")
        } else {
            EnvFilter::new("wheelwright=info")
        }
    });

    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(filter);

    let warnings = fmt::layer()
        .with_writer(create(log_dir, WARNINGS_LOG)?)
        .with_ansi(false)
        .with_target(false)
        .with_filter(filter_fn(|meta| *meta.level() == Level::WARN));

    let errors = fmt::layer()
        .with_writer(create(log_dir, ERRORS_LOG)?)
        .with_ansi(false)
        .with_target(false)
        .with_filter(filter_fn(|meta| *meta.level() == Level::ERROR));

    tracing_subscriber::registry()
        .with(stderr)
        .with(warnings)
        .with(errors)
        .try_init()
        .context("failed to install log subscriber")
}
