//! Wheelwright CLI - builds the dependency closure of seed wheels from source

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

mod cli;
mod logging;

use cli::Cli;
use wheelwright::builder::{CommandBuildStep, HookRegistry};
use wheelwright::core::{ArtifactStore, TargetEnvironment};
use wheelwright::metadata::WheelMetadataReader;
use wheelwright::ops::{discover_seeds, write_report, Assembler, Validator, REPORT_FILE};
use wheelwright::util::config::{
    global_config_path, load_config, DEFAULT_LOG_DIR, DEFAULT_SEEDS_DIR, DEFAULT_STORE_DIR,
};
use wheelwright::util::fs::ensure_dir;
use wheelwright::util::process::find_python;

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    // Parse CLI
    let cli = Cli::parse();

    // Load configuration (global + explicit)
    let config = load_config(global_config_path().as_deref(), cli.config.as_deref())?;

    // Directories: CLI > config > defaults
    let store_dir = cli
        .store_dir
        .or_else(|| config.paths.store.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR));
    let log_dir = cli
        .log_dir
        .or_else(|| config.paths.logs.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR));
    let seeds_dir = cli
        .seeds
        .or_else(|| config.paths.seeds.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SEEDS_DIR));

    ensure_dir(&store_dir)?;
    ensure_dir(&log_dir)?;

    // Set up logging
    logging::init(&log_dir, cli.verbose)?;

    let python = find_python(cli.python.as_deref().unwrap_or(config.interpreter()));

    let mut env = TargetEnvironment::for_interpreter(&python).with_overrides(&config.target);
    if let Some(platform) = cli.sys_platform {
        env.set("sys_platform", platform);
    }
    info!(
        "target: sys_platform={} python_version={}",
        env.get("sys_platform").unwrap_or("?"),
        env.get("python_version").unwrap_or("?")
    );

    let store = ArtifactStore::new(&store_dir);
    let validator = Validator::new(config.validate.command(), python.clone());
    let hooks = HookRegistry::from_config(&config.hooks());
    let mut step = CommandBuildStep::new(config.build.command(), python, &store, &log_dir)
        .with_env(config.build.environment())
        .with_hooks(hooks);
    let reader = WheelMetadataReader::new(env);

    let seeds = discover_seeds(&seeds_dir)?;
    info!("{} seed(s) in {}", seeds.len(), seeds_dir.display());

    let report = Assembler::new(&store, &validator, &mut step, &reader).run(&seeds)?;
    write_report(&log_dir, &report, &store)?;
    info!("report written to {}", log_dir.join(REPORT_FILE).display());

    let failures = report.failure_count();
    if failures > 0 {
        error!(
            "{} failure(s); affected seeds: {}",
            failures,
            report.failed_seeds().join(", ")
        );
        return Ok(1);
    }

    info!("done; store at {}", store_dir.display());
    Ok(0)
}
