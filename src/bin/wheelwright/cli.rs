//! CLI definitions using clap.

use std::path::PathBuf;

use clap::Parser;

/// Wheelwright - build the dependency closure of a set of seed wheels from source
#[derive(Parser)]
#[command(name = "wheelwright")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Artifact store directory [default: /wheelhouse]
    pub store_dir: Option<PathBuf>,

    /// Log directory [default: /wheelhouse-logs]
    pub log_dir: Option<PathBuf>,

    /// Directory holding the seed wheels [default: /seeds]
    #[arg(long, env = "WHEELWRIGHT_SEEDS")]
    pub seeds: Option<PathBuf>,

    /// Configuration file, layered over ~/.wheelwright/config.toml
    #[arg(long, env = "WHEELWRIGHT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Python interpreter used by the build and validation commands
    #[arg(long, env = "WHEELWRIGHT_PYTHON")]
    pub python: Option<String>,

    /// Target platform for environment markers (e.g. linux, darwin, win32)
    #[arg(long)]
    pub sys_platform: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}
