//! Wheelwright - builds the dependency closure of a set of Python wheels
//! from source.
//!
//! This crate provides the core library functionality for wheelwright,
//! including requirement parsing, marker evaluation, the closure walk and
//! the build and validation steps.

pub mod builder;
pub mod core;
pub mod metadata;
pub mod ops;
pub mod util;

/// Test utilities and fakes for wheelwright unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides a scripted build step, a table-driven
/// dependency reader and a fixture wheel writer.
#[cfg(test)]
pub mod test_support;

pub use builder::{ClosureBuilder, ClosureReport, CommandBuildStep, HookRegistry};
pub use crate::core::{ArtifactStore, BaseId, Specifier, TargetEnvironment};
pub use metadata::WheelMetadataReader;
pub use ops::{Assembler, RunReport, Validator};
pub use util::config::Config;
