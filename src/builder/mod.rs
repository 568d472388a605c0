//! From-source build driving.
//!
//! This module implements the per-package build step, the pre-build hook
//! table, and the breadth-first closure walk that ties them together.

pub mod closure;
pub mod errors;
pub mod hooks;
pub mod step;

pub use closure::{BuiltPackage, ClosureBuilder, ClosureReport, Failure, SeenSet};
pub use errors::{BuildError, HookError};
pub use hooks::{HookRegistry, PreBuildHook};
pub use step::{build_log_path, BuildStep, CommandBuildStep};
