//! High-level operations.
//!
//! This module contains the implementation of a wheelwright run.

pub mod assemble;
pub mod report;
pub mod validate;

pub use assemble::{discover_seeds, Assembler, RunReport, SeedReport};
pub use report::{render_report, write_report, REPORT_FILE};
pub use validate::{ValidationError, Validator};
