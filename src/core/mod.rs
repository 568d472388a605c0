//! Core data structures for wheelwright.
//!
//! This module contains the foundational types used throughout wheelwright:
//! - Specifiers and base identities
//! - Environment markers and the target environment they are evaluated in
//! - The artifact store

pub mod environment;
pub mod marker;
pub mod specifier;
pub mod store;

pub use environment::TargetEnvironment;
pub use specifier::{BaseId, Requirement, Specifier, SpecifierError};
pub use store::ArtifactStore;
