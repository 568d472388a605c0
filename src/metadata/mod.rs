//! Dependency metadata of built artifacts.
//!
//! The closure walk only needs one thing from an artifact: the ordered list
//! of requirements that apply to the target environment.

pub mod reader;
pub mod wheel;

pub use reader::DependencyReader;
pub use wheel::{WheelMetadata, WheelMetadataReader};
