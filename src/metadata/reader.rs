//! DependencyReader trait - common interface for metadata readers.

use std::path::Path;

use crate::core::Specifier;

/// Reads the direct dependencies declared by an artifact.
pub trait DependencyReader {
    /// Dependencies of the artifact at `artifact`, in declaration order.
    ///
    /// Requirements whose environment marker does not hold for the target are
    /// already excluded. An unreadable or malformed artifact yields an empty
    /// list, never an error.
    fn dependencies(&self, artifact: &Path) -> Vec<Specifier>;
}
