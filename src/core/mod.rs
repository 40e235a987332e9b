//! Core data types.

pub mod descriptor;
pub mod version;

pub use descriptor::{CompatibilityRange, ToolkitDescriptor, ToolkitOrigin};
pub use version::{ToolkitVersion, VersionError};
