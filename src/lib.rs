//! nvkit - locate and validate a CUDA toolkit
//!
//! This crate resolves a usable toolkit, either from a packaged bundle or
//! from an existing installation, checks it against the installed driver
//! and the code generation backend, and exposes the paths and capabilities
//! downstream compilation needs.

pub mod codegen;
pub mod compat;
pub mod core;
pub mod driver;
pub mod gate;
pub mod probe;
pub mod resolver;
pub mod sources;
pub mod util;

/// Fake toolkit layouts for unit tests.
#[cfg(test)]
pub mod test_support;

pub use core::{
    CompatibilityRange, ToolkitDescriptor, ToolkitOrigin, ToolkitVersion, VersionError,
};
pub use gate::{FailureReason, GateBuilder, ResolutionState, ToolkitError, ToolkitGate};
pub use resolver::{ArtifactRegistry, FatalError, FetchOutcome};
pub use util::config::NvkitConfig;
