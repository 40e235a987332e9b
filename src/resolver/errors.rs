//! Fatal initialization errors.
//!
//! These are conditions no fallback strategy can work around: the toolkit
//! is found but cannot be used in this configuration.

use std::path::PathBuf;

use thiserror::Error;

use crate::compat::CompatError;
use crate::core::ToolkitVersion;

/// An unrecoverable toolkit configuration problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalError {
    #[error("{backend} {actual} is incompatible with the host's {backend} {expected}")]
    BackendMismatch {
        backend: String,
        actual: ToolkitVersion,
        expected: ToolkitVersion,
    },

    #[error("packaged CUDA {version} is missing {what} at {}", path.display())]
    PackagingDefect {
        version: ToolkitVersion,
        what: &'static str,
        path: PathBuf,
    },

    #[error(transparent)]
    NoCompatibility(#[from] CompatError),
}
