//! Toolkit resolution strategies.
//!
//! Two strategies can produce a `ToolkitDescriptor`:
//! - `packaged`: fetch a versioned bundle and read it with a fixed layout
//! - `local`: search the host for an existing installation
//!
//! Either strategy reports "nothing usable" as `None`; only a broken
//! packaged bundle is an error.

pub mod errors;
pub mod local;
pub mod packaged;

pub use errors::FatalError;
pub use local::{discover_roots, LocalResolver};
pub use packaged::{ArtifactRegistry, Fetch, FetchOutcome, PackagedResolver, Selection};

/// The disassembler whose presence proves a toolkit installation.
pub const DISASSEMBLER: &str = "nvdisasm";
/// The profiling library.
pub const PROFILING_LIBRARY: &str = "cupti";
/// The markers / annotation library.
pub const MARKERS_LIBRARY: &str = "nvToolsExt";
/// The device runtime static archive.
pub const DEVICE_RUNTIME: &str = "cudadevrt";
/// The device bitcode file name.
pub const BITCODE_FILE: &str = "libdevice.10.bc";

/// Version hint for the markers library, independent of the toolkit version.
pub const MARKERS_LIBRARY_VERSION: crate::core::ToolkitVersion =
    crate::core::ToolkitVersion::new(1, 0);
