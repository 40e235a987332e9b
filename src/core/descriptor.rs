//! Resolved toolkit state.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::ToolkitVersion;

/// Where a resolved toolkit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolkitOrigin {
    /// A fetched, versioned bundle with a fixed layout.
    Packaged,
    /// A pre-existing installation on the host.
    Local,
}

impl ToolkitOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolkitOrigin::Packaged => "packaged",
            ToolkitOrigin::Local => "local",
        }
    }
}

impl fmt::Display for ToolkitOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully located toolkit.
///
/// Required paths are verified to exist when the descriptor is built.
/// The profiling and markers libraries are optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolkitDescriptor {
    /// Installation roots, in search precedence order
    pub roots: Vec<PathBuf>,
    /// Detected toolkit version
    pub version: ToolkitVersion,
    /// Packaged bundle or local installation
    pub origin: ToolkitOrigin,
    /// The `nvdisasm` binary
    pub disassembler: PathBuf,
    /// The CUPTI profiling library, if present
    pub profiling_library: Option<PathBuf>,
    /// The NVTX markers library, if present
    pub markers_library: Option<PathBuf>,
    /// The `libdevice` bitcode file
    pub bitcode: PathBuf,
    /// The `cudadevrt` static archive
    pub device_runtime: PathBuf,
}

impl ToolkitDescriptor {
    /// Release of the toolkit (major, minor).
    pub fn release(&self) -> ToolkitVersion {
        self.version.release()
    }

    /// Every located path, required and optional.
    pub fn paths(&self) -> impl Iterator<Item = (&'static str, Option<&Path>)> {
        [
            ("nvdisasm", Some(self.disassembler.as_path())),
            ("cupti", self.profiling_library.as_deref()),
            ("nvtx", self.markers_library.as_deref()),
            ("libdevice", Some(self.bitcode.as_path())),
            ("cudadevrt", Some(self.device_runtime.as_path())),
        ]
        .into_iter()
    }
}

/// Device capabilities and PTX ISA versions usable with this toolkit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompatibilityRange {
    /// Supported device capabilities, ascending
    pub devices: Vec<ToolkitVersion>,
    /// Supported instruction-set versions, ascending
    pub isa: Vec<ToolkitVersion>,
}
