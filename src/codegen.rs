//! The code generator side of device compatibility.
//!
//! A code generation backend reports its own version and which device
//! capabilities and PTX ISA versions it can emit. The built-in NVPTX table
//! covers LLVM's NVPTX target; `StaticBackend` lets callers describe any
//! other generator.

use std::sync::LazyLock;

use crate::compat::database::{compile, supported, Table};
use crate::compat::Capabilities;
use crate::core::ToolkitVersion;

/// Backend version assumed when none is configured.
pub const DEFAULT_BACKEND_VERSION: ToolkitVersion = ToolkitVersion::new(15, 0);

/// A code generator that can target GPU devices.
pub trait CodegenBackend: Send + Sync {
    /// Display name (e.g. "LLVM").
    fn name(&self) -> &str;

    /// Version of the backend.
    fn version(&self) -> ToolkitVersion;

    /// Device capabilities and ISA versions this backend can emit.
    fn capabilities(&self) -> Capabilities;
}

/// Device capability -> LLVM releases whose NVPTX target supports it.
const NVPTX_CAPABILITY_TABLE: &[(u64, u64, &str)] = &[
    (2, 0, ">=3.2"),
    (2, 1, ">=3.2"),
    (3, 0, ">=3.2"),
    (3, 2, ">=3.7"),
    (3, 5, ">=3.2"),
    (3, 7, ">=3.7"),
    (5, 0, ">=3.5"),
    (5, 2, ">=3.7"),
    (5, 3, ">=3.7"),
    (6, 0, ">=3.9"),
    (6, 1, ">=3.9"),
    (6, 2, ">=3.9"),
    (7, 0, ">=6.0"),
    (7, 2, ">=7.0"),
    (7, 5, ">=8.0"),
    (8, 0, ">=11.0"),
    (8, 6, ">=13.0"),
    (8, 7, ">=16.0"),
    (8, 9, ">=16.0"),
    (9, 0, ">=16.0"),
];

/// PTX ISA version -> LLVM releases that emit it.
const NVPTX_ISA_TABLE: &[(u64, u64, &str)] = &[
    (3, 0, ">=3.2"),
    (3, 1, ">=3.2"),
    (3, 2, ">=3.5"),
    (4, 0, ">=3.5"),
    (4, 1, ">=3.7"),
    (4, 2, ">=3.9"),
    (4, 3, ">=3.9"),
    (5, 0, ">=3.9"),
    (6, 0, ">=5.0"),
    (6, 1, ">=7.0"),
    (6, 3, ">=8.0"),
    (6, 4, ">=9.0"),
    (6, 5, ">=11.0"),
    (7, 0, ">=11.0"),
    (7, 1, ">=13.0"),
    (7, 2, ">=13.0"),
    (7, 3, ">=14.0"),
    (7, 4, ">=14.0"),
    (7, 5, ">=14.0"),
    (7, 6, ">=16.0"),
    (7, 7, ">=16.0"),
    (7, 8, ">=17.0"),
];

static NVPTX_CAPABILITIES: LazyLock<Table> = LazyLock::new(|| compile(NVPTX_CAPABILITY_TABLE));

static NVPTX_ISA_VERSIONS: LazyLock<Table> = LazyLock::new(|| compile(NVPTX_ISA_TABLE));

/// LLVM's NVPTX target at a given LLVM version.
#[derive(Debug, Clone, Copy)]
pub struct NvptxBackend {
    version: ToolkitVersion,
}

impl NvptxBackend {
    pub fn new(version: ToolkitVersion) -> Self {
        NvptxBackend { version }
    }
}

impl Default for NvptxBackend {
    fn default() -> Self {
        NvptxBackend::new(DEFAULT_BACKEND_VERSION)
    }
}

impl CodegenBackend for NvptxBackend {
    fn name(&self) -> &str {
        "LLVM"
    }

    fn version(&self) -> ToolkitVersion {
        self.version
    }

    fn capabilities(&self) -> Capabilities {
        let release = self.version.release().to_semver();
        Capabilities {
            devices: supported(&NVPTX_CAPABILITIES, &release),
            isa: supported(&NVPTX_ISA_VERSIONS, &release),
        }
    }
}

/// A backend described entirely by its caller.
#[derive(Debug, Clone)]
pub struct StaticBackend {
    name: String,
    version: ToolkitVersion,
    capabilities: Capabilities,
}

impl StaticBackend {
    pub fn new(name: impl Into<String>, version: ToolkitVersion, capabilities: Capabilities) -> Self {
        StaticBackend {
            name: name.into(),
            version,
            capabilities,
        }
    }
}

impl CodegenBackend for StaticBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> ToolkitVersion {
        self.version
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities.clone()
    }
}
