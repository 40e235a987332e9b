//! Resolution from an existing local installation.
//!
//! Installation roots are discovered in this order:
//! 1. Environment hints (`CUDA_HOME`, `CUDA_PATH`, `CUDA_ROOT`, `CUDA_TOOLKIT_ROOT_DIR`)
//! 2. The installation owning `nvcc`, `nvdisasm` or `ptxas` on `PATH`
//! 3. Conventional install locations for the platform

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::core::{ToolkitDescriptor, ToolkitOrigin, ToolkitVersion};
use crate::probe::{PathProbe, Platform};
use crate::util::process::{find_executable, tool_version};

use super::{
    BITCODE_FILE, DEVICE_RUNTIME, DISASSEMBLER, MARKERS_LIBRARY, MARKERS_LIBRARY_VERSION,
    PROFILING_LIBRARY,
};

/// Environment variables that may point at a toolkit root, in priority order.
pub const ROOT_HINT_VARS: &[&str] = &[
    "CUDA_HOME",
    "CUDA_PATH",
    "CUDA_ROOT",
    "CUDA_TOOLKIT_ROOT_DIR",
];

/// Toolkit binaries whose location on `PATH` reveals an installation root.
const PATH_TOOLS: &[&str] = &["nvcc", "nvdisasm", "ptxas"];

/// Where the bitcode file lives relative to a root, in search order.
const BITCODE_DIRS: &[&str] = &["nvvm/libdevice", "libdevice", "share/libdevice"];

/// Reads the toolkit version from the disassembler binary.
pub type VersionQuery = Box<dyn Fn(&Path) -> Option<ToolkitVersion> + Send + Sync>;

enum RootSource {
    Discover,
    Fixed(Vec<PathBuf>),
}

/// Resolves a toolkit from directories already present on the host.
pub struct LocalResolver {
    probe: PathProbe,
    roots: RootSource,
    version_query: VersionQuery,
}

impl LocalResolver {
    /// Resolver for the host platform with root discovery.
    pub fn new() -> Self {
        LocalResolver {
            probe: PathProbe::host(),
            roots: RootSource::Discover,
            version_query: Box::new(query_tool_version),
        }
    }

    /// Use a fixed list of roots instead of discovering them.
    pub fn with_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.roots = RootSource::Fixed(roots);
        self
    }

    /// Use the naming conventions of another platform.
    pub fn with_probe(mut self, probe: PathProbe) -> Self {
        self.probe = probe;
        self
    }

    /// Replace the disassembler version query.
    pub fn with_version_query<F>(mut self, query: F) -> Self
    where
        F: Fn(&Path) -> Option<ToolkitVersion> + Send + Sync + 'static,
    {
        self.version_query = Box::new(query);
        self
    }

    /// Assemble a descriptor from a local installation, if there is a complete one.
    pub fn resolve(&self) -> Option<ToolkitDescriptor> {
        tracing::debug!("Trying to use a local toolkit installation...");

        let roots = match &self.roots {
            RootSource::Discover => discover_roots(self.probe.platform()),
            RootSource::Fixed(roots) => roots.clone(),
        };
        if roots.is_empty() {
            tracing::debug!("Could not find any toolkit installation directory");
            return None;
        }
        tracing::debug!("Looking for a toolkit in {}", display_paths(&roots));

        let Some(disassembler) = self.probe.find_binary(&roots, DISASSEMBLER) else {
            tracing::debug!("Could not find {}; not a toolkit installation", DISASSEMBLER);
            return None;
        };

        let Some(version) = (self.version_query)(&disassembler) else {
            tracing::debug!(
                "Could not determine toolkit version from {}",
                disassembler.display()
            );
            return None;
        };

        let mut profiling_roots = roots.clone();
        profiling_roots.extend(
            roots
                .iter()
                .map(|root| root.join("extras").join("CUPTI"))
                .filter(|dir| dir.is_dir()),
        );
        let profiling_library =
            self.probe
                .find_library(&profiling_roots, PROFILING_LIBRARY, &[version]);
        let markers_library =
            self.probe
                .find_library(&roots, MARKERS_LIBRARY, &[MARKERS_LIBRARY_VERSION]);

        let Some(device_runtime) = self.probe.find_static_library(&roots, DEVICE_RUNTIME) else {
            tracing::debug!("Could not find {}", DEVICE_RUNTIME);
            return None;
        };

        let Some(bitcode) = BITCODE_DIRS
            .iter()
            .find_map(|dir| self.probe.find_file(&roots, Path::new(dir).join(BITCODE_FILE)))
        else {
            tracing::debug!("Could not find {}", BITCODE_FILE);
            return None;
        };

        tracing::debug!(
            "Found local CUDA {} at {}",
            version,
            display_paths(&roots)
        );

        Some(ToolkitDescriptor {
            roots,
            version,
            origin: ToolkitOrigin::Local,
            disassembler,
            profiling_library,
            markers_library,
            bitcode,
            device_runtime,
        })
    }
}

impl Default for LocalResolver {
    fn default() -> Self {
        LocalResolver::new()
    }
}

fn query_tool_version(tool: &Path) -> Option<ToolkitVersion> {
    match tool_version(tool) {
        Ok(version) => Some(version),
        Err(e) => {
            tracing::debug!("{:#}", e);
            None
        }
    }
}

/// Discover toolkit roots on the host.
pub fn discover_roots(platform: Platform) -> Vec<PathBuf> {
    discover_roots_with(platform, |key| std::env::var_os(key), find_executable)
}

/// Discover toolkit roots using the given environment and `PATH` lookups.
///
/// Only existing directories are returned, without duplicates, in
/// precedence order.
pub fn discover_roots_with<E, W>(platform: Platform, env: E, which: W) -> Vec<PathBuf>
where
    E: Fn(&str) -> Option<OsString>,
    W: Fn(&str) -> Option<PathBuf>,
{
    let mut candidates: Vec<PathBuf> = Vec::new();

    for var in ROOT_HINT_VARS {
        if let Some(value) = env(var).filter(|v| !v.is_empty()) {
            tracing::debug!("{} hints at {}", var, PathBuf::from(&value).display());
            candidates.push(PathBuf::from(value));
        }
    }

    for tool in PATH_TOOLS {
        if let Some(root) = which(tool).as_deref().and_then(installation_root) {
            candidates.push(root);
        }
    }

    candidates.extend(conventional_roots(platform, &env));

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|dir| dir.is_dir())
        .filter(|dir| seen.insert(dir.canonicalize().unwrap_or_else(|_| dir.clone())))
        .collect()
}

/// `<root>/bin/nvcc` -> `<root>`
fn installation_root(binary: &Path) -> Option<PathBuf> {
    let binary = binary.canonicalize().unwrap_or_else(|_| binary.to_path_buf());
    binary.parent()?.parent().map(Path::to_path_buf)
}

fn conventional_roots<E>(platform: Platform, env: &E) -> Vec<PathBuf>
where
    E: Fn(&str) -> Option<OsString>,
{
    match platform {
        Platform::Windows => {
            let program_files = env("ProgramFiles")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("C:\\Program Files"));
            let base = program_files.join("NVIDIA GPU Computing Toolkit").join("CUDA");
            versioned_dirs(&base, "v")
        }
        Platform::MacOs => {
            let mut roots = versioned_dirs(Path::new("/Developer/NVIDIA"), "CUDA-");
            roots.push(PathBuf::from("/usr/local/cuda"));
            roots
        }
        Platform::Linux => {
            let mut roots = vec![
                PathBuf::from("/usr/local/cuda"),
                PathBuf::from("/opt/cuda"),
                PathBuf::from("/usr/lib/nvidia-cuda-toolkit"),
            ];
            roots.extend(versioned_dirs(Path::new("/usr/local"), "cuda-"));
            roots
        }
    }
}

/// Directories named `<prefix><version>` under `base`, newest first.
pub fn versioned_dirs(base: &Path, prefix: &str) -> Vec<PathBuf> {
    let pattern = format!(
        "{}/{}*",
        glob::Pattern::escape(&base.to_string_lossy()),
        glob::Pattern::escape(prefix)
    );
    let Ok(entries) = glob::glob(&pattern) else {
        return Vec::new();
    };

    let mut dirs: Vec<(Option<ToolkitVersion>, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_dir())
        .map(|path| {
            let version = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_prefix(prefix))
                .and_then(|suffix| ToolkitVersion::parse(suffix).ok());
            (version, path)
        })
        .collect();

    dirs.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    dirs.into_iter().map(|(_, path)| path).collect()
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
