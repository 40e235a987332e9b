//! Resolution from packaged, versioned toolkit bundles.
//!
//! A registry maps toolkit versions to lazy fetch operations. Selection keeps
//! either the explicitly requested version or every version the driver can
//! run; candidates are fetched newest first until one succeeds. The fetched
//! bundle has a fixed layout, so paths are assembled rather than searched.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::{ToolkitDescriptor, ToolkitOrigin, ToolkitVersion};
use crate::probe::Platform;

use super::{
    FatalError, BITCODE_FILE, DEVICE_RUNTIME, DISASSEMBLER, MARKERS_LIBRARY,
    MARKERS_LIBRARY_VERSION, PROFILING_LIBRARY,
};

/// Result of fetching a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The bundle is available at this root directory.
    Fetched(PathBuf),
    /// The bundle could not be obtained.
    FetchFailed(String),
}

/// A lazy fetch operation for one bundle.
pub trait Fetch: Send + Sync {
    fn fetch(&self) -> FetchOutcome;
}

impl<F> Fetch for F
where
    F: Fn() -> FetchOutcome + Send + Sync,
{
    fn fetch(&self) -> FetchOutcome {
        self()
    }
}

/// Available bundles, keyed by toolkit version.
#[derive(Default)]
pub struct ArtifactRegistry {
    entries: BTreeMap<ToolkitVersion, Box<dyn Fetch>>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        ArtifactRegistry {
            entries: BTreeMap::new(),
        }
    }

    /// Register a bundle, replacing any previous entry for the same version.
    pub fn insert(&mut self, version: ToolkitVersion, fetch: impl Fetch + 'static) {
        self.entries.insert(version, Box::new(fetch));
    }

    /// Builder-style `insert`.
    pub fn with(mut self, version: ToolkitVersion, fetch: impl Fetch + 'static) -> Self {
        self.insert(version, fetch);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered versions, ascending.
    pub fn versions(&self) -> impl Iterator<Item = &ToolkitVersion> {
        self.entries.keys()
    }

    /// Consume the registry, keeping the candidates `selection` allows, newest first.
    pub fn select(self, selection: &Selection) -> Vec<(ToolkitVersion, Box<dyn Fetch>)> {
        let mut candidates: Vec<_> = self
            .entries
            .into_iter()
            .filter(|(version, _)| selection.allows(version))
            .collect();
        candidates.reverse();
        candidates
    }
}

impl fmt::Debug for ArtifactRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactRegistry")
            .field("versions", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Policy for choosing which bundles may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Only the requested version, regardless of the driver.
    Explicit(ToolkitVersion),
    /// Any version whose release the driver supports.
    DriverCeiling(ToolkitVersion),
}

impl Selection {
    pub fn new(explicit: Option<ToolkitVersion>, driver_ceiling: ToolkitVersion) -> Self {
        match explicit {
            Some(version) => Selection::Explicit(version),
            None => Selection::DriverCeiling(driver_ceiling),
        }
    }

    /// Whether a bundle of `version` may be used.
    ///
    /// An explicit request without a patch level matches any bundle of that
    /// release.
    pub fn allows(&self, version: &ToolkitVersion) -> bool {
        match self {
            Selection::Explicit(wanted) if wanted.patch.is_some() => version == wanted,
            Selection::Explicit(wanted) => version.same_release(wanted),
            Selection::DriverCeiling(ceiling) => version.release() <= ceiling.release(),
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Explicit(v) => write!(f, "requested version {}", v),
            Selection::DriverCeiling(v) => write!(f, "driver compatibility {}", v),
        }
    }
}

/// Resolves a toolkit from packaged bundles.
#[derive(Debug, Clone, Copy)]
pub struct PackagedResolver {
    platform: Platform,
}

impl PackagedResolver {
    pub fn new(platform: Platform) -> Self {
        PackagedResolver { platform }
    }

    pub fn host() -> Self {
        PackagedResolver::new(Platform::host())
    }

    /// Fetch the newest eligible bundle and describe it.
    ///
    /// Returns `Ok(None)` when nothing could be fetched. A fetched bundle
    /// missing a required file is a `FatalError::PackagingDefect`.
    pub fn resolve(
        &self,
        registry: ArtifactRegistry,
        explicit: Option<ToolkitVersion>,
        driver_ceiling: ToolkitVersion,
    ) -> Result<Option<ToolkitDescriptor>, FatalError> {
        tracing::debug!("Trying to use packaged toolkits...");

        let selection = Selection::new(explicit, driver_ceiling);
        tracing::debug!("Selecting packaged toolkits based on {}", selection);

        let candidates = registry.select(&selection);
        if candidates.is_empty() {
            match selection {
                Selection::Explicit(v) => {
                    tracing::debug!("Requested CUDA {} is not provided by any package", v)
                }
                Selection::DriverCeiling(v) => {
                    tracing::debug!("Driver compatibility {} is not met by any package", v)
                }
            }
            return Ok(None);
        }

        for (version, fetch) in candidates {
            match fetch.fetch() {
                FetchOutcome::Fetched(root) => {
                    let desc = self.assemble(version, root)?;
                    tracing::debug!(
                        "Using CUDA {} from a package at {}",
                        desc.version,
                        desc.roots[0].display()
                    );
                    return Ok(Some(desc));
                }
                FetchOutcome::FetchFailed(reason) => {
                    tracing::debug!("Could not fetch the CUDA {} package: {}", version, reason);
                }
            }
        }

        tracing::debug!("Could not fetch any compatible package");
        Ok(None)
    }

    /// Build a descriptor from the fixed bundle layout.
    pub fn assemble(
        &self,
        version: ToolkitVersion,
        root: PathBuf,
    ) -> Result<ToolkitDescriptor, FatalError> {
        let platform = self.platform;
        let required = |what: &'static str, path: PathBuf| {
            if path.is_file() {
                Ok(path)
            } else {
                Err(FatalError::PackagingDefect {
                    version,
                    what,
                    path,
                })
            }
        };

        let disassembler = required(
            DISASSEMBLER,
            root.join("bin").join(platform.binary_name(DISASSEMBLER)),
        )?;
        let device_runtime = required(
            DEVICE_RUNTIME,
            root.join("lib").join(platform.static_library_name(DEVICE_RUNTIME)),
        )?;
        let bitcode = required(
            BITCODE_FILE,
            root.join("share").join("libdevice").join(BITCODE_FILE),
        )?;

        let library_dir = root.join(platform.bundle_library_dir());
        let profiling_library = bundle_library(&library_dir, platform, PROFILING_LIBRARY, version);
        let markers_library =
            bundle_library(&library_dir, platform, MARKERS_LIBRARY, MARKERS_LIBRARY_VERSION);

        Ok(ToolkitDescriptor {
            roots: vec![root],
            version,
            origin: ToolkitOrigin::Packaged,
            disassembler,
            profiling_library,
            markers_library,
            bitcode,
            device_runtime,
        })
    }
}

fn bundle_library(
    dir: &Path,
    platform: Platform,
    name: &str,
    version: ToolkitVersion,
) -> Option<PathBuf> {
    platform
        .library_names(name, &[version])
        .into_iter()
        .map(|file| dir.join(file))
        .find(|path| path.is_file())
}
