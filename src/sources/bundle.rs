//! Packaged toolkit bundles described by a manifest.
//!
//! A bundle manifest lists the toolkit bundles available to this host:
//!
//! ```toml
//! [[bundle]]
//! version = "10.2.89"
//! path = "cuda-10.2.89-linux.tar.gz"   # relative to the manifest
//! sha256 = "..."                       # optional
//! strip_prefix = "cuda"                # optional
//! ```
//!
//! A bundle `path` is either an already unpacked directory or a local
//! `.tar.gz` archive. Archives are verified and unpacked into the cache on
//! first use. Nothing is downloaded.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::core::ToolkitVersion;
use crate::resolver::{ArtifactRegistry, Fetch, FetchOutcome};
use crate::util::fs::{ensure_dir, extract_tarball, remove_dir_all_if_exists};
use crate::util::hash::sha256_file;

/// Marker written once a bundle has been fully unpacked; holds the archive's SHA256.
const COMPLETE_MARKER: &str = ".nvkit-complete";

static PROJECT_DIRS: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("com", "nvkit", "nvkit"));

/// Default directory bundles are unpacked into.
pub fn default_cache_dir() -> PathBuf {
    match PROJECT_DIRS.as_ref() {
        Some(dirs) => dirs.cache_dir().join("bundles"),
        None => std::env::temp_dir().join("nvkit").join("bundles"),
    }
}

/// A manifest of available bundles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleManifest {
    #[serde(default, rename = "bundle")]
    pub bundles: Vec<BundleEntry>,
}

/// One bundle in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleEntry {
    pub version: ToolkitVersion,

    /// Directory or `.tar.gz` archive
    pub path: PathBuf,

    /// Expected SHA256 of the archive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    /// Leading directory to strip when unpacking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strip_prefix: Option<String>,
}

impl BundleManifest {
    /// Load a manifest, resolving relative bundle paths against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read bundle manifest: {}", path.display()))?;

        let mut manifest = Self::parse(&contents)
            .with_context(|| format!("failed to parse bundle manifest: {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for bundle in &mut manifest.bundles {
            if bundle.path.is_relative() {
                bundle.path = base.join(&bundle.path);
            }
        }

        Ok(manifest)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Turn every entry into a lazy fetch operation unpacking into `cache_dir`.
    pub fn into_registry(self, cache_dir: &Path) -> ArtifactRegistry {
        let mut registry = ArtifactRegistry::new();
        for entry in self.bundles {
            if registry.versions().any(|v| *v == entry.version) {
                tracing::warn!(
                    "Bundle manifest lists CUDA {} more than once; using the last entry",
                    entry.version
                );
            }
            let version = entry.version;
            registry.insert(
                version,
                BundleFetch {
                    entry,
                    cache_dir: cache_dir.to_path_buf(),
                },
            );
        }
        registry
    }
}

/// Fetches one bundle from the local filesystem.
#[derive(Debug, Clone)]
pub struct BundleFetch {
    entry: BundleEntry,
    cache_dir: PathBuf,
}

impl BundleFetch {
    pub fn new(entry: BundleEntry, cache_dir: impl Into<PathBuf>) -> Self {
        BundleFetch {
            entry,
            cache_dir: cache_dir.into(),
        }
    }

    /// Directory the archive unpacks into.
    pub fn unpack_dir(&self) -> PathBuf {
        self.cache_dir.join(format!("cuda-{}", self.entry.version))
    }

    /// Whether the bundle is a directory or has an unpacked copy in the cache.
    pub fn is_available(&self) -> bool {
        self.entry.path.is_dir() || self.unpack_dir().join(COMPLETE_MARKER).is_file()
    }

    pub fn entry(&self) -> &BundleEntry {
        &self.entry
    }

    /// Make the bundle available on disk and return its root.
    pub fn materialize(&self) -> Result<PathBuf> {
        let source = &self.entry.path;

        if source.is_dir() {
            return Ok(source.clone());
        }
        if !source.is_file() {
            bail!("bundle not found: {}", source.display());
        }
        if !is_tarball(source) {
            bail!("unsupported bundle format: {}", source.display());
        }

        let actual = sha256_file(source)?;
        if let Some(expected) = &self.entry.sha256 {
            if !actual.eq_ignore_ascii_case(expected) {
                bail!(
                    "checksum mismatch for {}: expected {}, got {}",
                    source.display(),
                    expected,
                    actual
                );
            }
        }

        let dest = self.unpack_dir();
        match std::fs::read_to_string(dest.join(COMPLETE_MARKER)) {
            Ok(unpacked) if unpacked.trim() == actual => {
                tracing::debug!("Using cached bundle at {}", dest.display());
                return Ok(dest);
            }
            Ok(_) => tracing::debug!("Cached bundle at {} is stale", dest.display()),
            Err(_) => {}
        }

        tracing::info!(
            "Unpacking CUDA {} bundle into {}",
            self.entry.version,
            dest.display()
        );

        ensure_dir(&self.cache_dir)?;
        let staging = tempfile::Builder::new()
            .prefix(".unpack-")
            .tempdir_in(&self.cache_dir)
            .context("failed to create staging directory")?;

        let archive = File::open(source)
            .with_context(|| format!("failed to open bundle: {}", source.display()))?;
        extract_tarball(archive, staging.path(), self.entry.strip_prefix.as_deref())?;
        std::fs::write(staging.path().join(COMPLETE_MARKER), &actual)?;

        remove_dir_all_if_exists(&dest)?;
        let staged = staging.keep();
        std::fs::rename(&staged, &dest).with_context(|| {
            format!(
                "failed to move {} into {}",
                staged.display(),
                dest.display()
            )
        })?;

        Ok(dest)
    }
}

impl Fetch for BundleFetch {
    fn fetch(&self) -> FetchOutcome {
        match self.materialize() {
            Ok(root) => FetchOutcome::Fetched(root),
            Err(e) => FetchOutcome::FetchFailed(format!("{:#}", e)),
        }
    }
}

fn is_tarball(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    name.ends_with(".tar.gz") || name.ends_with(".tgz")
}

/// Load the registry for an optional manifest path.
///
/// A missing or unreadable manifest yields an empty registry.
pub fn registry_from_manifest(manifest: Option<&Path>, cache_dir: &Path) -> ArtifactRegistry {
    let Some(path) = manifest else {
        return ArtifactRegistry::new();
    };

    match BundleManifest::load(path) {
        Ok(manifest) => manifest.into_registry(cache_dir),
        Err(e) => {
            tracing::warn!("Ignoring bundle manifest: {:#}", e);
            ArtifactRegistry::new()
        }
    }
}
