//! One-time toolkit initialization.
//!
//! `ToolkitGate` runs the resolution sequence at most once per process, on
//! first use, and caches the outcome:
//!
//! 1. Query the driver; a missing driver makes the toolkit unavailable
//! 2. Check the code generation backend against the expected version
//! 3. Try packaged bundles (unless disabled)
//! 4. Fall back to a local installation
//! 5. Reconcile backend and toolkit capabilities
//!
//! Concurrent first callers block until the single attempt finishes. After
//! that every query reads the cached outcome without locking.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use thiserror::Error;

use crate::codegen::{CodegenBackend, NvptxBackend, DEFAULT_BACKEND_VERSION};
use crate::compat::{reconcile, toolkit_capabilities};
use crate::core::{CompatibilityRange, ToolkitDescriptor, ToolkitOrigin, ToolkitVersion};
use crate::driver::{DriverQuery, FixedDriver, SystemDriver};
use crate::resolver::{ArtifactRegistry, FatalError, LocalResolver, PackagedResolver};
use crate::sources::{default_cache_dir, registry_from_manifest};
use crate::util::config::{load_config, NvkitConfig};

/// Oldest toolkit release that is supported.
pub const MIN_SUPPORTED_RELEASE: ToolkitVersion = ToolkitVersion::new(9, 0);

/// Observable initialization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    Unresolved,
    Failed,
    Ready,
}

/// A usable toolkit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyToolkit {
    pub descriptor: ToolkitDescriptor,
    pub compatibility: CompatibilityRange,
}

/// Why initialization did not produce a usable toolkit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Nothing usable was found; the toolkit is simply absent.
    Unavailable(String),
    /// A toolkit exists but this configuration can never use it.
    Fatal(FatalError),
}

#[derive(Debug)]
enum Resolution {
    Ready(ReadyToolkit),
    Failed(FailureReason),
}

/// Error returned by gated queries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolkitError {
    #[error("CUDA toolkit is not functional: {0}")]
    NotFunctional(String),

    #[error(transparent)]
    Fatal(#[from] FatalError),
}

impl From<&FailureReason> for ToolkitError {
    fn from(reason: &FailureReason) -> Self {
        match reason {
            FailureReason::Unavailable(why) => ToolkitError::NotFunctional(why.clone()),
            FailureReason::Fatal(e) => ToolkitError::Fatal(e.clone()),
        }
    }
}

/// Resolves the toolkit once and answers queries about it.
pub struct ToolkitGate {
    explicit_version: Option<ToolkitVersion>,
    use_packaged: bool,
    expected_backend_version: Option<ToolkitVersion>,
    driver: Box<dyn DriverQuery>,
    codegen: Box<dyn CodegenBackend>,
    registry: Mutex<Option<ArtifactRegistry>>,
    packaged: PackagedResolver,
    local: LocalResolver,
    resolution: OnceLock<Resolution>,
}

static GLOBAL: OnceLock<ToolkitGate> = OnceLock::new();

impl ToolkitGate {
    /// Start building a gate with host defaults.
    pub fn builder() -> GateBuilder {
        GateBuilder::new()
    }

    /// Gate configured from `config`, using the real driver unless overridden.
    pub fn from_config(config: &NvkitConfig) -> Self {
        GateBuilder::from_config(config).build()
    }

    /// The process-wide gate, configured from the working directory and environment.
    pub fn global() -> &'static ToolkitGate {
        GLOBAL.get_or_init(|| {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            ToolkitGate::from_config(&load_config(&cwd))
        })
    }

    /// Current state without triggering initialization.
    pub fn state(&self) -> ResolutionState {
        match self.resolution.get() {
            None => ResolutionState::Unresolved,
            Some(Resolution::Ready(_)) => ResolutionState::Ready,
            Some(Resolution::Failed(_)) => ResolutionState::Failed,
        }
    }

    /// Why initialization failed, if it has run and failed.
    pub fn failure(&self) -> Option<&FailureReason> {
        match self.resolution.get() {
            Some(Resolution::Failed(reason)) => Some(reason),
            _ => None,
        }
    }

    /// Initialize if needed and return the usable toolkit.
    pub fn ensure_ready(&self) -> Result<&ReadyToolkit, ToolkitError> {
        match self.resolution.get_or_init(|| self.attempt()) {
            Resolution::Ready(ready) => Ok(ready),
            Resolution::Failed(reason) => Err(reason.into()),
        }
    }

    /// Whether the toolkit is usable; with `verbose`, log why it is not.
    pub fn functional(&self, verbose: bool) -> bool {
        match self.ensure_ready() {
            Ok(_) => true,
            Err(e) => {
                if verbose {
                    tracing::error!("CUDA toolkit did not initialize: {}", e);
                }
                false
            }
        }
    }

    pub fn descriptor(&self) -> Result<&ToolkitDescriptor, ToolkitError> {
        Ok(&self.ensure_ready()?.descriptor)
    }

    pub fn compatibility(&self) -> Result<&CompatibilityRange, ToolkitError> {
        Ok(&self.ensure_ready()?.compatibility)
    }

    pub fn installation_roots(&self) -> Result<&[PathBuf], ToolkitError> {
        Ok(&self.descriptor()?.roots)
    }

    pub fn toolkit_version(&self) -> Result<ToolkitVersion, ToolkitError> {
        Ok(self.descriptor()?.version)
    }

    pub fn toolkit_release(&self) -> Result<ToolkitVersion, ToolkitError> {
        Ok(self.descriptor()?.release())
    }

    pub fn toolkit_origin(&self) -> Result<ToolkitOrigin, ToolkitError> {
        Ok(self.descriptor()?.origin)
    }

    pub fn disassembler_path(&self) -> Result<&Path, ToolkitError> {
        Ok(&self.descriptor()?.disassembler)
    }

    pub fn profiling_library_path(&self) -> Result<Option<&Path>, ToolkitError> {
        Ok(self.descriptor()?.profiling_library.as_deref())
    }

    pub fn markers_library_path(&self) -> Result<Option<&Path>, ToolkitError> {
        Ok(self.descriptor()?.markers_library.as_deref())
    }

    pub fn bitcode_file_path(&self) -> Result<&Path, ToolkitError> {
        Ok(&self.descriptor()?.bitcode)
    }

    pub fn device_runtime_archive_path(&self) -> Result<&Path, ToolkitError> {
        Ok(&self.descriptor()?.device_runtime)
    }

    pub fn supported_device_capabilities(&self) -> Result<&[ToolkitVersion], ToolkitError> {
        Ok(&self.compatibility()?.devices)
    }

    pub fn supported_instruction_set_versions(&self) -> Result<&[ToolkitVersion], ToolkitError> {
        Ok(&self.compatibility()?.isa)
    }

    /// The code generation backend in use.
    pub fn codegen(&self) -> &dyn CodegenBackend {
        self.codegen.as_ref()
    }

    /// The driver's supported release, without triggering initialization.
    pub fn driver_version(&self) -> Result<ToolkitVersion, String> {
        self.driver.version()
    }

    fn attempt(&self) -> Resolution {
        match self.resolve() {
            Ok(ready) => {
                let desc = &ready.descriptor;
                tracing::info!(
                    "Using {} CUDA {} at {}",
                    desc.origin,
                    desc.version,
                    desc.roots
                        .first()
                        .map(|r| r.display().to_string())
                        .unwrap_or_default()
                );
                Resolution::Ready(ready)
            }
            Err(reason) => {
                match &reason {
                    FailureReason::Unavailable(why) => {
                        tracing::debug!("CUDA toolkit unavailable: {}", why)
                    }
                    FailureReason::Fatal(e) => tracing::error!("{}", e),
                }
                Resolution::Failed(reason)
            }
        }
    }

    fn resolve(&self) -> Result<ReadyToolkit, FailureReason> {
        let driver_version = self
            .driver
            .version()
            .map_err(|why| FailureReason::Unavailable(format!("CUDA driver not functional: {}", why)))?;
        tracing::debug!("CUDA driver supports up to CUDA {}", driver_version);

        let backend_version = self.codegen.version();
        if let Some(expected) = self.expected_backend_version {
            if !backend_version.same_release(&expected) {
                return Err(FailureReason::Fatal(FatalError::BackendMismatch {
                    backend: self.codegen.name().to_string(),
                    actual: backend_version,
                    expected,
                }));
            }
        }

        let mut descriptor = None;
        if self.use_packaged {
            if let Some(registry) = self.take_registry() {
                descriptor = self
                    .packaged
                    .resolve(registry, self.explicit_version, driver_version)
                    .map_err(FailureReason::Fatal)?;
            }
        } else {
            tracing::debug!("Packaged toolkits are disabled");
        }

        if descriptor.is_none() {
            descriptor = self.local.resolve();
        }

        let Some(descriptor) = descriptor else {
            return Err(FailureReason::Unavailable(
                "could not find a CUDA toolkit".to_string(),
            ));
        };

        let release = descriptor.release();
        if release < MIN_SUPPORTED_RELEASE {
            tracing::warn!(
                "CUDA {} is not supported; please upgrade to CUDA {} or higher",
                release,
                MIN_SUPPORTED_RELEASE
            );
        }
        if release > driver_version.release() {
            tracing::warn!(
                "CUDA {} is not supported by the driver, which only supports CUDA {}",
                release,
                driver_version.release()
            );
        }

        let compatibility = reconcile(
            &self.codegen.capabilities(),
            &toolkit_capabilities(&descriptor.version),
        )
        .map_err(|e| FailureReason::Fatal(e.into()))?;

        tracing::debug!(
            "Toolchain with {} {} supports devices {}; PTX {}",
            self.codegen.name(),
            backend_version,
            crate::core::version::version_list(&compatibility.devices),
            crate::core::version::version_list(&compatibility.isa)
        );

        Ok(ReadyToolkit {
            descriptor,
            compatibility,
        })
    }

    fn take_registry(&self) -> Option<ArtifactRegistry> {
        match self.registry.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

impl std::fmt::Debug for ToolkitGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolkitGate")
            .field("explicit_version", &self.explicit_version)
            .field("use_packaged", &self.use_packaged)
            .field("codegen", &self.codegen.name())
            .field("state", &self.state())
            .finish()
    }
}

/// Builder for `ToolkitGate`.
pub struct GateBuilder {
    explicit_version: Option<ToolkitVersion>,
    use_packaged: bool,
    expected_backend_version: Option<ToolkitVersion>,
    driver: Option<Box<dyn DriverQuery>>,
    codegen: Option<Box<dyn CodegenBackend>>,
    registry: ArtifactRegistry,
    packaged: PackagedResolver,
    local: LocalResolver,
}

impl GateBuilder {
    pub fn new() -> Self {
        GateBuilder {
            explicit_version: None,
            use_packaged: true,
            expected_backend_version: None,
            driver: None,
            codegen: None,
            registry: ArtifactRegistry::new(),
            packaged: PackagedResolver::host(),
            local: LocalResolver::new(),
        }
    }

    /// Builder seeded from configuration.
    pub fn from_config(config: &NvkitConfig) -> Self {
        let settings = &config.toolkit;
        let mut builder = GateBuilder::new()
            .use_packaged(config.use_packaged())
            .backend(NvptxBackend::new(
                settings.backend_version.unwrap_or(DEFAULT_BACKEND_VERSION),
            ))
            .registry(registry_from_manifest(
                settings.bundle_manifest.as_deref(),
                &default_cache_dir(),
            ));

        if let Some(version) = settings.version {
            builder = builder.explicit_version(version);
        }
        if let Some(expected) = settings.expected_backend_version {
            builder = builder.expected_backend_version(expected);
        }
        if let Some(driver) = settings.driver_version {
            builder = builder.driver(FixedDriver::new(driver));
        }
        builder
    }

    /// Only use this toolkit version from packaged bundles.
    pub fn explicit_version(mut self, version: ToolkitVersion) -> Self {
        self.explicit_version = Some(version);
        self
    }

    pub fn use_packaged(mut self, enabled: bool) -> Self {
        self.use_packaged = enabled;
        self
    }

    pub fn expected_backend_version(mut self, version: ToolkitVersion) -> Self {
        self.expected_backend_version = Some(version);
        self
    }

    pub fn driver(mut self, driver: impl DriverQuery + 'static) -> Self {
        self.driver = Some(Box::new(driver));
        self
    }

    pub fn backend(mut self, backend: impl CodegenBackend + 'static) -> Self {
        self.codegen = Some(Box::new(backend));
        self
    }

    pub fn registry(mut self, registry: ArtifactRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn packaged_resolver(mut self, resolver: PackagedResolver) -> Self {
        self.packaged = resolver;
        self
    }

    pub fn local_resolver(mut self, resolver: LocalResolver) -> Self {
        self.local = resolver;
        self
    }

    pub fn build(self) -> ToolkitGate {
        ToolkitGate {
            explicit_version: self.explicit_version,
            use_packaged: self.use_packaged,
            expected_backend_version: self.expected_backend_version,
            driver: self.driver.unwrap_or_else(|| Box::new(SystemDriver::new())),
            codegen: self
                .codegen
                .unwrap_or_else(|| Box::new(NvptxBackend::default())),
            registry: Mutex::new(Some(self.registry)),
            packaged: self.packaged,
            local: self.local,
            resolution: OnceLock::new(),
        }
    }
}

impl Default for GateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
