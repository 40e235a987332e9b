//! Querying the installed GPU driver.
//!
//! The driver reports the newest toolkit release it can run. A driver that
//! cannot be queried makes the whole toolkit unusable.

use std::sync::{LazyLock, OnceLock};

use anyhow::{Context, Result};
use regex::Regex;

use crate::core::ToolkitVersion;
use crate::util::process::{find_executable, ProcessBuilder};

static CUDA_VERSION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CUDA Version:\s*(\d+\.\d+)").expect("valid regex"));

/// Source of the driver's supported toolkit release.
pub trait DriverQuery: Send + Sync {
    /// The newest toolkit release the driver supports, or why the driver is
    /// not functional.
    fn version(&self) -> Result<ToolkitVersion, String>;
}

/// Queries the host driver through `nvidia-smi`; the answer is cached.
#[derive(Debug, Default)]
pub struct SystemDriver {
    cached: OnceLock<Result<ToolkitVersion, String>>,
}

impl SystemDriver {
    pub fn new() -> Self {
        SystemDriver {
            cached: OnceLock::new(),
        }
    }

    fn query() -> Result<ToolkitVersion> {
        let smi = find_executable("nvidia-smi")
            .context("nvidia-smi not found in PATH; is the NVIDIA driver installed?")?;

        let output = ProcessBuilder::new(&smi).exec_and_check()?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        parse_smi_output(&stdout)
            .with_context(|| format!("no CUDA version in `{}` output", smi.display()))
    }
}

impl DriverQuery for SystemDriver {
    fn version(&self) -> Result<ToolkitVersion, String> {
        self.cached
            .get_or_init(|| {
                let result = Self::query().map_err(|e| format!("{:#}", e));
                match &result {
                    Ok(version) => tracing::debug!("Driver supports CUDA {}", version),
                    Err(reason) => tracing::debug!("Driver not functional: {}", reason),
                }
                result
            })
            .clone()
    }
}

/// A driver with a predetermined answer, e.g. from configuration.
#[derive(Debug, Clone)]
pub struct FixedDriver {
    version: Result<ToolkitVersion, String>,
}

impl FixedDriver {
    /// A functional driver supporting `version`.
    pub fn new(version: ToolkitVersion) -> Self {
        FixedDriver {
            version: Ok(version),
        }
    }

    /// A driver that is not functional.
    pub fn missing(reason: impl Into<String>) -> Self {
        FixedDriver {
            version: Err(reason.into()),
        }
    }
}

impl DriverQuery for FixedDriver {
    fn version(&self) -> Result<ToolkitVersion, String> {
        self.version.clone()
    }
}

/// Extract the `CUDA Version: X.Y` field from `nvidia-smi` output.
pub fn parse_smi_output(output: &str) -> Option<ToolkitVersion> {
    let caps = CUDA_VERSION_LINE.captures(output)?;
    ToolkitVersion::parse(caps.get(1)?.as_str()).ok()
}
