//! Configuration for toolkit resolution.
//!
//! Settings are layered, later layers winning:
//! 1. Defaults
//! 2. Global: `~/.nvkit/config.toml`
//! 3. Project: `.nvkit/config.toml`
//! 4. Environment variables (`NVKIT_*`)

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::ToolkitVersion;

/// Forces packaged resolution to a single toolkit version.
pub const ENV_VERSION: &str = "NVKIT_VERSION";
/// Enables or disables packaged resolution.
pub const ENV_USE_PACKAGED: &str = "NVKIT_USE_PACKAGED";
/// Path to the bundle manifest.
pub const ENV_BUNDLE_MANIFEST: &str = "NVKIT_BUNDLE_MANIFEST";
/// Overrides the driver's supported release.
pub const ENV_DRIVER_VERSION: &str = "NVKIT_DRIVER_VERSION";
/// Version of the code generation backend in use.
pub const ENV_BACKEND_VERSION: &str = "NVKIT_BACKEND_VERSION";
/// Backend version the host environment was built against.
pub const ENV_EXPECTED_BACKEND_VERSION: &str = "NVKIT_EXPECTED_BACKEND_VERSION";

/// nvkit configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NvkitConfig {
    /// Toolkit resolution settings
    pub toolkit: ToolkitSettings,
}

/// Toolkit resolution settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolkitSettings {
    /// Explicit toolkit version; bypasses driver-ceiling filtering
    pub version: Option<ToolkitVersion>,

    /// Whether to try packaged bundles before local installations
    pub use_packaged: Option<bool>,

    /// Manifest listing available packaged bundles
    pub bundle_manifest: Option<PathBuf>,

    /// Driver release to assume instead of querying the driver
    pub driver_version: Option<ToolkitVersion>,

    /// Code generation backend version
    pub backend_version: Option<ToolkitVersion>,

    /// Backend version the host environment expects
    pub expected_backend_version: Option<ToolkitVersion>,
}

impl NvkitConfig {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if the file is missing or broken.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: NvkitConfig) {
        let theirs = other.toolkit;
        let ours = &mut self.toolkit;

        if theirs.version.is_some() {
            ours.version = theirs.version;
        }
        if theirs.use_packaged.is_some() {
            ours.use_packaged = theirs.use_packaged;
        }
        if theirs.bundle_manifest.is_some() {
            ours.bundle_manifest = theirs.bundle_manifest;
        }
        if theirs.driver_version.is_some() {
            ours.driver_version = theirs.driver_version;
        }
        if theirs.backend_version.is_some() {
            ours.backend_version = theirs.backend_version;
        }
        if theirs.expected_backend_version.is_some() {
            ours.expected_backend_version = theirs.expected_backend_version;
        }
    }

    /// Apply `NVKIT_*` overrides using the given variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let version = |key: &str| -> Result<Option<ToolkitVersion>> {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .map(|value| {
                    ToolkitVersion::parse(&value)
                        .with_context(|| format!("invalid {}: `{}`", key, value))
                })
                .transpose()
        };

        let settings = &mut self.toolkit;
        if let Some(v) = version(ENV_VERSION)? {
            settings.version = Some(v);
        }
        if let Some(v) = version(ENV_DRIVER_VERSION)? {
            settings.driver_version = Some(v);
        }
        if let Some(v) = version(ENV_BACKEND_VERSION)? {
            settings.backend_version = Some(v);
        }
        if let Some(v) = version(ENV_EXPECTED_BACKEND_VERSION)? {
            settings.expected_backend_version = Some(v);
        }
        if let Some(value) = lookup(ENV_USE_PACKAGED) {
            settings.use_packaged = Some(
                parse_bool(&value).with_context(|| format!("invalid {}", ENV_USE_PACKAGED))?,
            );
        }
        if let Some(value) = lookup(ENV_BUNDLE_MANIFEST).filter(|v| !v.is_empty()) {
            settings.bundle_manifest = Some(PathBuf::from(value));
        }

        Ok(())
    }

    /// Whether packaged resolution should be attempted.
    pub fn use_packaged(&self) -> bool {
        self.toolkit.use_packaged.unwrap_or(true)
    }
}

/// Load the merged configuration for `project_root` plus the process environment.
pub fn load_config(project_root: &Path) -> NvkitConfig {
    let mut config = NvkitConfig::default();

    if let Some(global) = global_config_path() {
        if global.exists() {
            config.merge(NvkitConfig::load_or_default(&global));
        }
    }

    let project = project_config_path(project_root);
    if project.exists() {
        config.merge(NvkitConfig::load_or_default(&project));
    }

    if let Err(e) = config.apply_env(|key| std::env::var(key).ok()) {
        tracing::warn!("Ignoring environment overrides: {:#}", e);
    }

    config
}

/// Get the global nvkit config directory (~/.nvkit).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".nvkit"))
}

/// Get the global config path (~/.nvkit/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.nvkit/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".nvkit").join("config.toml")
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got `{}`", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_parse_config_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[toolkit]
version = "10.2"
use_packaged = false
bundle_manifest = "/opt/bundles/bundles.toml"
"#,
        )
        .unwrap();

        let config = NvkitConfig::load(&path).unwrap();
        assert_eq!(config.toolkit.version, Some(ToolkitVersion::new(10, 2)));
        assert!(!config.use_packaged());
        assert_eq!(
            config.toolkit.bundle_manifest,
            Some(PathBuf::from("/opt/bundles/bundles.toml"))
        );
    }

    #[test]
    fn test_invalid_config_falls_back_to_default() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[toolkit]\nversion = \"not a version\"\n").unwrap();

        assert!(NvkitConfig::load(&path).is_err());
        let config = NvkitConfig::load_or_default(&path);
        assert!(config.toolkit.version.is_none());
    }

    #[test]
    fn test_merge_prefers_other() {
        let mut base = NvkitConfig::default();
        base.toolkit.version = Some(ToolkitVersion::new(10, 1));
        base.toolkit.use_packaged = Some(false);

        let mut project = NvkitConfig::default();
        project.toolkit.version = Some(ToolkitVersion::new(10, 2));

        base.merge(project);
        assert_eq!(base.toolkit.version, Some(ToolkitVersion::new(10, 2)));
        assert_eq!(base.toolkit.use_packaged, Some(false));
    }

    #[test]
    fn test_apply_env() {
        let mut config = NvkitConfig::default();
        config
            .apply_env(env(&[
                (ENV_VERSION, "9.2"),
                (ENV_USE_PACKAGED, "no"),
                (ENV_DRIVER_VERSION, "10.1"),
            ]))
            .unwrap();

        assert_eq!(config.toolkit.version, Some(ToolkitVersion::new(9, 2)));
        assert_eq!(config.toolkit.driver_version, Some(ToolkitVersion::new(10, 1)));
        assert!(!config.use_packaged());
    }

    #[test]
    fn test_apply_env_rejects_garbage() {
        let mut config = NvkitConfig::default();
        assert!(config.apply_env(env(&[(ENV_USE_PACKAGED, "maybe")])).is_err());
        assert!(config.apply_env(env(&[(ENV_VERSION, "latest")])).is_err());
    }

    #[test]
    fn test_use_packaged_defaults_to_true() {
        assert!(NvkitConfig::default().use_packaged());
    }
}
