//! Toolkit version parsing and ordering.
//!
//! Toolkit tools report their version in banners such as
//! `Cuda compilation tools, release 10.2, V10.2.89`. The parser extracts
//! the most precise version it can find; plain `X.Y` and `X.Y.Z` strings
//! (as used in configuration) are accepted as well.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static PLAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)(?:\.(\d+))?(?:\.(\d+))?$").expect("valid regex"));

static BANNER_FULL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bV(\d+)\.(\d+)\.(\d+)\b").expect("valid regex"));

static BANNER_RELEASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\brelease (\d+)\.(\d+)\b").expect("valid regex"));

static ANY_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+)\.(\d+)(?:\.(\d+))?\b").expect("valid regex"));

/// Error while parsing a toolkit version.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("empty version string")]
    Empty,

    #[error("no version number found in `{0}`")]
    NotFound(String),

    #[error("version component out of range in `{0}`")]
    OutOfRange(String),
}

/// A toolkit version: major, minor and an optional patch level.
///
/// Ordering is lexicographic on (major, minor, patch); a missing patch
/// orders before any explicit patch of the same release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ToolkitVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: Option<u64>,
}

impl ToolkitVersion {
    /// Create a release-level version (no patch).
    pub const fn new(major: u64, minor: u64) -> Self {
        ToolkitVersion {
            major,
            minor,
            patch: None,
        }
    }

    /// Create a version with an explicit patch level.
    pub const fn with_patch(major: u64, minor: u64, patch: u64) -> Self {
        ToolkitVersion {
            major,
            minor,
            patch: Some(patch),
        }
    }

    /// Parse a version from a plain version string or a tool banner.
    ///
    /// A bare major (`"11"`) is shorthand for `11.0` and formats as such;
    /// `X.Y` and `X.Y.Z` strings format back unchanged.
    pub fn parse(text: &str) -> Result<Self, VersionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(VersionError::Empty);
        }

        let caps = PLAIN
            .captures(text)
            .or_else(|| BANNER_FULL.captures(text))
            .or_else(|| BANNER_RELEASE.captures(text))
            .or_else(|| ANY_VERSION.captures(text))
            .ok_or_else(|| VersionError::NotFound(text.to_string()))?;

        let component = |idx: usize| -> Result<Option<u64>, VersionError> {
            caps.get(idx)
                .map(|m| {
                    m.as_str()
                        .parse::<u64>()
                        .map_err(|_| VersionError::OutOfRange(text.to_string()))
                })
                .transpose()
        };

        Ok(ToolkitVersion {
            major: component(1)?.unwrap_or(0),
            minor: component(2)?.unwrap_or(0),
            patch: component(3)?,
        })
    }

    /// Truncate to the release (major, minor).
    pub const fn release(&self) -> Self {
        ToolkitVersion::new(self.major, self.minor)
    }

    /// Whether both versions belong to the same release, ignoring patch.
    pub fn same_release(&self, other: &Self) -> bool {
        self.major == other.major && self.minor == other.minor
    }

    /// Compare only the release components.
    pub fn cmp_release(&self, other: &Self) -> Ordering {
        (self.major, self.minor).cmp(&(other.major, other.minor))
    }

    /// Convert to a semver version, treating a missing patch as zero.
    pub fn to_semver(&self) -> semver::Version {
        semver::Version::new(self.major, self.minor, self.patch.unwrap_or(0))
    }
}

/// Compare two versions on (major, minor, patch).
pub fn compare(a: &ToolkitVersion, b: &ToolkitVersion) -> Ordering {
    a.cmp(b)
}

/// Whether two versions share a release.
pub fn same_release(a: &ToolkitVersion, b: &ToolkitVersion) -> bool {
    a.same_release(b)
}

/// Render a list of versions for log output, e.g. `6.0, 7.5`.
pub fn version_list<'a>(versions: impl IntoIterator<Item = &'a ToolkitVersion>) -> String {
    versions
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for ToolkitVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.patch {
            Some(patch) => write!(f, "{}.{}.{}", self.major, self.minor, patch),
            None => write!(f, "{}.{}", self.major, self.minor),
        }
    }
}

impl FromStr for ToolkitVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolkitVersion::parse(s)
    }
}

impl TryFrom<String> for ToolkitVersion {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ToolkitVersion::parse(&value)
    }
}

impl From<ToolkitVersion> for String {
    fn from(value: ToolkitVersion) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        assert_eq!(
            ToolkitVersion::parse("10.2").unwrap(),
            ToolkitVersion::new(10, 2)
        );
        assert_eq!(
            ToolkitVersion::parse("11.4.120").unwrap(),
            ToolkitVersion::with_patch(11, 4, 120)
        );
    }

    #[test]
    fn test_bare_major_means_release_zero() {
        let v = ToolkitVersion::parse("11").unwrap();
        assert_eq!(v, ToolkitVersion::new(11, 0));
        assert_eq!(v.to_string(), "11.0");
        assert_eq!(ToolkitVersion::parse(&v.to_string()).unwrap(), v);
    }

    #[test]
    fn test_parse_nvdisasm_banner() {
        let banner = "nvdisasm: NVIDIA (R) CUDA disassembler\n\
                      Copyright (c) 2005-2019 NVIDIA Corporation\n\
                      Built on Wed_Oct_23_19:23:20_PDT_2019\n\
                      Cuda compilation tools, release 10.2, V10.2.89";
        assert_eq!(
            ToolkitVersion::parse(banner).unwrap(),
            ToolkitVersion::with_patch(10, 2, 89)
        );
    }

    #[test]
    fn test_parse_release_only_banner() {
        let banner = "Cuda compilation tools, release 9.2";
        assert_eq!(
            ToolkitVersion::parse(banner).unwrap(),
            ToolkitVersion::new(9, 2)
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(ToolkitVersion::parse("  "), Err(VersionError::Empty));
        assert!(matches!(
            ToolkitVersion::parse("no digits here"),
            Err(VersionError::NotFound(_))
        ));
        assert!(matches!(
            ToolkitVersion::parse("99999999999999999999999.1"),
            Err(VersionError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_display_round_trip() {
        for text in ["9.0", "10.2", "10.2.89", "11.0.3"] {
            let v = ToolkitVersion::parse(text).unwrap();
            assert_eq!(v.to_string(), text);
            assert_eq!(ToolkitVersion::parse(&v.to_string()).unwrap(), v);
        }
    }

    #[test]
    fn test_ordering() {
        let a = ToolkitVersion::new(10, 1);
        let b = ToolkitVersion::with_patch(10, 1, 105);
        let c = ToolkitVersion::new(10, 2);
        let d = ToolkitVersion::new(9, 2);

        assert_eq!(compare(&a, &b), Ordering::Less);
        assert_eq!(compare(&b, &c), Ordering::Less);
        assert_eq!(compare(&d, &a), Ordering::Less);
        assert_eq!(compare(&c, &c), Ordering::Equal);
        assert_eq!(compare(&c, &d), Ordering::Greater);
    }

    #[test]
    fn test_same_release_ignores_patch() {
        let a = ToolkitVersion::with_patch(10, 2, 89);
        let b = ToolkitVersion::new(10, 2);
        assert!(same_release(&a, &b));
        assert_ne!(a, b);
        assert_eq!(a.release(), b);
        assert_eq!(a.cmp_release(&b), Ordering::Equal);
        assert!(!same_release(&a, &ToolkitVersion::new(10, 1)));
    }

    #[test]
    fn test_to_semver() {
        assert_eq!(
            ToolkitVersion::new(11, 1).to_semver(),
            semver::Version::new(11, 1, 0)
        );
    }

    #[test]
    fn test_version_list() {
        let versions = [ToolkitVersion::new(6, 0), ToolkitVersion::new(7, 5)];
        assert_eq!(version_list(&versions), "6.0, 7.5");
    }
}
