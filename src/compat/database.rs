//! Toolkit-side compatibility database.
//!
//! Which device capabilities a toolkit release can target, and which PTX ISA
//! versions it understands. Ranges are expressed on toolkit releases.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use semver::VersionReq;

use super::Capabilities;
use crate::core::ToolkitVersion;

/// Device capability -> toolkit releases that can target it.
const CAPABILITY_TABLE: &[(u64, u64, &str)] = &[
    (1, 0, "<=6.5"),
    (1, 1, "<=6.5"),
    (1, 2, "<=6.5"),
    (1, 3, "<=6.5"),
    (2, 0, "<=8.0"),
    (2, 1, "<=8.0"),
    (3, 0, ">=4.2, <=10.2"),
    (3, 2, ">=6.0, <=10.2"),
    (3, 5, ">=5.0, <=11.8"),
    (3, 7, ">=6.5, <=11.8"),
    (5, 0, ">=6.0"),
    (5, 2, ">=7.0"),
    (5, 3, ">=7.5"),
    (6, 0, ">=8.0"),
    (6, 1, ">=8.0"),
    (6, 2, ">=8.0"),
    (7, 0, ">=9.0"),
    (7, 2, ">=9.2"),
    (7, 5, ">=10.0"),
    (8, 0, ">=11.0"),
    (8, 6, ">=11.1"),
    (8, 7, ">=11.4"),
    (8, 9, ">=11.8"),
    (9, 0, ">=11.8"),
];

/// PTX ISA version -> first toolkit release that emits it.
const ISA_TABLE: &[(u64, u64, &str)] = &[
    (1, 0, ">=1.0"),
    (1, 1, ">=1.1"),
    (1, 2, ">=2.0"),
    (1, 3, ">=2.1"),
    (1, 4, ">=2.2"),
    (2, 0, ">=3.0"),
    (2, 1, ">=3.1"),
    (2, 2, ">=3.2"),
    (2, 3, ">=4.0"),
    (3, 0, ">=4.1"),
    (3, 1, ">=5.0"),
    (3, 2, ">=5.5"),
    (4, 0, ">=6.0"),
    (4, 1, ">=6.5"),
    (4, 2, ">=7.0"),
    (4, 3, ">=7.5"),
    (5, 0, ">=8.0"),
    (6, 0, ">=9.0"),
    (6, 1, ">=9.1"),
    (6, 2, ">=9.2"),
    (6, 3, ">=10.0"),
    (6, 4, ">=10.1"),
    (6, 5, ">=10.2"),
    (7, 0, ">=11.0"),
    (7, 1, ">=11.1"),
    (7, 2, ">=11.2"),
    (7, 3, ">=11.3"),
    (7, 4, ">=11.4"),
    (7, 5, ">=11.5"),
    (7, 6, ">=11.6"),
    (7, 7, ">=11.7"),
    (7, 8, ">=11.8"),
    (8, 0, ">=12.0"),
];

pub(crate) type Table = Vec<(ToolkitVersion, VersionReq)>;

static CAPABILITIES: LazyLock<Table> = LazyLock::new(|| compile(CAPABILITY_TABLE));

static ISA_VERSIONS: LazyLock<Table> = LazyLock::new(|| compile(ISA_TABLE));

pub(crate) fn compile(entries: &[(u64, u64, &str)]) -> Table {
    entries
        .iter()
        .map(|&(major, minor, req)| {
            let req = VersionReq::parse(req).expect("valid compatibility range");
            (ToolkitVersion::new(major, minor), req)
        })
        .collect()
}

pub(crate) fn supported(table: &Table, release: &semver::Version) -> BTreeSet<ToolkitVersion> {
    table
        .iter()
        .filter(|(_, req)| req.matches(release))
        .map(|(version, _)| *version)
        .collect()
}

/// Device capabilities supported by a toolkit version.
pub fn toolkit_device_capabilities(toolkit: &ToolkitVersion) -> BTreeSet<ToolkitVersion> {
    supported(&CAPABILITIES, &toolkit.release().to_semver())
}

/// PTX ISA versions supported by a toolkit version.
pub fn toolkit_isa_versions(toolkit: &ToolkitVersion) -> BTreeSet<ToolkitVersion> {
    supported(&ISA_VERSIONS, &toolkit.release().to_semver())
}

/// Everything a toolkit version supports.
pub fn toolkit_capabilities(toolkit: &ToolkitVersion) -> Capabilities {
    Capabilities {
        devices: toolkit_device_capabilities(toolkit),
        isa: toolkit_isa_versions(toolkit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(major: u64, minor: u64) -> ToolkitVersion {
        ToolkitVersion::new(major, minor)
    }

    #[test]
    fn test_capabilities_cuda_10_2() {
        let caps = toolkit_device_capabilities(&ToolkitVersion::with_patch(10, 2, 89));
        assert!(caps.contains(&v(3, 0)));
        assert!(caps.contains(&v(7, 5)));
        assert!(!caps.contains(&v(2, 0)));
        assert!(!caps.contains(&v(8, 0)));
    }

    #[test]
    fn test_capabilities_cuda_11_0() {
        let caps = toolkit_device_capabilities(&v(11, 0));
        assert!(!caps.contains(&v(3, 0)));
        assert!(caps.contains(&v(3, 5)));
        assert!(caps.contains(&v(8, 0)));
        assert!(!caps.contains(&v(8, 6)));
    }

    #[test]
    fn test_isa_versions() {
        let isa = toolkit_isa_versions(&v(10, 1));
        assert!(isa.contains(&v(6, 4)));
        assert!(!isa.contains(&v(6, 5)));
        assert_eq!(isa.iter().next(), Some(&v(1, 0)));
    }

    #[test]
    fn test_upper_bound_is_inclusive_of_patches() {
        let caps = toolkit_device_capabilities(&ToolkitVersion::with_patch(11, 8, 89));
        assert!(caps.contains(&v(3, 5)));
        let caps = toolkit_device_capabilities(&v(12, 0));
        assert!(!caps.contains(&v(3, 5)));
    }
}
