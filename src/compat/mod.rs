//! Reconciling code generator support with toolkit support.
//!
//! A device capability or PTX ISA version is usable only when both the code
//! generator can emit it and the toolkit can assemble and link it.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::core::version::version_list;
use crate::core::{CompatibilityRange, ToolkitVersion};

pub mod database;

pub use database::toolkit_capabilities;

/// A set of device capabilities and PTX ISA versions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub devices: BTreeSet<ToolkitVersion>,
    pub isa: BTreeSet<ToolkitVersion>,
}

impl Capabilities {
    pub fn new(
        devices: impl IntoIterator<Item = ToolkitVersion>,
        isa: impl IntoIterator<Item = ToolkitVersion>,
    ) -> Self {
        Capabilities {
            devices: devices.into_iter().collect(),
            isa: isa.into_iter().collect(),
        }
    }
}

/// The code generator and toolkit have nothing in common.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompatError {
    #[error("toolchain does not support any device capability (code generator: {toolchain}; toolkit: {toolkit})")]
    NoDeviceCapability { toolchain: String, toolkit: String },

    #[error("toolchain does not support any PTX ISA version (code generator: {toolchain}; toolkit: {toolkit})")]
    NoInstructionSet { toolchain: String, toolkit: String },
}

/// Intersect what the code generator supports with what the toolkit supports.
pub fn reconcile(
    toolchain: &Capabilities,
    toolkit: &Capabilities,
) -> Result<CompatibilityRange, CompatError> {
    let devices: Vec<ToolkitVersion> = toolchain
        .devices
        .intersection(&toolkit.devices)
        .copied()
        .collect();
    if devices.is_empty() {
        return Err(CompatError::NoDeviceCapability {
            toolchain: version_list(&toolchain.devices),
            toolkit: version_list(&toolkit.devices),
        });
    }

    let isa: Vec<ToolkitVersion> = toolchain.isa.intersection(&toolkit.isa).copied().collect();
    if isa.is_empty() {
        return Err(CompatError::NoInstructionSet {
            toolchain: version_list(&toolchain.isa),
            toolkit: version_list(&toolkit.isa),
        });
    }

    Ok(CompatibilityRange { devices, isa })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(major: u64, minor: u64) -> ToolkitVersion {
        ToolkitVersion::new(major, minor)
    }

    #[test]
    fn test_reconcile_intersection() {
        let toolchain = Capabilities::new([v(6, 0), v(7, 0), v(7, 5)], [v(6, 0), v(6, 3)]);
        let toolkit = Capabilities::new([v(6, 0), v(7, 5), v(8, 0)], [v(6, 3), v(6, 5)]);

        let range = reconcile(&toolchain, &toolkit).unwrap();
        assert_eq!(range.devices, vec![v(6, 0), v(7, 5)]);
        assert_eq!(range.isa, vec![v(6, 3)]);
    }

    #[test]
    fn test_reconcile_sorted_ascending() {
        let toolchain = Capabilities::new([v(7, 5), v(3, 5), v(6, 1)], [v(6, 4), v(6, 0)]);
        let toolkit = toolchain.clone();

        let range = reconcile(&toolchain, &toolkit).unwrap();
        assert_eq!(range.devices, vec![v(3, 5), v(6, 1), v(7, 5)]);
        assert_eq!(range.isa, vec![v(6, 0), v(6, 4)]);
    }

    #[test]
    fn test_reconcile_no_device_capability() {
        let toolchain = Capabilities::new([v(6, 0)], [v(6, 0)]);
        let toolkit = Capabilities::new([v(7, 0)], [v(6, 0)]);

        let err = reconcile(&toolchain, &toolkit).unwrap_err();
        assert!(matches!(err, CompatError::NoDeviceCapability { .. }));
        assert!(err.to_string().contains("device capability"));
    }

    #[test]
    fn test_reconcile_no_instruction_set() {
        let toolchain = Capabilities::new([v(6, 0)], [v(6, 0)]);
        let toolkit = Capabilities::new([v(6, 0)], [v(7, 0)]);

        let err = reconcile(&toolchain, &toolkit).unwrap_err();
        assert!(matches!(err, CompatError::NoInstructionSet { .. }));
    }
}
