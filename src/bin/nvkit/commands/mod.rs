//! Command implementations

pub mod bundles;
pub mod compat;
pub mod paths;
pub mod status;
