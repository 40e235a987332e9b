//! Test utilities for nvkit unit tests.
//!
//! Builds fake toolkit installations and packaged bundles on disk so the
//! resolvers can be exercised without a real toolkit.
//!
//! # Example
//!
//! ```rust,ignore
//! use crate::test_support::ToolkitFixture;
//!
//! let fixture = ToolkitFixture::packaged(Platform::Linux, ToolkitVersion::new(10, 2))
//!     .without("share/libdevice/libdevice.10.bc")
//!     .build();
//! ```

pub mod fixtures;

pub use fixtures::*;
