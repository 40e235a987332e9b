//! Sources of packaged toolkit bundles.

pub mod bundle;

pub use bundle::{
    default_cache_dir, registry_from_manifest, BundleEntry, BundleFetch, BundleManifest,
};
