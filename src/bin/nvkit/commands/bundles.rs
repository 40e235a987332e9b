//! `nvkit bundles` command

use anyhow::{Context, Result};

use crate::cli::BundlesArgs;
use nvkit::sources::{default_cache_dir, BundleFetch, BundleManifest};
use nvkit::util::config::{load_config, ENV_BUNDLE_MANIFEST};

pub fn execute(args: BundlesArgs) -> Result<()> {
    let manifest_path = match args.manifest {
        Some(path) => path,
        None => {
            let cwd = std::env::current_dir().context("failed to get current directory")?;
            match load_config(&cwd).toolkit.bundle_manifest {
                Some(path) => path,
                None => {
                    println!(
                        "No bundle manifest configured (set {} or toolkit.bundle_manifest)",
                        ENV_BUNDLE_MANIFEST
                    );
                    return Ok(());
                }
            }
        }
    };

    let manifest = BundleManifest::load(&manifest_path)?;
    if manifest.bundles.is_empty() {
        println!("No bundles listed in {}", manifest_path.display());
        return Ok(());
    }

    let cache_dir = default_cache_dir();
    println!("Bundles in {}:", manifest_path.display());
    for entry in manifest.bundles {
        let fetch = BundleFetch::new(entry, cache_dir.clone());
        let status = if fetch.is_available() {
            "ready"
        } else if fetch.entry().path.exists() {
            "not unpacked"
        } else {
            "missing"
        };
        println!(
            "  {:<10} {:<13} {}",
            fetch.entry().version.to_string(),
            status,
            fetch.entry().path.display()
        );
    }

    Ok(())
}
