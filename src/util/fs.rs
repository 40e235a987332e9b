//! Filesystem utilities.

use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Extract a gzip-compressed tarball into `dest`.
///
/// If `strip_prefix` is provided, that leading directory is removed from
/// every entry path. Entries that would land outside `dest` are rejected,
/// including links pointing outside it and writes through such links.
pub fn extract_tarball<R: Read>(reader: R, dest: &Path, strip_prefix: Option<&str>) -> Result<()> {
    use flate2::read::GzDecoder;
    use tar::Archive;

    let mut archive = Archive::new(GzDecoder::new(reader));
    ensure_dir(dest)?;
    let canonical_dest = dest
        .canonicalize()
        .with_context(|| format!("failed to resolve directory: {}", dest.display()))?;

    let strip = |path: &Path| -> PathBuf {
        match strip_prefix {
            Some(prefix) => match path.strip_prefix(prefix.trim_end_matches('/')) {
                Ok(rest) => rest.to_path_buf(),
                Err(_) => path.to_path_buf(),
            },
            None => path.to_path_buf(),
        }
    };

    for entry in archive.entries().context("failed to read tarball entries")? {
        let mut entry = entry.context("failed to read tarball entry")?;
        let entry_path = entry.path().context("failed to get entry path")?.into_owned();
        let relative = strip(&entry_path);

        // The prefix directory itself
        if relative.as_os_str().is_empty() {
            continue;
        }

        let Some(output_path) = contained_join(dest, &relative) else {
            bail!(
                "tarball entry escapes destination directory: {}",
                entry_path.display()
            );
        };

        if let Some(parent) = output_path.parent() {
            ensure_dir(parent)?;
            // A previously extracted symlink must not redirect this entry
            let canonical_parent = parent
                .canonicalize()
                .with_context(|| format!("failed to resolve directory: {}", parent.display()))?;
            if !canonical_parent.starts_with(&canonical_dest) {
                bail!(
                    "tarball entry escapes destination directory: {}",
                    entry_path.display()
                );
            }
        }

        let entry_type = entry.header().entry_type();
        match entry_type {
            tar::EntryType::Directory => ensure_dir(&output_path)?,
            tar::EntryType::Regular | tar::EntryType::Continuous => {
                entry.unpack(&output_path).with_context(|| {
                    format!("failed to extract file: {}", output_path.display())
                })?;
            }
            tar::EntryType::Symlink => {
                let target = link_target(&entry, &entry_path)?;
                if !is_relative_within(&target) {
                    bail!(
                        "tarball symlink {} points outside the destination: {}",
                        entry_path.display(),
                        target.display()
                    );
                }
                entry.unpack(&output_path).with_context(|| {
                    format!("failed to extract symlink: {}", output_path.display())
                })?;
            }
            tar::EntryType::Link => {
                // Hard link targets name another archive member
                let target = link_target(&entry, &entry_path)?;
                let Some(source) = contained_join(dest, &strip(&target)) else {
                    bail!(
                        "tarball hard link {} points outside the destination: {}",
                        entry_path.display(),
                        target.display()
                    );
                };
                if output_path.exists() {
                    fs::remove_file(&output_path)?;
                }
                fs::hard_link(&source, &output_path).with_context(|| {
                    format!(
                        "failed to link {} to {}",
                        output_path.display(),
                        source.display()
                    )
                })?;
            }
            _ => {
                tracing::debug!(
                    "Skipping unsupported entry type {:?}: {}",
                    entry_type,
                    entry_path.display()
                );
            }
        }
    }

    Ok(())
}

fn link_target<R: Read>(entry: &tar::Entry<'_, R>, entry_path: &Path) -> Result<PathBuf> {
    entry
        .link_name()
        .context("failed to read link target")?
        .map(|target| target.into_owned())
        .with_context(|| format!("link without a target: {}", entry_path.display()))
}

/// Whether a symlink target stays below the link's own directory.
fn is_relative_within(target: &Path) -> bool {
    target
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

/// Join `relative` onto `base`, refusing absolute paths and `..` components.
fn contained_join(base: &Path, relative: &Path) -> Option<PathBuf> {
    let mut out = base.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}
