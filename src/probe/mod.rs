//! Locating toolkit artifacts below installation roots.
//!
//! Every lookup walks the roots in the order given, then the conventional
//! subdirectories of each root, then the candidate file names, and returns
//! the first existing file. Nothing found is `None`; callers decide whether
//! that is fatal.

use std::path::{Path, PathBuf};

use crate::core::ToolkitVersion;

mod platform;

pub use platform::{release_tag, Platform, MAJOR_ONLY_TAG_RELEASE};

/// Filesystem probe for binaries, libraries and data files.
#[derive(Debug, Clone, Copy)]
pub struct PathProbe {
    platform: Platform,
}

impl PathProbe {
    /// Create a probe using the naming conventions of `platform`.
    pub fn new(platform: Platform) -> Self {
        PathProbe { platform }
    }

    /// Create a probe for the host platform.
    pub fn host() -> Self {
        PathProbe::new(Platform::host())
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Find an executable in `root/bin` or `root`.
    pub fn find_binary(&self, roots: &[PathBuf], name: &str) -> Option<PathBuf> {
        let file_name = self.platform.binary_name(name);

        let found = roots
            .iter()
            .flat_map(|root| [root.join("bin"), root.clone()])
            .map(|dir| dir.join(&file_name))
            .find(|path| path.is_file());

        trace_lookup(name, &found);
        found
    }

    /// Find a shared library, trying version-suffixed names first.
    pub fn find_library(
        &self,
        roots: &[PathBuf],
        name: &str,
        version_hints: &[ToolkitVersion],
    ) -> Option<PathBuf> {
        let versioned = self.platform.versioned_library_names(name, version_hints);
        let unversioned = self.platform.unversioned_library_names(name);

        let mut found = None;
        for dir in roots.iter().flat_map(|root| self.library_dirs(root)) {
            found = first_file(&dir, &versioned)
                .or_else(|| self.glob_versioned(&dir, name, version_hints))
                .or_else(|| first_file(&dir, &unversioned));
            if found.is_some() {
                break;
            }
        }

        trace_lookup(name, &found);
        found
    }

    /// Find a static library such as `libcudadevrt.a`.
    pub fn find_static_library(&self, roots: &[PathBuf], name: &str) -> Option<PathBuf> {
        let file_name = self.platform.static_library_name(name);

        let found = roots
            .iter()
            .flat_map(|root| self.library_dirs(root))
            .map(|dir| dir.join(&file_name))
            .find(|path| path.is_file());

        trace_lookup(name, &found);
        found
    }

    /// Find a file at a fixed path relative to one of the roots.
    pub fn find_file(&self, roots: &[PathBuf], relative: impl AsRef<Path>) -> Option<PathBuf> {
        let relative = relative.as_ref();

        let found = roots
            .iter()
            .map(|root| root.join(relative))
            .find(|path| path.is_file());

        trace_lookup(&relative.display().to_string(), &found);
        found
    }

    /// Library directories under a root, in search order.
    fn library_dirs(&self, root: &Path) -> Vec<PathBuf> {
        let mut dirs = vec![root.to_path_buf(), root.join("lib64"), root.join("lib")];
        if self.platform.is_windows() {
            dirs.push(root.join("lib").join("x64"));
            dirs.push(root.join("bin"));
        }
        dirs
    }

    fn glob_versioned(
        &self,
        dir: &Path,
        name: &str,
        version_hints: &[ToolkitVersion],
    ) -> Option<PathBuf> {
        if self.platform.is_windows() {
            return None;
        }

        // Fully versioned sonames such as `libcupti.so.10.2.75`
        let escaped = glob::Pattern::escape(&dir.to_string_lossy());

        for hint in version_hints {
            let pattern = match self.platform {
                Platform::MacOs => format!("{}/lib{}.{}.{}.*.dylib", escaped, name, hint.major, hint.minor),
                _ => format!("{}/lib{}.so.{}.{}.*", escaped, name, hint.major, hint.minor),
            };

            let Ok(entries) = glob::glob(&pattern) else {
                continue;
            };

            let mut matches: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok())
                .filter(|path| path.is_file())
                .collect();
            matches.sort();

            if let Some(path) = matches.pop() {
                return Some(path);
            }
        }

        None
    }
}

fn first_file(dir: &Path, names: &[String]) -> Option<PathBuf> {
    names
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

fn trace_lookup(what: &str, found: &Option<PathBuf>) {
    match found {
        Some(path) => tracing::debug!("Found {} at {}", what, path.display()),
        None => tracing::debug!("Could not find {}", what),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_find_binary_in_bin() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("bin/nvdisasm"));

        let probe = PathProbe::new(Platform::Linux);
        let found = probe.find_binary(&[tmp.path().to_path_buf()], "nvdisasm");
        assert_eq!(found, Some(tmp.path().join("bin/nvdisasm")));

        let probe = PathProbe::new(Platform::Windows);
        assert_eq!(probe.find_binary(&[tmp.path().to_path_buf()], "nvdisasm"), None);
    }

    #[test]
    fn test_find_binary_first_root_wins() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        touch(&first.path().join("bin/nvdisasm"));
        touch(&second.path().join("bin/nvdisasm"));

        let probe = PathProbe::new(Platform::Linux);
        let roots = vec![second.path().to_path_buf(), first.path().to_path_buf()];
        assert_eq!(
            probe.find_binary(&roots, "nvdisasm"),
            Some(second.path().join("bin/nvdisasm"))
        );
    }

    #[test]
    fn test_find_library_windows_tag() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("bin/cupti64_102.dll"));

        let probe = PathProbe::new(Platform::Windows);
        let found = probe.find_library(
            &[tmp.path().to_path_buf()],
            "cupti",
            &[ToolkitVersion::new(10, 2)],
        );
        assert_eq!(found, Some(tmp.path().join("bin/cupti64_102.dll")));
    }

    #[test]
    fn test_find_library_linux() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("lib64/libcupti.so"));

        let probe = PathProbe::new(Platform::Linux);
        let found = probe.find_library(
            &[tmp.path().to_path_buf()],
            "cupti",
            &[ToolkitVersion::new(10, 2)],
        );
        assert_eq!(found, Some(tmp.path().join("lib64/libcupti.so")));
    }

    #[test]
    fn test_find_library_prefers_versioned() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("lib64/libcupti.so"));
        touch(&tmp.path().join("lib64/libcupti.so.10.2"));

        let probe = PathProbe::new(Platform::Linux);
        let found = probe.find_library(
            &[tmp.path().to_path_buf()],
            "cupti",
            &[ToolkitVersion::new(10, 2)],
        );
        assert_eq!(found, Some(tmp.path().join("lib64/libcupti.so.10.2")));
    }

    #[test]
    fn test_find_library_full_soname() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("lib64/libcupti.so.10.2.75"));

        let probe = PathProbe::new(Platform::Linux);
        let found = probe.find_library(
            &[tmp.path().to_path_buf()],
            "cupti",
            &[ToolkitVersion::new(10, 2)],
        );
        assert_eq!(found, Some(tmp.path().join("lib64/libcupti.so.10.2.75")));
    }

    #[test]
    fn test_find_library_soname_before_unversioned() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("lib64/libcupti.so"));
        touch(&tmp.path().join("lib64/libcupti.so.10.2.75"));

        let probe = PathProbe::new(Platform::Linux);
        let found = probe.find_library(
            &[tmp.path().to_path_buf()],
            "cupti",
            &[ToolkitVersion::new(10, 2)],
        );
        assert_eq!(found, Some(tmp.path().join("lib64/libcupti.so.10.2.75")));
    }

    #[test]
    fn test_find_library_missing() {
        let tmp = TempDir::new().unwrap();
        let probe = PathProbe::new(Platform::Linux);
        assert_eq!(
            probe.find_library(&[tmp.path().to_path_buf()], "cupti", &[]),
            None
        );
    }

    #[test]
    fn test_find_static_library() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("lib/x64/cudadevrt.lib"));
        touch(&tmp.path().join("lib64/libcudadevrt.a"));

        let roots = [tmp.path().to_path_buf()];
        assert_eq!(
            PathProbe::new(Platform::Windows).find_static_library(&roots, "cudadevrt"),
            Some(tmp.path().join("lib/x64/cudadevrt.lib"))
        );
        assert_eq!(
            PathProbe::new(Platform::Linux).find_static_library(&roots, "cudadevrt"),
            Some(tmp.path().join("lib64/libcudadevrt.a"))
        );
    }

    #[test]
    fn test_find_file() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("nvvm/libdevice/libdevice.10.bc"));

        let probe = PathProbe::new(Platform::Linux);
        let roots = [tmp.path().to_path_buf()];
        assert!(probe
            .find_file(&roots, "nvvm/libdevice/libdevice.10.bc")
            .is_some());
        assert!(probe.find_file(&roots, "nvvm/libdevice/missing.bc").is_none());
    }
}
