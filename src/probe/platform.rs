//! Platform naming conventions for toolkit artifacts.

use std::collections::HashSet;
use std::fmt;

use crate::core::ToolkitVersion;

/// First release whose Windows DLLs are tagged with the major version only.
pub const MAJOR_ONLY_TAG_RELEASE: ToolkitVersion = ToolkitVersion::new(11, 0);

/// Pointer width baked into Windows toolkit DLL names (`cupti64_102.dll`).
const WORD_SIZE: u32 = 64;

/// The platform whose naming conventions apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    /// The platform this binary was built for.
    pub fn host() -> Self {
        match std::env::consts::OS {
            "windows" => Platform::Windows,
            "macos" | "ios" => Platform::MacOs,
            _ => Platform::Linux,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::MacOs => "macos",
            Platform::Linux => "linux",
        }
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, Platform::Windows)
    }

    /// Executable file name, e.g. `nvdisasm.exe` on Windows.
    pub fn binary_name(&self, name: &str) -> String {
        match self {
            Platform::Windows => format!("{}.exe", name),
            _ => name.to_string(),
        }
    }

    /// Unversioned shared library file name.
    pub fn library_name(&self, name: &str) -> String {
        match self {
            Platform::Windows => format!("{}.dll", name),
            Platform::MacOs => format!("lib{}.dylib", name),
            Platform::Linux => format!("lib{}.so", name),
        }
    }

    /// Shared library file names to try, versioned variants first.
    pub fn library_names(&self, name: &str, hints: &[ToolkitVersion]) -> Vec<String> {
        let mut names = self.versioned_library_names(name, hints);
        names.extend(self.unversioned_library_names(name));
        names
    }

    /// Version-suffixed shared library names for each hint, in hint order.
    pub fn versioned_library_names(&self, name: &str, hints: &[ToolkitVersion]) -> Vec<String> {
        let mut names = Vec::new();

        for hint in hints {
            match self {
                Platform::Windows => {
                    for tag in windows_tags(hint) {
                        names.push(format!("{}{}_{}.dll", name, WORD_SIZE, tag));
                        names.push(format!("{}_{}.dll", name, tag));
                    }
                }
                Platform::MacOs => {
                    names.push(format!("lib{}.{}.{}.dylib", name, hint.major, hint.minor));
                    names.push(format!("lib{}.{}.dylib", name, hint.major));
                }
                Platform::Linux => {
                    names.push(format!("lib{}.so.{}.{}", name, hint.major, hint.minor));
                    names.push(format!("lib{}.so.{}", name, hint.major));
                }
            }
        }

        let mut seen = HashSet::new();
        names.retain(|n| seen.insert(n.clone()));
        names
    }

    /// Shared library names without any version suffix.
    pub fn unversioned_library_names(&self, name: &str) -> Vec<String> {
        match self {
            Platform::Windows => vec![
                format!("{}{}.dll", name, WORD_SIZE),
                self.library_name(name),
            ],
            _ => vec![self.library_name(name)],
        }
    }

    /// Static library file name, e.g. `libcudadevrt.a`.
    pub fn static_library_name(&self, name: &str) -> String {
        match self {
            Platform::Windows => format!("{}.lib", name),
            _ => format!("lib{}.a", name),
        }
    }

    /// Directory holding shared libraries inside a packaged bundle.
    pub fn bundle_library_dir(&self) -> &'static str {
        match self {
            Platform::Windows => "bin",
            _ => "lib",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Release tag used in Windows DLL names.
///
/// `102` for 10.2, but only `11` for 11.x and later.
pub fn release_tag(version: &ToolkitVersion) -> String {
    if version.release() < MAJOR_ONLY_TAG_RELEASE {
        format!("{}{}", version.major, version.minor)
    } else {
        version.major.to_string()
    }
}

fn windows_tags(version: &ToolkitVersion) -> Vec<String> {
    let tag = release_tag(version);
    let major = version.major.to_string();
    if tag == major {
        vec![tag]
    } else {
        vec![tag, major]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_tag() {
        assert_eq!(release_tag(&ToolkitVersion::new(10, 2)), "102");
        assert_eq!(release_tag(&ToolkitVersion::with_patch(9, 0, 176)), "90");
        assert_eq!(release_tag(&ToolkitVersion::new(11, 0)), "11");
        assert_eq!(release_tag(&ToolkitVersion::new(11, 4)), "11");
    }

    #[test]
    fn test_binary_name() {
        assert_eq!(Platform::Windows.binary_name("nvdisasm"), "nvdisasm.exe");
        assert_eq!(Platform::Linux.binary_name("nvdisasm"), "nvdisasm");
        assert_eq!(Platform::MacOs.binary_name("nvdisasm"), "nvdisasm");
    }

    #[test]
    fn test_library_names_windows() {
        let names = Platform::Windows.library_names("cupti", &[ToolkitVersion::new(10, 2)]);
        assert_eq!(names[0], "cupti64_102.dll");
        assert!(names.contains(&"cupti64_10.dll".to_string()));
        assert_eq!(names.last().unwrap(), "cupti.dll");
    }

    #[test]
    fn test_library_names_unix() {
        let names = Platform::Linux.library_names("cupti", &[ToolkitVersion::new(10, 2)]);
        assert_eq!(
            names,
            vec!["libcupti.so.10.2", "libcupti.so.10", "libcupti.so"]
        );

        let names = Platform::MacOs.library_names("cupti", &[]);
        assert_eq!(names, vec!["libcupti.dylib"]);
    }

    #[test]
    fn test_static_library_name() {
        assert_eq!(Platform::Windows.static_library_name("cudadevrt"), "cudadevrt.lib");
        assert_eq!(Platform::Linux.static_library_name("cudadevrt"), "libcudadevrt.a");
    }
}
