//! Fake toolkit layouts.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::core::ToolkitVersion;
use crate::probe::{release_tag, Platform};

/// A set of empty files describing a toolkit layout.
#[derive(Debug, Clone)]
pub struct ToolkitFixture {
    files: BTreeSet<PathBuf>,
}

impl ToolkitFixture {
    /// An empty layout.
    pub fn empty() -> Self {
        ToolkitFixture {
            files: BTreeSet::new(),
        }
    }

    /// A complete local installation, as laid out by the toolkit installer.
    pub fn local(platform: Platform) -> Self {
        let files: &[&str] = match platform {
            Platform::Windows => &[
                "bin/nvdisasm.exe",
                "bin/nvToolsExt64_1.dll",
                "lib/x64/cudadevrt.lib",
                "nvvm/libdevice/libdevice.10.bc",
                "extras/CUPTI/lib64/cupti64_102.dll",
            ],
            Platform::MacOs => &[
                "bin/nvdisasm",
                "lib/libnvToolsExt.dylib",
                "lib/libcudadevrt.a",
                "nvvm/libdevice/libdevice.10.bc",
                "extras/CUPTI/lib/libcupti.dylib",
            ],
            Platform::Linux => &[
                "bin/nvdisasm",
                "lib64/libnvToolsExt.so",
                "lib64/libcudadevrt.a",
                "nvvm/libdevice/libdevice.10.bc",
                "extras/CUPTI/lib64/libcupti.so",
            ],
        };
        files.iter().fold(Self::empty(), |f, file| f.with(file))
    }

    /// A complete packaged bundle for `version`.
    pub fn packaged(platform: Platform, version: ToolkitVersion) -> Self {
        let fixture = Self::empty().with("share/libdevice/libdevice.10.bc");
        match platform {
            Platform::Windows => fixture
                .with("bin/nvdisasm.exe")
                .with("lib/cudadevrt.lib")
                .with(format!("bin/cupti64_{}.dll", release_tag(&version)))
                .with("bin/nvToolsExt64_1.dll"),
            Platform::MacOs => fixture
                .with("bin/nvdisasm")
                .with("lib/libcudadevrt.a")
                .with("lib/libcupti.dylib")
                .with("lib/libnvToolsExt.dylib"),
            Platform::Linux => fixture
                .with("bin/nvdisasm")
                .with("lib/libcudadevrt.a")
                .with("lib/libcupti.so")
                .with("lib/libnvToolsExt.so"),
        }
    }

    /// Add a file (relative path).
    pub fn with(mut self, file: impl AsRef<Path>) -> Self {
        self.files.insert(file.as_ref().to_path_buf());
        self
    }

    /// Remove a file (relative path).
    pub fn without(mut self, file: impl AsRef<Path>) -> Self {
        self.files.remove(file.as_ref());
        self
    }

    /// Write the layout into a fresh temporary directory.
    pub fn build(&self) -> BuiltFixture {
        let tmp = TempDir::new().expect("create temp dir");
        let root = tmp.path().join("toolkit");
        std::fs::create_dir_all(&root).expect("create toolkit root");

        for file in &self.files {
            let path = root.join(file);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).expect("create fixture directory");
            }
            std::fs::write(&path, b"").expect("write fixture file");
        }

        BuiltFixture { _tmp: tmp, root }
    }
}

/// A fixture written to disk; removed when dropped.
#[derive(Debug)]
pub struct BuiltFixture {
    _tmp: TempDir,
    root: PathBuf,
}

impl BuiltFixture {
    /// The toolkit root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}
