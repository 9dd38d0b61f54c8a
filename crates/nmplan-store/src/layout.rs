use crate::StoreError;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const LAYER_EXTENSION: &str = "yaml";

/// Directory layout of a netplan hierarchy below a root directory.
///
/// Layers live in `lib/netplan`, `etc/netplan` and `run/netplan`, in
/// increasing order of precedence.
#[derive(Debug, Clone)]
pub struct HierarchyLayout {
    root: PathBuf,
}

impl HierarchyLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn lib_dir(&self) -> PathBuf {
        self.root.join("lib").join("netplan")
    }

    /// Where newly created layer files are written.
    #[inline]
    pub fn etc_dir(&self) -> PathBuf {
        self.root.join("etc").join("netplan")
    }

    #[inline]
    pub fn run_dir(&self) -> PathBuf {
        self.root.join("run").join("netplan")
    }

    /// Layer directories, lowest precedence first.
    pub fn layer_dirs(&self) -> [PathBuf; 3] {
        [self.lib_dir(), self.etc_dir(), self.run_dir()]
    }

    /// Effective layer files in application order.
    ///
    /// A file shadows every same-named file in a lower-precedence directory.
    /// The survivors are ordered by file name. Missing directories are
    /// treated as empty.
    pub fn discover(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut by_name: BTreeMap<String, PathBuf> = BTreeMap::new();
        for dir in self.layer_dirs() {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            for entry in entries {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some(LAYER_EXTENSION)
                    || !path.is_file()
                {
                    continue;
                }
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                by_name.insert(name.to_owned(), path);
            }
        }
        Ok(by_name.into_values().collect())
    }
}
