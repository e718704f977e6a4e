//! Resource locators
//!
//! A locator maps request paths onto canonical locations and serves the
//! bytes behind them. The filesystem locator searches a list of include
//! directories; the in-memory locator backs tests and embedders that feed
//! sources without touching disk.

use crate::resource::{ResourceError, ResourceType};
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

pub trait ResourceLocator {
    /// Resolve `path` to a canonical location, if this locator knows it.
    /// The type is a hint; locators may use it to search type-specific
    /// places and may ignore it.
    fn locate(&self, path: &str, ty: ResourceType) -> Option<String>;

    /// Serve the content behind a canonical location previously returned
    /// by [`locate`](Self::locate).
    fn read(&self, location: &str) -> Result<String, ResourceError>;
}

/// Searches a list of include directories in order.
pub struct FileLocator {
    search_paths: Vec<PathBuf>,
}

impl FileLocator {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        FileLocator { search_paths }
    }

    pub fn with_current_dir() -> Self {
        FileLocator::new(vec![PathBuf::from(".")])
    }

    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.push(path.into());
    }
}

impl ResourceLocator for FileLocator {
    fn locate(&self, path: &str, _ty: ResourceType) -> Option<String> {
        let requested = Path::new(path);
        if requested.is_absolute() {
            return canonical_file(requested);
        }
        self.search_paths
            .iter()
            .find_map(|base| canonical_file(&base.join(requested)))
    }

    fn read(&self, location: &str) -> Result<String, ResourceError> {
        fs::read_to_string(location)
            .map_err(|err| ResourceError::Io(location.to_owned(), err))
    }
}

fn canonical_file(path: &Path) -> Option<String> {
    let canonical = fs::canonicalize(path).ok()?;
    if canonical.is_file() {
        Some(canonical.to_string_lossy().into_owned())
    } else {
        None
    }
}

/// Named sources held in memory. Paths are normalized lexically, so
/// `dir/../a.osml` and `a.osml` canonicalize to the same location.
#[derive(Default)]
pub struct MemoryLocator {
    files: HashMap<String, String>,
}

impl MemoryLocator {
    pub fn new() -> Self {
        MemoryLocator::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.files.insert(normalize(&path.into()), content.into());
    }
}

impl ResourceLocator for MemoryLocator {
    fn locate(&self, path: &str, _ty: ResourceType) -> Option<String> {
        let normalized = normalize(path);
        self.files.contains_key(&normalized).then_some(normalized)
    }

    fn read(&self, location: &str) -> Result<String, ResourceError> {
        self.files
            .get(location)
            .cloned()
            .ok_or_else(|| ResourceError::NotFound(location.to_owned()))
    }
}

/// Lexical normalization: resolves `.` and `..`, keeps the path relative.
pub(crate) fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    parts.push("..");
                }
            }
            Component::Normal(p) => parts.push(p.to_str().unwrap_or("")),
            Component::RootDir | Component::Prefix(_) => parts.clear(),
        }
    }
    parts.join("/")
}

/// Resolve `path` against the directory of `base`, lexically.
pub(crate) fn resolve_relative(base: &str, path: &str) -> String {
    match Path::new(base).parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            normalize(&format!("{}/{}", dir.to_string_lossy(), path))
        }
        _ => normalize(path),
    }
}
