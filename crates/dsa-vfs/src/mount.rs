//! In-memory virtual filesystem
//!
//! This is the filesystem the core sees. Paths are absolute and
//! `/`-separated. Directories can be marked as mount points backed by a
//! durable store; the [`StorageManager`](crate::storage::StorageManager)
//! moves their contents to and from that store.

use dsa_core::error::StorageError;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};

/// Well-known directories
pub mod paths {
    pub const FIRMWARE: &str = "/firmware";
    pub const SAVEFILES: &str = "/savefiles";
    pub const ROMS: &str = "/roms";
    pub const ROM_FILE: &str = "/roms/game.nds";
}

/// Normalize an absolute virtual path
///
/// Collapses repeated separators and strips a trailing one. Relative paths
/// and `.`/`..` components are rejected.
pub fn normalize(path: &str) -> Result<String, StorageError> {
    if !path.starts_with('/') {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    let mut normalized = String::with_capacity(path.len());
    for component in path.split('/').filter(|c| !c.is_empty()) {
        if component == "." || component == ".." {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        normalized.push('/');
        normalized.push_str(component);
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    Ok(normalized)
}

fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(index) => &path[..index],
    }
}

#[derive(Debug, Default)]
struct Tree {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
    mounts: BTreeSet<String>,
}

impl Tree {
    fn new() -> Self {
        let mut tree = Self::default();
        tree.dirs.insert("/".to_string());
        tree
    }
}

/// Virtual filesystem
#[derive(Debug)]
pub struct VirtualFileSystem {
    tree: RwLock<Tree>,
}

impl VirtualFileSystem {
    /// Create a filesystem containing only `/`
    pub fn new() -> Self {
        Self {
            tree: RwLock::new(Tree::new()),
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        let Ok(path) = normalize(path) else {
            return false;
        };
        let tree = self.tree.read();
        tree.dirs.contains(&path) || tree.files.contains_key(&path)
    }

    pub fn is_dir(&self, path: &str) -> bool {
        normalize(path)
            .map(|path| self.tree.read().dirs.contains(&path))
            .unwrap_or(false)
    }

    /// Create a directory and any missing parents; existing directories are fine
    pub fn create_dir(&self, path: &str) -> Result<(), StorageError> {
        let path = normalize(path)?;
        let mut tree = self.tree.write();
        if tree.files.contains_key(&path) {
            return Err(StorageError::InvalidPath(path));
        }
        let mut current = String::new();
        for component in path.split('/').filter(|c| !c.is_empty()) {
            current.push('/');
            current.push_str(component);
            if tree.files.contains_key(&current) {
                return Err(StorageError::InvalidPath(current));
            }
            if tree.dirs.insert(current.clone()) {
                tracing::debug!("Created directory {}", current);
            }
        }
        Ok(())
    }

    /// Write a file, replacing any previous contents; the parent must exist
    pub fn write(&self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = normalize(path)?;
        let mut tree = self.tree.write();
        if tree.dirs.contains(&path) {
            return Err(StorageError::InvalidPath(path));
        }
        let dir = parent(&path);
        if !tree.dirs.contains(dir) {
            return Err(StorageError::MissingDirectory(dir.to_string()));
        }
        tree.files.insert(path, data.to_vec());
        Ok(())
    }

    pub fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let path = normalize(path)?;
        self.tree
            .read()
            .files
            .get(&path)
            .cloned()
            .ok_or(StorageError::NotFound(path))
    }

    pub fn file_size(&self, path: &str) -> Option<usize> {
        let path = normalize(path).ok()?;
        self.tree.read().files.get(&path).map(Vec::len)
    }

    pub fn remove(&self, path: &str) -> Result<(), StorageError> {
        let path = normalize(path)?;
        self.tree
            .write()
            .files
            .remove(&path)
            .map(|_| ())
            .ok_or(StorageError::NotFound(path))
    }

    /// Mark an existing directory as a mount point
    pub fn mount(&self, path: &str) -> Result<bool, StorageError> {
        let path = normalize(path)?;
        let mut tree = self.tree.write();
        if !tree.dirs.contains(&path) {
            return Err(StorageError::MissingDirectory(path));
        }
        let added = tree.mounts.insert(path.clone());
        if added {
            tracing::info!("Mounted {}", path);
        }
        Ok(added)
    }

    pub fn is_mounted(&self, path: &str) -> bool {
        normalize(path)
            .map(|path| self.tree.read().mounts.contains(&path))
            .unwrap_or(false)
    }

    pub fn mounts(&self) -> Vec<String> {
        self.tree.read().mounts.iter().cloned().collect()
    }

    /// Files below `dir`, keyed by path relative to it
    pub fn files_under(&self, dir: &str) -> Result<BTreeMap<String, Vec<u8>>, StorageError> {
        let dir = normalize(dir)?;
        let prefix = if dir == "/" { dir.clone() } else { format!("{}/", dir) };
        let tree = self.tree.read();
        if !tree.dirs.contains(&dir) {
            return Err(StorageError::MissingDirectory(dir));
        }
        Ok(tree
            .files
            .iter()
            .filter_map(|(path, data)| {
                path.strip_prefix(&prefix)
                    .map(|relative| (relative.to_string(), data.clone()))
            })
            .collect())
    }

    /// Replace everything below `dir` with `files` (relative paths)
    pub fn replace_dir(
        &self,
        dir: &str,
        files: BTreeMap<String, Vec<u8>>,
    ) -> Result<(), StorageError> {
        let dir = normalize(dir)?;
        let prefix = if dir == "/" { dir.clone() } else { format!("{}/", dir) };

        let mut staged = Vec::with_capacity(files.len());
        for (relative, data) in files {
            staged.push((normalize(&format!("{}{}", prefix, relative))?, data));
        }

        let mut tree = self.tree.write();
        if !tree.dirs.contains(&dir) {
            return Err(StorageError::MissingDirectory(dir));
        }
        tree.files.retain(|path, _| !path.starts_with(&prefix));
        for (path, data) in staged {
            let mut current = parent(&path).to_string();
            while current.len() > dir.len() && tree.dirs.insert(current.clone()) {
                current = parent(&current).to_string();
            }
            tree.files.insert(path, data);
        }
        Ok(())
    }
}

impl Default for VirtualFileSystem {
    fn default() -> Self {
        Self::new()
    }
}
