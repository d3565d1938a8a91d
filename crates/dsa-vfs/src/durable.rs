//! Durable storage backing the mounted directories

use dsa_core::error::StorageError;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// File contents of one mount, keyed by path relative to the mount point
pub type MountFiles = BTreeMap<String, Vec<u8>>;

/// Persistent store the virtual filesystem syncs with
pub trait DurableStore: Send + Sync {
    /// Read the persisted contents of `mount`
    fn pull(&self, mount: &str) -> Result<MountFiles, StorageError>;

    /// Persist `files` as the complete contents of `mount`
    fn push(&self, mount: &str, files: &MountFiles) -> Result<(), StorageError>;
}

/// Store backed by a host directory, one subdirectory per mount
#[derive(Debug, Clone)]
pub struct HostDirStore {
    root: PathBuf,
}

impl HostDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host directory for a mount point
    pub fn mount_dir(&self, mount: &str) -> PathBuf {
        self.root.join(mount.trim_start_matches('/'))
    }

    fn sync_error(mount: &str, source: std::io::Error) -> StorageError {
        StorageError::Sync {
            mount: mount.to_string(),
            source,
        }
    }
}

fn collect_files(base: &Path, dir: &Path, files: &mut MountFiles) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_files(base, &path, files)?;
        } else if let Ok(relative) = path.strip_prefix(base) {
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.insert(key, fs::read(&path)?);
        }
    }
    Ok(())
}

impl DurableStore for HostDirStore {
    fn pull(&self, mount: &str) -> Result<MountFiles, StorageError> {
        let dir = self.mount_dir(mount);
        let mut files = MountFiles::new();
        if dir.is_dir() {
            collect_files(&dir, &dir, &mut files).map_err(|e| Self::sync_error(mount, e))?;
        }
        tracing::debug!("Pulled {} files for {} from {:?}", files.len(), mount, dir);
        Ok(files)
    }

    fn push(&self, mount: &str, files: &MountFiles) -> Result<(), StorageError> {
        let dir = self.mount_dir(mount);
        fs::create_dir_all(&dir).map_err(|e| Self::sync_error(mount, e))?;

        let mut existing = MountFiles::new();
        collect_files(&dir, &dir, &mut existing).map_err(|e| Self::sync_error(mount, e))?;
        for stale in existing.keys().filter(|name| !files.contains_key(*name)) {
            fs::remove_file(dir.join(stale)).map_err(|e| Self::sync_error(mount, e))?;
        }

        for (name, data) in files {
            if existing.get(name) == Some(data) {
                continue;
            }
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| Self::sync_error(mount, e))?;
            }
            fs::write(&path, data).map_err(|e| Self::sync_error(mount, e))?;
        }
        tracing::debug!("Pushed {} files for {} to {:?}", files.len(), mount, dir);
        Ok(())
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    mounts: Mutex<HashMap<String, MountFiles>>,
    pushes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a mount with contents, as if pushed earlier
    pub fn seed(&self, mount: &str, files: MountFiles) {
        self.mounts.lock().insert(mount.to_string(), files);
    }

    pub fn contents(&self, mount: &str) -> MountFiles {
        self.mounts.lock().get(mount).cloned().unwrap_or_default()
    }

    /// Number of push calls so far
    pub fn push_count(&self) -> u64 {
        self.pushes.load(Ordering::Relaxed)
    }
}

impl DurableStore for MemoryStore {
    fn pull(&self, mount: &str) -> Result<MountFiles, StorageError> {
        Ok(self.contents(mount))
    }

    fn push(&self, mount: &str, files: &MountFiles) -> Result<(), StorageError> {
        self.mounts.lock().insert(mount.to_string(), files.clone());
        self.pushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(entries: &[(&str, &[u8])]) -> MountFiles {
        entries
            .iter()
            .map(|(name, data)| (name.to_string(), data.to_vec()))
            .collect()
    }

    #[test]
    fn test_host_store_round_trip() {
        let temp = tempfile::tempdir().unwrap();
        let store = HostDirStore::new(temp.path());

        let saved = files(&[("ABCD.sav", b"save"), ("sub/extra.bin", b"x")]);
        store.push("/savefiles", &saved).unwrap();
        assert!(temp.path().join("savefiles").join("ABCD.sav").exists());
        assert_eq!(store.pull("/savefiles").unwrap(), saved);
    }

    #[test]
    fn test_host_store_push_removes_stale() {
        let temp = tempfile::tempdir().unwrap();
        let store = HostDirStore::new(temp.path());

        store.push("/savefiles", &files(&[("old.sav", b"1")])).unwrap();
        store.push("/savefiles", &files(&[("new.sav", b"2")])).unwrap();
        assert_eq!(store.pull("/savefiles").unwrap(), files(&[("new.sav", b"2")]));
    }

    #[test]
    fn test_host_store_missing_mount_is_empty() {
        let temp = tempfile::tempdir().unwrap();
        let store = HostDirStore::new(temp.path());
        assert!(store.pull("/firmware").unwrap().is_empty());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        store.seed("/firmware", files(&[("firmware.bin", b"fw")]));
        assert_eq!(store.pull("/firmware").unwrap().len(), 1);

        store.push("/savefiles", &files(&[("a.sav", b"a")])).unwrap();
        assert_eq!(store.push_count(), 1);
        assert_eq!(store.contents("/savefiles")["a.sav"], b"a");
    }
}
