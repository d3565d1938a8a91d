//! Storage lifecycle
//!
//! Prepares the mounted directories before a cart or BIOS is loaded and
//! pushes the virtual filesystem back to durable storage after the core
//! writes a save. The core writes saves in bursts, so a write only arms a
//! debounce deadline; the push happens once the deadline passes, and any
//! further writes inside that window are folded into the same push.

use crate::durable::DurableStore;
use crate::mount::{paths, VirtualFileSystem};
use dsa_core::error::StorageError;
use dsa_core::events::{Channel, EventHub};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Delay between the first save write and the durable push
pub const SAVE_DEBOUNCE: Duration = Duration::from_millis(500);

/// Directories mounted by `prepare`, in order
pub const DURABLE_DIRS: [&str; 2] = [paths::FIRMWARE, paths::SAVEFILES];

#[derive(Debug, Default)]
struct StorageState {
    prepared: bool,
    is_saving: bool,
    flush_deadline: Option<Instant>,
    flushes: u64,
    failed_flushes: u64,
}

/// Storage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub flushes: u64,
    pub failed_flushes: u64,
}

/// Storage lifecycle manager
pub struct StorageManager {
    vfs: Arc<VirtualFileSystem>,
    store: Arc<dyn DurableStore>,
    hub: Arc<EventHub>,
    state: Mutex<StorageState>,
}

impl StorageManager {
    pub fn new(
        vfs: Arc<VirtualFileSystem>,
        store: Arc<dyn DurableStore>,
        hub: Arc<EventHub>,
    ) -> Self {
        Self {
            vfs,
            store,
            hub,
            state: Mutex::new(StorageState::default()),
        }
    }

    pub fn vfs(&self) -> &Arc<VirtualFileSystem> {
        &self.vfs
    }

    /// Pull, create and mount a durable directory if it is not mounted yet
    ///
    /// The directory only becomes a mount once its durable contents are in
    /// place. A failed pull leaves it unmounted so `flush` never pushes it.
    pub fn ensure_mounted(&self, dir: &str) -> Result<(), StorageError> {
        if self.vfs.is_mounted(dir) {
            return Ok(());
        }
        let files = self.store.pull(dir)?;
        self.vfs.create_dir(dir)?;
        tracing::info!("Synced {} files into {}", files.len(), dir);
        self.vfs.replace_dir(dir, files)?;
        self.vfs.mount(dir)?;
        Ok(())
    }

    /// Mount and sync the durable directories, then publish `prepared`
    pub fn prepare(&self) -> Result<(), StorageError> {
        if self.is_prepared() {
            tracing::warn!("Storage already prepared");
            self.hub.publish(Channel::Prepared);
            return Ok(());
        }

        for dir in DURABLE_DIRS {
            self.ensure_mounted(dir)?;
        }
        self.state.lock().prepared = true;
        tracing::info!("Storage prepared");
        self.hub.publish(Channel::Prepared);
        Ok(())
    }

    pub fn is_prepared(&self) -> bool {
        self.state.lock().prepared
    }

    /// Run `callback` once storage is prepared
    pub fn on_prepared<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        if self.is_prepared() {
            tracing::warn!("Storage already prepared, running callback immediately");
            callback();
        } else {
            self.hub.subscribe(Channel::Prepared, callback);
        }
    }

    /// Write a file into the virtual filesystem without syncing
    pub fn write(&self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        self.vfs.write(path, data)
    }

    /// Record a save write from the core
    ///
    /// The first write of a window publishes `saveInitiate` and arms the
    /// flush deadline; later writes only re-publish `saveInitiate`.
    pub fn notify_write_occurred(&self, now: Instant) {
        {
            let mut state = self.state.lock();
            if !state.is_saving {
                state.is_saving = true;
                state.flush_deadline = Some(now + SAVE_DEBOUNCE);
                tracing::debug!("Save write detected, flushing in {:?}", SAVE_DEBOUNCE);
            }
        }
        self.hub.publish(Channel::SaveInitiate);
    }

    pub fn is_saving(&self) -> bool {
        self.state.lock().is_saving
    }

    pub fn flush_deadline(&self) -> Option<Instant> {
        self.state.lock().flush_deadline
    }

    /// Flush if the debounce deadline has passed; returns whether a flush ran
    pub fn poll(&self, now: Instant) -> Result<bool, StorageError> {
        let due = {
            let mut state = self.state.lock();
            match state.flush_deadline {
                Some(deadline) if now >= deadline => {
                    state.flush_deadline = None;
                    true
                }
                _ => false,
            }
        };
        if due {
            self.flush()?;
        }
        Ok(due)
    }

    /// Flush now if a save is pending
    pub fn flush_pending(&self) -> Result<bool, StorageError> {
        if self.is_saving() {
            self.flush()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Push every mounted directory to the durable store
    ///
    /// The saving flag is cleared even when the push fails so the next
    /// write starts a new window. `saveComplete` is only published on success.
    pub fn flush(&self) -> Result<(), StorageError> {
        let result = self.push_mounts();
        {
            let mut state = self.state.lock();
            state.is_saving = false;
            state.flush_deadline = None;
            match result {
                Ok(()) => state.flushes += 1,
                Err(_) => state.failed_flushes += 1,
            }
        }
        match result {
            Ok(()) => {
                tracing::debug!("Storage sync complete");
                self.hub.publish(Channel::SaveComplete);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Storage sync failed: {}", e);
                Err(e)
            }
        }
    }

    fn push_mounts(&self) -> Result<(), StorageError> {
        for mount in self.vfs.mounts() {
            let files = self.vfs.files_under(&mount)?;
            self.store.push(&mount, &files)?;
        }
        Ok(())
    }

    pub fn stats(&self) -> StorageStats {
        let state = self.state.lock();
        StorageStats {
            flushes: state.flushes,
            failed_flushes: state.failed_flushes,
        }
    }
}
