//! Virtual file system for ds-anywhere

pub mod durable;
pub mod firmware;
pub mod mount;
pub mod storage;

pub use durable::{DurableStore, HostDirStore, MemoryStore, MountFiles};
pub use firmware::{ActiveBiosFiles, BiosFile};
pub use mount::{paths, VirtualFileSystem};
pub use storage::{StorageManager, StorageStats, SAVE_DEBOUNCE};
