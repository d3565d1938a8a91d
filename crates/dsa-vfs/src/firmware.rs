//! BIOS and firmware images under `/firmware`

use crate::mount::{paths, VirtualFileSystem};
use crate::storage::StorageManager;
use dsa_core::error::StorageError;
use std::fmt;
use std::time::Instant;

/// User-supplied boot image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BiosFile {
    /// ARM7 BIOS
    Arm7,
    /// ARM9 BIOS
    Arm9,
    /// Firmware flash dump
    Firmware,
}

impl BiosFile {
    pub const ALL: [BiosFile; 3] = [BiosFile::Arm7, BiosFile::Arm9, BiosFile::Firmware];

    pub fn file_name(self) -> &'static str {
        match self {
            BiosFile::Arm7 => "bios7.bin",
            BiosFile::Arm9 => "bios9.bin",
            BiosFile::Firmware => "firmware.bin",
        }
    }

    /// Path in the virtual filesystem
    pub fn path(self) -> String {
        format!("{}/{}", paths::FIRMWARE, self.file_name())
    }

    /// Exact size the image must have, if fixed
    pub fn required_size(self) -> Option<usize> {
        match self {
            BiosFile::Arm7 => Some(0x4000),
            BiosFile::Arm9 => Some(0x1000),
            BiosFile::Firmware => None,
        }
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        BiosFile::ALL.into_iter().find(|file| file.file_name() == name)
    }

    pub fn accepts(self, data: &[u8]) -> bool {
        self.required_size().map_or(true, |size| data.len() == size)
    }
}

impl fmt::Display for BiosFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Which boot images are present
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveBiosFiles {
    pub has_bios7: bool,
    pub has_bios9: bool,
    pub has_firmware: bool,
}

impl ActiveBiosFiles {
    pub fn scan(vfs: &VirtualFileSystem) -> Self {
        Self {
            has_bios7: vfs.exists(&BiosFile::Arm7.path()),
            has_bios9: vfs.exists(&BiosFile::Arm9.path()),
            has_firmware: vfs.exists(&BiosFile::Firmware.path()),
        }
    }

    pub fn all_present(&self) -> bool {
        self.has_bios7 && self.has_bios9 && self.has_firmware
    }
}

impl StorageManager {
    /// Store an uploaded boot image
    ///
    /// Unknown names and BIOS images of the wrong size are discarded and
    /// `Ok(None)` is returned. Accepted images schedule a storage sync.
    pub fn upload_bios_file(
        &self,
        file_name: &str,
        data: &[u8],
        now: Instant,
    ) -> Result<Option<BiosFile>, StorageError> {
        self.ensure_mounted(paths::FIRMWARE)?;

        let Some(file) = BiosFile::from_file_name(file_name) else {
            tracing::debug!("Discarding unknown boot image {}", file_name);
            return Ok(None);
        };
        if !file.accepts(data) {
            tracing::debug!(
                "Discarding {}: {} bytes, expected {:?}",
                file,
                data.len(),
                file.required_size()
            );
            return Ok(None);
        }

        self.write(&file.path(), data)?;
        tracing::info!("Stored {} ({} bytes)", file, data.len());
        self.notify_write_occurred(now);
        Ok(Some(file))
    }

    pub fn active_bios_files(&self) -> ActiveBiosFiles {
        ActiveBiosFiles::scan(self.vfs())
    }

    /// Whether all three boot images are present
    pub fn can_boot_firmware(&self) -> Result<bool, StorageError> {
        self.ensure_mounted(paths::FIRMWARE)?;
        Ok(self.active_bios_files().all_present())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::durable::MemoryStore;
    use dsa_core::events::EventHub;
    use std::sync::Arc;

    fn manager() -> StorageManager {
        StorageManager::new(
            Arc::new(VirtualFileSystem::new()),
            Arc::new(MemoryStore::new()),
            Arc::new(EventHub::new()),
        )
    }

    #[test]
    fn test_size_rules() {
        let storage = manager();
        let now = Instant::now();

        let upload = |name: &str, data: &[u8]| storage.upload_bios_file(name, data, now).unwrap();

        assert_eq!(upload("bios7.bin", &[0; 0x4000]), Some(BiosFile::Arm7));
        assert_eq!(upload("bios9.bin", &[0; 0x4000]), None);
        assert_eq!(upload("bios9.bin", &[0; 0x1000]), Some(BiosFile::Arm9));
        assert_eq!(upload("firmware.bin", &[1, 2, 3]), Some(BiosFile::Firmware));
        assert_eq!(upload("bios.rom", &[0; 0x4000]), None);
        assert_eq!(storage.vfs().file_size("/firmware/firmware.bin"), Some(3));
    }

    #[test]
    fn test_can_boot() {
        let storage = manager();
        let now = Instant::now();
        assert!(!storage.can_boot_firmware().unwrap());
        assert!(storage.vfs().is_dir(paths::FIRMWARE));

        storage.upload_bios_file("bios7.bin", &[0; 0x4000], now).unwrap();
        storage.upload_bios_file("bios9.bin", &[0; 0x1000], now).unwrap();
        assert!(!storage.can_boot_firmware().unwrap());

        storage.upload_bios_file("firmware.bin", &[0; 256], now).unwrap();
        assert!(storage.can_boot_firmware().unwrap());
        assert!(storage.active_bios_files().all_present());
    }

    #[test]
    fn test_upload_schedules_sync() {
        let storage = manager();
        let now = Instant::now();
        storage.upload_bios_file("bios7.bin", &[0; 12], now).unwrap();
        assert!(!storage.is_saving());
        storage.upload_bios_file("firmware.bin", &[0; 12], now).unwrap();
        assert!(storage.is_saving());
    }
}
