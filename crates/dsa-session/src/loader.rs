//! Cart and BIOS loading
//!
//! A cart image is first inserted: written to `/roms/game.nds` and parsed
//! by a fresh cart handle so its title and code are known. Loading it then
//! hands the handle to the core. BIOS selection decides how the core boots.

use crate::emulator::{CartHandle, EmulationCore};
use crate::runner::{Session, SessionInner};
use dsa_core::error::SessionError;
use dsa_core::lifecycle::SessionState;
use dsa_core::Result;
use dsa_vfs::{paths, BiosFile};
use std::path::Path;

/// Title and code of an inserted cart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartInfo {
    pub title: String,
    pub code: String,
}

impl CartInfo {
    /// Save file path derived from the cart code
    pub fn save_path(&self) -> String {
        format!("{}/{}.sav", paths::SAVEFILES, self.code)
    }
}

/// A parsed cart waiting to be loaded into the core
pub(crate) struct InsertedCart {
    handle: Box<dyn CartHandle>,
    info: CartInfo,
}

fn core_for<'a>(
    inner: &'a mut SessionInner,
    operation: &'static str,
) -> std::result::Result<&'a mut Box<dyn EmulationCore>, SessionError> {
    let state = inner.state;
    inner
        .core
        .as_mut()
        .ok_or(SessionError::InvalidState { operation, state })
}

impl Session {
    /// Write a cart image into the virtual filesystem and parse it
    pub fn insert_cart(&self, rom: &[u8]) -> Result<CartInfo> {
        if !self.provider.is_ready() {
            return Err(SessionError::NotReady.into());
        }

        let vfs = self.storage.vfs();
        vfs.create_dir(paths::ROMS)?;
        vfs.write(paths::ROM_FILE, rom)?;

        let mut handle = self.provider.new_cart(std::sync::Arc::clone(vfs));
        if !handle.load_from_file(paths::ROM_FILE) {
            return Err(SessionError::CartLoadFailed(paths::ROM_FILE.to_string()).into());
        }

        let info = CartInfo {
            title: handle.cart_name(),
            code: handle.cart_code(),
        };
        tracing::info!("Inserted cart {} ({})", info.title, info.code);
        self.inner.lock().cart = Some(InsertedCart {
            handle,
            info: info.clone(),
        });
        Ok(info)
    }

    /// Read a cart image from the host and insert it
    pub fn insert_cart_file(&self, path: &Path) -> Result<CartInfo> {
        let rom = std::fs::read(path)?;
        tracing::info!("Read {} bytes from {:?}", rom.len(), path);
        self.insert_cart(&rom)
    }

    /// Info of the inserted cart that has not been loaded yet
    pub fn cart_info(&self) -> Option<CartInfo> {
        self.inner.lock().cart.as_ref().map(|cart| cart.info.clone())
    }

    pub fn cart_name(&self) -> Option<String> {
        self.cart_info().map(|info| info.title)
    }

    pub fn cart_code(&self) -> Option<String> {
        self.cart_info().map(|info| info.code)
    }

    /// Hand the inserted cart to the core
    pub fn load_cart(&self) -> Result<CartInfo> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.state.require("load cart", &[SessionState::Created])?;

        let cart = inner.cart.take().ok_or(SessionError::NoCart)?;
        let core = core_for(inner, "load cart")?;
        if !core.load_rom(cart.handle, false) {
            return Err(SessionError::RomRejected.into());
        }
        tracing::info!("Loaded cart {}", cart.info.title);
        Ok(cart.info)
    }

    /// Insert, load and point saves at `/savefiles/<code>.sav`
    pub fn boot_cart(&self, rom: &[u8]) -> Result<CartInfo> {
        self.state().require("boot cart", &[SessionState::Created])?;
        self.insert_cart(rom)?;
        let info = self.load_cart()?;
        self.set_save_path(&info.save_path())?;
        Ok(info)
    }

    /// Boot with the built-in BIOS replacement, skipping the firmware menu
    pub fn load_free_bios(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.state.require("load BIOS", &[SessionState::Created])?;

        inner.firmware.should_firmware_boot = false;
        let Some(core) = inner.core.as_mut() else {
            return Err(SessionError::InvalidState {
                operation: "load BIOS",
                state: inner.state,
            }
            .into());
        };
        core.set_firmware_settings(&inner.firmware, None);
        core.load_free_bios();
        Ok(())
    }

    /// Boot with the uploaded BIOS and firmware images
    pub fn load_user_bios(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.state.require("load BIOS", &[SessionState::Created])?;

        inner.firmware.should_firmware_boot = true;
        let firmware_file = BiosFile::Firmware.path();
        let Some(core) = inner.core.as_mut() else {
            return Err(SessionError::InvalidState {
                operation: "load BIOS",
                state: inner.state,
            }
            .into());
        };
        core.set_firmware_settings(&inner.firmware, Some(&firmware_file));
        core.load_user_bios();
        Ok(())
    }

    pub fn set_save_path(&self, path: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        let core = core_for(&mut inner, "set save path")?;
        core.set_save_path(path);
        tracing::debug!("Save path set to {}", path);
        Ok(())
    }

    /// Title of the loaded game; `None` without a core
    pub fn game_title(&self) -> Option<String> {
        self.inner
            .lock()
            .core
            .as_ref()
            .and_then(|core| core.game_title())
    }
}
