//! Emulation core capability
//!
//! The CPU, GPU and DSP live behind these traits. The session only ever
//! talks to a core through [`EmulationCore`], creates it through a
//! [`CoreProvider`], and hears back from it through [`CoreSignals`].

use dsa_core::error::CoreError;
use dsa_core::firmware::FirmwareSettings;
use dsa_input::{ButtonMask, TouchPoint};
use dsa_vfs::VirtualFileSystem;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Screen width in pixels
pub const SCREEN_WIDTH: usize = 256;
/// Screen height in pixels
pub const SCREEN_HEIGHT: usize = 192;
/// Pixels per screen buffer
pub const SCREEN_PIXELS: usize = SCREEN_WIDTH * SCREEN_HEIGHT;

/// Interleaved stereo samples the core audio buffer holds
pub const CORE_AUDIO_BUFFER_LEN: usize = 4096 * 2;

/// One of the two screens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    Top,
    Bottom,
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Screen::Top => write!(f, "top"),
            Screen::Bottom => write!(f, "bottom"),
        }
    }
}

/// A cartridge image read from the virtual filesystem
pub trait CartHandle: Send {
    /// Read and parse the image at `path`
    fn load_from_file(&mut self, path: &str) -> bool;

    /// Banner title, or a placeholder when nothing is loaded
    fn cart_name(&self) -> String;

    /// Four character game code, or a placeholder when nothing is loaded
    fn cart_code(&self) -> String;
}

/// A live emulator instance
pub trait EmulationCore: Send {
    /// Apply firmware settings; `firmware_file` selects a user firmware image
    fn set_firmware_settings(&mut self, settings: &FirmwareSettings, firmware_file: Option<&str>);

    fn load_free_bios(&mut self);

    fn load_user_bios(&mut self);

    /// Insert a cart; returns false when the core rejects it
    fn load_rom(&mut self, cart: Box<dyn CartHandle>, reset: bool) -> bool;

    fn initialize(&mut self, direct_boot: bool);

    fn set_input(&mut self, mask: ButtonMask);

    fn touch_screen(&mut self, point: TouchPoint);

    fn release_screen(&mut self);

    /// Run one frame; ghost frames skip presenting
    fn advance_frame(&mut self, ghost: bool);

    /// Pixels of the last frame, [`SCREEN_PIXELS`] long
    fn screen_buffer(&self, screen: Screen) -> Result<&[u32], CoreError>;

    /// Stereo pairs produced by the last frame
    fn audio_sample_count(&self) -> usize;

    /// Interleaved samples of the last frame
    fn audio_buffer(&self) -> Result<&[i16], CoreError>;

    fn set_save_path(&mut self, path: &str);

    /// Title of the running cart
    fn game_title(&self) -> Option<String>;
}

/// Factory for cores and carts
pub trait CoreProvider: Send + Sync {
    /// Whether the core module has finished loading
    fn is_ready(&self) -> bool;

    fn new_emulator(
        &self,
        vfs: Arc<VirtualFileSystem>,
        signals: Arc<CoreSignals>,
    ) -> Box<dyn EmulationCore>;

    fn new_cart(&self, vfs: Arc<VirtualFileSystem>) -> Box<dyn CartHandle>;
}

/// Flags the core raises for the session
///
/// Set from inside the core during a frame and consumed by the session
/// once the frame is done.
#[derive(Debug, Default)]
pub struct CoreSignals {
    rumble: AtomicBool,
    save_written: AtomicBool,
    stop_requested: AtomicBool,
}

impl CoreSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rumble_start(&self) {
        self.rumble.store(true, Ordering::Release);
    }

    pub fn rumble_stop(&self) {
        self.rumble.store(false, Ordering::Release);
    }

    /// Clear the rumble flag before a frame
    pub fn clear_rumble(&self) {
        self.rumble.store(false, Ordering::Release);
    }

    pub fn rumble_active(&self) -> bool {
        self.rumble.load(Ordering::Acquire)
    }

    /// The core wrote to a save file
    pub fn notify_save_written(&self) {
        self.save_written.store(true, Ordering::Release);
    }

    pub fn take_save_written(&self) -> bool {
        self.save_written.swap(false, Ordering::AcqRel)
    }

    /// The emulated console asked to power off
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    pub fn take_stop_requested(&self) -> bool {
        self.stop_requested.swap(false, Ordering::AcqRel)
    }

    pub fn reset(&self) {
        self.rumble.store(false, Ordering::Release);
        self.save_written.store(false, Ordering::Release);
        self.stop_requested.store(false, Ordering::Release);
    }
}
