//! Null core
//!
//! Stands in for a real emulation core so the session can run headless. It
//! parses the cart header for title and code, draws a moving test pattern,
//! produces silence, and writes a blank save file the first time it runs
//! with a save path.

use crate::emulator::{
    CartHandle, CoreProvider, CoreSignals, EmulationCore, Screen, CORE_AUDIO_BUFFER_LEN,
    SCREEN_HEIGHT, SCREEN_PIXELS, SCREEN_WIDTH,
};
use dsa_audio::CORE_SAMPLE_RATE;
use dsa_core::error::CoreError;
use dsa_core::firmware::FirmwareSettings;
use dsa_input::{ButtonMask, TouchPoint};
use dsa_vfs::VirtualFileSystem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Size of the cart header
pub const HEADER_LEN: usize = 0x200;
/// Largest image accepted
pub const MAX_ROM_LEN: usize = 0x4000_0000;
/// Size of the blank save the null core creates
pub const BLANK_SAVE_LEN: usize = 0x200;

const TITLE_RANGE: std::ops::Range<usize> = 0x00..0x0C;
const CODE_RANGE: std::ops::Range<usize> = 0x0C..0x10;

/// Stereo pairs per 60 Hz frame
const SAMPLES_PER_FRAME: usize = CORE_SAMPLE_RATE as usize / 60;

fn header_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(|c: char| c == '\0' || c == ' ')
        .to_string()
}

/// Cart backed by an image in the virtual filesystem
pub struct NullCart {
    vfs: Arc<VirtualFileSystem>,
    header: Option<Vec<u8>>,
}

impl NullCart {
    pub fn new(vfs: Arc<VirtualFileSystem>) -> Self {
        Self { vfs, header: None }
    }
}

impl CartHandle for NullCart {
    fn load_from_file(&mut self, path: &str) -> bool {
        let data = match self.vfs.read(path) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("Failed to load ROM: {}", e);
                return false;
            }
        };
        if data.len() > MAX_ROM_LEN {
            tracing::error!("Failed to load ROM: {} exceeds maximum size", path);
            return false;
        }
        if data.len() < HEADER_LEN {
            tracing::error!("Failed to load ROM: {} bytes is too short for a header", data.len());
            return false;
        }
        self.header = Some(data[..HEADER_LEN].to_vec());
        tracing::info!("Cart loaded from {}", path);
        true
    }

    fn cart_name(&self) -> String {
        match &self.header {
            Some(header) => header_text(&header[TITLE_RANGE]),
            None => "Empty".to_string(),
        }
    }

    fn cart_code(&self) -> String {
        match &self.header {
            Some(header) => header_text(&header[CODE_RANGE]),
            None => "NULL".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BiosSource {
    None,
    Free,
    User,
}

/// Test pattern core
pub struct NullCore {
    vfs: Arc<VirtualFileSystem>,
    signals: Arc<CoreSignals>,
    firmware: FirmwareSettings,
    firmware_file: Option<String>,
    bios: BiosSource,
    title: Option<String>,
    initialized: bool,
    input: ButtonMask,
    touch: Option<TouchPoint>,
    frame: u64,
    top: Vec<u32>,
    bottom: Vec<u32>,
    audio: Vec<i16>,
    produced: usize,
    save_path: Option<String>,
    save_created: bool,
}

impl NullCore {
    pub fn new(vfs: Arc<VirtualFileSystem>, signals: Arc<CoreSignals>) -> Self {
        Self {
            vfs,
            signals,
            firmware: FirmwareSettings::default(),
            firmware_file: None,
            bios: BiosSource::None,
            title: None,
            initialized: false,
            input: ButtonMask::empty(),
            touch: None,
            frame: 0,
            top: vec![0; SCREEN_PIXELS],
            bottom: vec![0; SCREEN_PIXELS],
            audio: vec![0; CORE_AUDIO_BUFFER_LEN],
            produced: 0,
            save_path: None,
            save_created: false,
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    pub fn firmware(&self) -> &FirmwareSettings {
        &self.firmware
    }

    fn draw(&mut self) {
        let shift = self.frame as u32;
        for y in 0..SCREEN_HEIGHT {
            for x in 0..SCREEN_WIDTH {
                let r = (x as u32).wrapping_add(shift) & 0xFF;
                let g = (y as u32) & 0xFF;
                let b = u32::from(self.input.bits() as u8);
                self.top[y * SCREEN_WIDTH + x] = 0xFF00_0000 | (b << 16) | (g << 8) | r;
            }
        }

        self.bottom.fill(0xFF20_2020);
        if let Some(point) = self.touch {
            let x = usize::from(point.x).min(SCREEN_WIDTH - 1);
            let y = usize::from(point.y).min(SCREEN_HEIGHT - 1);
            self.bottom[y * SCREEN_WIDTH + x] = 0xFFFF_FFFF;
        }
    }

    fn create_blank_save(&mut self) {
        let Some(path) = self.save_path.as_deref() else {
            return;
        };
        if self.save_created || self.vfs.exists(path) {
            self.save_created = true;
            return;
        }
        match self.vfs.write(path, &[0xFF; BLANK_SAVE_LEN]) {
            Ok(()) => {
                tracing::debug!("Created blank save {}", path);
                self.signals.notify_save_written();
            }
            Err(e) => tracing::warn!("Failed to create save {}: {}", path, e),
        }
        self.save_created = true;
    }
}

impl EmulationCore for NullCore {
    fn set_firmware_settings(&mut self, settings: &FirmwareSettings, firmware_file: Option<&str>) {
        self.firmware = settings.clone();
        self.firmware_file = firmware_file.map(str::to_string);
    }

    fn load_free_bios(&mut self) {
        self.bios = BiosSource::Free;
        tracing::info!("Using free BIOS");
    }

    fn load_user_bios(&mut self) {
        if let Some(file) = &self.firmware_file {
            if !self.vfs.exists(file) {
                tracing::warn!("Firmware image {} is missing", file);
            }
        }
        self.bios = BiosSource::User;
        tracing::info!("Using user BIOS");
    }

    fn load_rom(&mut self, cart: Box<dyn CartHandle>, reset: bool) -> bool {
        if cart.cart_code() == "NULL" {
            return false;
        }
        self.title = Some(cart.cart_name());
        if reset {
            self.frame = 0;
        }
        true
    }

    fn initialize(&mut self, direct_boot: bool) {
        if self.bios == BiosSource::None {
            tracing::warn!("Initializing without a BIOS, using free BIOS");
            self.bios = BiosSource::Free;
        }
        self.initialized = true;
        tracing::info!(
            "Null core initialized ({} boot)",
            if direct_boot { "direct" } else { "firmware" }
        );
    }

    fn set_input(&mut self, mask: ButtonMask) {
        self.input = mask;
    }

    fn touch_screen(&mut self, point: TouchPoint) {
        self.touch = Some(point);
    }

    fn release_screen(&mut self) {
        self.touch = None;
    }

    fn advance_frame(&mut self, ghost: bool) {
        if !self.initialized {
            self.produced = 0;
            return;
        }
        self.frame += 1;
        if !ghost {
            self.draw();
        }
        self.produced = SAMPLES_PER_FRAME;
        self.create_blank_save();
    }

    fn screen_buffer(&self, screen: Screen) -> Result<&[u32], CoreError> {
        Ok(match screen {
            Screen::Top => &self.top,
            Screen::Bottom => &self.bottom,
        })
    }

    fn audio_sample_count(&self) -> usize {
        self.produced
    }

    fn audio_buffer(&self) -> Result<&[i16], CoreError> {
        Ok(&self.audio)
    }

    fn set_save_path(&mut self, path: &str) {
        self.save_path = Some(path.to_string());
        self.save_created = false;
    }

    fn game_title(&self) -> Option<String> {
        self.title.clone()
    }
}

/// Provider handing out null cores
#[derive(Debug)]
pub struct NullCoreProvider {
    ready: AtomicBool,
}

impl NullCoreProvider {
    /// Provider that is ready immediately
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(true),
        }
    }

    /// Provider that reports not ready until `mark_ready`
    pub fn pending() -> Self {
        Self {
            ready: AtomicBool::new(false),
        }
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }
}

impl Default for NullCoreProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreProvider for NullCoreProvider {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn new_emulator(
        &self,
        vfs: Arc<VirtualFileSystem>,
        signals: Arc<CoreSignals>,
    ) -> Box<dyn EmulationCore> {
        Box::new(NullCore::new(vfs, signals))
    }

    fn new_cart(&self, vfs: Arc<VirtualFileSystem>) -> Box<dyn CartHandle> {
        Box::new(NullCart::new(vfs))
    }
}

/// Build a minimal cart image with the given title and code
pub fn build_rom(title: &str, code: &str) -> Vec<u8> {
    let mut rom = vec![0u8; HEADER_LEN];
    for (dst, src) in rom[TITLE_RANGE].iter_mut().zip(title.bytes()) {
        *dst = src;
    }
    for (dst, src) in rom[CODE_RANGE].iter_mut().zip(code.bytes()) {
        *dst = src;
    }
    rom
}
