//! Session state controller
//!
//! This module provides the [`Session`], which ties together:
//! - the emulation core handle and its lifecycle
//! - the frame schedule and speed control
//! - input arbitration (keyboard, controller, touch)
//! - the audio bridge and its output
//! - storage sync after save writes
//!
//! The host drives a session by calling [`Session::pump`] from one loop.
//! Every command takes `&self`; state lives behind a mutex that is never
//! held while subscribers run, so callbacks may call back into the session.

use crate::emulator::{CoreProvider, CoreSignals, EmulationCore, Screen, SCREEN_PIXELS};
use crate::sinks::FrameSink;
use dsa_audio::{AudioBridge, AudioOutput, OutputFactory};
use dsa_core::config::{Config, InputSettings};
use dsa_core::error::{CoreError, SessionError};
use dsa_core::events::{Channel, EventHub};
use dsa_core::firmware::FirmwareSettings;
use dsa_core::lifecycle::SessionState;
use dsa_core::scheduler::{FrameScheduler, FrameSpeed};
use dsa_core::Result;
use dsa_input::{GamepadSource, InputArbiter, NoGamepad, TouchPoint, TouchTracker};
use dsa_vfs::StorageManager;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Session statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames advanced
    pub frames: u64,
    /// Ticks skipped because one was already running
    pub skipped_ticks: u64,
    /// Output buffer faults swallowed during ticks
    pub faults: u64,
    /// Audio pairs dropped by the bridge
    pub dropped_samples: u64,
    /// Storage flushes completed
    pub flushes: u64,
}

/// Top and bottom screen outputs
pub(crate) struct ScreenSinks {
    top: Box<dyn FrameSink>,
    bottom: Box<dyn FrameSink>,
}

impl ScreenSinks {
    fn get(&mut self, screen: Screen) -> &mut dyn FrameSink {
        match screen {
            Screen::Top => self.top.as_mut(),
            Screen::Bottom => self.bottom.as_mut(),
        }
    }
}

/// State guarded by the session mutex
pub(crate) struct SessionInner {
    pub(crate) state: SessionState,
    pub(crate) core: Option<Box<dyn EmulationCore>>,
    pub(crate) scheduler: FrameScheduler,
    pub(crate) audio: Box<dyn AudioOutput>,
    pub(crate) sinks: Option<ScreenSinks>,
    pub(crate) arbiter: InputArbiter,
    pub(crate) gamepad: Box<dyn GamepadSource>,
    pub(crate) input_attached: bool,
    pub(crate) touch: TouchTracker,
    pub(crate) input_settings: InputSettings,
    pub(crate) firmware: FirmwareSettings,
    pub(crate) cart: Option<crate::loader::InsertedCart>,
}

/// Clears the tick flag when a tick ends, however it ends
struct TickGuard<'a>(&'a AtomicBool);

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// An emulation session
pub struct Session {
    pub(crate) provider: Arc<dyn CoreProvider>,
    pub(crate) storage: Arc<StorageManager>,
    hub: Arc<EventHub>,
    bridge: Arc<AudioBridge>,
    output_factory: OutputFactory,
    signals: Arc<CoreSignals>,
    pub(crate) inner: Mutex<SessionInner>,
    /// Set while a tick runs
    ticking: AtomicBool,
    frames: AtomicU64,
    skipped_ticks: AtomicU64,
    faults: AtomicU64,
}

impl Session {
    /// Create a session with no core
    pub fn new(
        provider: Arc<dyn CoreProvider>,
        storage: Arc<StorageManager>,
        hub: Arc<EventHub>,
        output_factory: OutputFactory,
        bridge_capacity: usize,
    ) -> Self {
        let audio = output_factory();
        tracing::info!("Session using {} audio output", audio.name());

        Self {
            provider,
            storage,
            hub,
            bridge: Arc::new(AudioBridge::new(bridge_capacity)),
            output_factory,
            signals: Arc::new(CoreSignals::new()),
            inner: Mutex::new(SessionInner {
                state: SessionState::Uninitialized,
                core: None,
                scheduler: FrameScheduler::new(),
                audio,
                sinks: None,
                arbiter: InputArbiter::default(),
                gamepad: Box::new(NoGamepad),
                input_attached: false,
                touch: TouchTracker::default(),
                input_settings: InputSettings::default(),
                firmware: FirmwareSettings::default(),
                cart: None,
            }),
            ticking: AtomicBool::new(false),
            frames: AtomicU64::new(0),
            skipped_ticks: AtomicU64::new(0),
            faults: AtomicU64::new(0),
        }
    }

    /// Create a session from the configuration file settings
    pub fn from_config(
        config: &Config,
        provider: Arc<dyn CoreProvider>,
        storage: Arc<StorageManager>,
        hub: Arc<EventHub>,
    ) -> Result<Self> {
        let session = Self::new(
            provider,
            storage,
            hub,
            dsa_audio::output_factory(&config.audio),
            config.audio.ring_capacity,
        );
        session.set_input_settings(config.input.clone())?;
        session.set_firmware_settings(config.firmware.clone())?;
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn speed(&self) -> FrameSpeed {
        self.inner.lock().scheduler.speed()
    }

    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }

    pub fn storage(&self) -> &Arc<StorageManager> {
        &self.storage
    }

    pub fn bridge(&self) -> &Arc<AudioBridge> {
        &self.bridge
    }

    /// Signals the core raises; handed to every core this session creates
    pub fn signals(&self) -> &Arc<CoreSignals> {
        &self.signals
    }

    /// Name of the current audio output
    pub fn audio_output_name(&self) -> String {
        self.inner.lock().audio.name().to_string()
    }

    /// Subscribe to a hub channel
    pub fn subscribe<F>(&self, channel: Channel, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hub.subscribe(channel, callback);
    }

    /// Run `callback` once the core provider is ready
    pub fn on_core_ready<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        if self.provider.is_ready() {
            callback();
        } else {
            self.hub.subscribe(Channel::WasmReady, callback);
        }
    }

    /// Tell subscribers the core provider finished loading
    pub fn announce_core_ready(&self) {
        tracing::info!("Emulation core ready");
        self.hub.publish(Channel::WasmReady);
    }

    pub fn set_gamepad(&self, gamepad: Box<dyn GamepadSource>) {
        self.inner.lock().gamepad = gamepad;
    }

    pub fn input_settings(&self) -> InputSettings {
        self.inner.lock().input_settings.clone()
    }

    /// Replace input settings; takes effect on the next event or tick
    pub fn set_input_settings(&self, settings: InputSettings) -> Result<()> {
        settings.validate()?;
        let mut inner = self.inner.lock();
        inner.arbiter.apply_settings(&settings);
        inner.input_settings = settings;
        Ok(())
    }

    pub fn firmware_settings(&self) -> FirmwareSettings {
        self.inner.lock().firmware.clone()
    }

    /// Replace firmware settings; applied to the core when a BIOS is loaded
    pub fn set_firmware_settings(&self, settings: FirmwareSettings) -> Result<()> {
        settings.validate()?;
        self.inner.lock().firmware = settings;
        Ok(())
    }

    /// Create the core
    ///
    /// A second call while a core exists logs a warning and does nothing.
    pub fn create(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state.is_alive() {
            tracing::warn!("Emulator already exists ({}), ignoring create", inner.state);
            return Ok(());
        }
        if !self.provider.is_ready() {
            return Err(SessionError::NotReady.into());
        }

        self.signals.reset();
        inner.core = Some(
            self.provider
                .new_emulator(Arc::clone(self.storage.vfs()), Arc::clone(&self.signals)),
        );
        inner.state = SessionState::Created;
        tracing::info!("Emulator created");
        Ok(())
    }

    /// Bind the screens, attach input, boot the core and arm the frame schedule
    pub fn start(&self, top: Box<dyn FrameSink>, bottom: Box<dyn FrameSink>) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.state.require("start", &[SessionState::Created])?;

        inner.sinks = Some(ScreenSinks { top, bottom });
        inner.input_attached = true;

        let direct_boot = !inner.firmware.should_firmware_boot;
        if let Some(core) = inner.core.as_mut() {
            core.initialize(direct_boot);
        }

        if let Err(e) = inner.audio.start(Arc::clone(&self.bridge)) {
            tracing::error!("Failed to start audio output: {}", e);
        }

        inner.scheduler.start(Instant::now());
        inner.state = SessionState::Running;
        tracing::info!(
            "Session started ({} boot)",
            if direct_boot { "direct" } else { "firmware" }
        );
        Ok(())
    }

    /// Stop ticking and suspend audio; pausing a paused session does nothing
    pub fn pause(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let state = inner.state;
        match state {
            SessionState::Paused => Ok(()),
            SessionState::Running => {
                if let Err(e) = inner.audio.suspend() {
                    tracing::error!("Failed to suspend audio output: {}", e);
                }
                inner.scheduler.cancel();
                inner.state = SessionState::Paused;
                tracing::info!("Session paused");
                Ok(())
            }
            state => Err(SessionError::InvalidState {
                operation: "pause",
                state,
            }
            .into()),
        }
    }

    /// Resume audio and re-arm the schedule at the current speed
    pub fn resume(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.state.require("resume", &[SessionState::Paused])?;

        if let Err(e) = inner.audio.resume() {
            tracing::error!("Failed to resume audio output: {}", e);
        }
        inner.scheduler.start(Instant::now());
        inner.state = SessionState::Running;
        tracing::info!("Session resumed");
        Ok(())
    }

    /// Change the frame speed multiplier
    ///
    /// While paused the speed is only stored and used on resume.
    pub fn set_speed(&self, multiplier: f64) -> Result<()> {
        let speed = FrameSpeed::new(multiplier).ok_or(SessionError::InvalidSpeed(multiplier))?;
        let mut inner = self.inner.lock();
        inner
            .state
            .require("set speed", &[SessionState::Running, SessionState::Paused])?;
        inner.scheduler.set_speed(speed, Instant::now());
        tracing::info!("Emulator speed set to {}", speed);
        Ok(())
    }

    /// Tear the session down
    ///
    /// Does nothing when no core exists or a shutdown is already running.
    pub fn shutdown(&self) -> Result<()> {
        {
            let mut inner = self.inner.lock();
            let state = inner.state;
            match state {
                SessionState::Uninitialized => return Ok(()),
                SessionState::ShuttingDown => {
                    tracing::debug!("Shutdown already in progress");
                    return Ok(());
                }
                _ => inner.state = SessionState::ShuttingDown,
            }
        }
        tracing::info!("Shutting down session");

        let previous = self.hub.reset();
        let notified = previous.notify(Channel::Shutdown);
        tracing::debug!("Notified {} shutdown subscribers", notified);

        let mut inner = self.inner.lock();
        inner.scheduler.cancel();

        inner.audio.close();
        inner.audio = (self.output_factory)();

        inner.scheduler.reset();
        self.bridge.reset();
        inner.core = None;

        inner.sinks = None;
        inner.input_attached = false;
        inner.touch.release();
        inner.arbiter.reset();
        inner.cart = None;
        self.signals.reset();
        inner.state = SessionState::Uninitialized;
        tracing::info!("Session shut down");
        Ok(())
    }

    /// Advance the schedule to `now`: run at most one due tick, then let
    /// storage flush if its debounce expired. Returns whether a tick ran.
    pub fn pump(&self, now: Instant) -> bool {
        let due = self.inner.lock().scheduler.poll(now);
        let ran = due && self.run_tick(now);

        if let Err(e) = self.storage.poll(now) {
            tracing::error!("Save sync failed: {}", e);
        }
        ran
    }

    /// Time until the next tick is due, if the schedule is armed
    pub fn time_until_next_tick(&self, now: Instant) -> Option<Duration> {
        self.inner.lock().scheduler.time_until_next(now)
    }

    /// Run one frame
    ///
    /// Skipped (never queued) when another tick is still running or the
    /// session is not running. Returns whether a frame ran.
    pub fn run_tick(&self, now: Instant) -> bool {
        if self.ticking.swap(true, Ordering::AcqRel) {
            self.skipped_ticks.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("Tick already running, skipping");
            return false;
        }
        let _guard = TickGuard(&self.ticking);

        {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            if inner.state != SessionState::Running {
                return false;
            }
            let Some(core) = inner.core.as_mut() else {
                return false;
            };

            let polled = inner.gamepad.poll();
            inner.arbiter.poll_gamepad(polled.as_ref());
            let mask = inner.arbiter.mask();

            self.signals.clear_rumble();
            core.set_input(mask);
            core.advance_frame(false);

            if let Some(sinks) = inner.sinks.as_mut() {
                for screen in [Screen::Top, Screen::Bottom] {
                    if let Err(e) = copy_screen(&**core, screen, sinks.get(screen)) {
                        tracing::error!("Failed to copy {} screen: {}", screen, e);
                        self.faults.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }

            if let Err(e) = self.drain_audio(&**core) {
                tracing::error!("Failed to copy audio: {}", e);
                self.faults.fetch_add(1, Ordering::Relaxed);
            }

            let rumbled = self.signals.rumble_active();
            if let Some(effect) = inner.arbiter.rumble(rumbled, FrameSpeed::BASE.period()) {
                inner.gamepad.play_rumble(effect);
            }

            self.frames.fetch_add(1, Ordering::Relaxed);
        }

        self.hub.publish(Channel::FrameUpdate);

        if self.signals.take_save_written() {
            self.storage.notify_write_occurred(now);
        }
        if self.signals.take_stop_requested() {
            tracing::info!("Core requested stop");
            if let Err(e) = self.shutdown() {
                tracing::error!("Shutdown failed: {}", e);
            }
        }
        true
    }

    fn drain_audio(&self, core: &dyn EmulationCore) -> std::result::Result<(), CoreError> {
        let pairs = core.audio_sample_count();
        if pairs == 0 {
            return Ok(());
        }
        let buffer = core.audio_buffer()?;
        let len = (pairs * 2).min(buffer.len());
        let accepted = self.bridge.push(&buffer[..len]);
        if accepted < len / 2 {
            tracing::trace!("Audio bridge full, dropped {} pairs", len / 2 - accepted);
        }
        Ok(())
    }

    /// Forward a key press to the arbiter; returns false if the key is unbound
    /// or input is not attached
    pub fn key_down(&self, key: &str) -> bool {
        let mut inner = self.inner.lock();
        inner.input_attached && inner.arbiter.key_down(key)
    }

    /// Forward a key release to the arbiter
    pub fn key_up(&self, key: &str) -> bool {
        let mut inner = self.inner.lock();
        inner.input_attached && inner.arbiter.key_up(key)
    }

    /// Press the touch screen
    pub fn touch(&self, point: TouchPoint) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if !inner.input_attached {
            return;
        }
        if let Some(core) = inner.core.as_mut() {
            core.touch_screen(inner.touch.press(point));
        }
    }

    /// Move a pressed touch; ignored when not pressed
    pub fn drag_touch(&self, point: TouchPoint) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if !inner.input_attached {
            return;
        }
        if let (Some(point), Some(core)) = (inner.touch.drag(point), inner.core.as_mut()) {
            core.touch_screen(point);
        }
    }

    pub fn release_touch(&self) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if !inner.input_attached {
            return;
        }
        inner.touch.release();
        if let Some(core) = inner.core.as_mut() {
            core.release_screen();
        }
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            frames: self.frames.load(Ordering::Relaxed),
            skipped_ticks: self.skipped_ticks.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
            dropped_samples: self.bridge.stats().dropped,
            flushes: self.storage.stats().flushes,
        }
    }
}

fn copy_screen(
    core: &dyn EmulationCore,
    screen: Screen,
    sink: &mut dyn FrameSink,
) -> std::result::Result<(), CoreError> {
    let pixels = core.screen_buffer(screen)?;
    if pixels.len() != SCREEN_PIXELS {
        return Err(CoreError::BufferSize {
            name: "screen",
            expected: SCREEN_PIXELS,
            actual: pixels.len(),
        });
    }
    sink.put_pixels(pixels);
    Ok(())
}
