//! Session lifecycle tests against a scripted core

use dsa_audio::{AudioBridge, AudioOutput, OutputState};
use dsa_core::config::InputSettings;
use dsa_core::error::{AudioError, CoreError, SessionError};
use dsa_core::events::{Channel, EventHub};
use dsa_core::firmware::FirmwareSettings;
use dsa_core::lifecycle::SessionState;
use dsa_core::scheduler::FrameSpeed;
use dsa_core::EmulatorError;
use dsa_input::{ButtonMask, GamepadSource, GamepadState, RumbleEffect, TouchPoint};
use dsa_session::emulator::SCREEN_PIXELS;
use dsa_session::{
    CaptureSink, CartHandle, CoreProvider, CoreSignals, EmulationCore, NullSink, Screen, Session,
};
use dsa_vfs::{MemoryStore, StorageManager, VirtualFileSystem};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

type Log = Arc<Mutex<Vec<String>>>;

#[derive(Clone, Default)]
struct Script {
    /// Frames (1-based) on which the core reports a save write
    save_frames: Vec<u64>,
    /// Frame on which the core asks to power off
    stop_frame: Option<u64>,
    /// Raise rumble on every frame
    rumble: bool,
    /// Fail fetching the bottom screen
    broken_bottom: bool,
}

struct ScriptedCore {
    log: Log,
    signals: Arc<CoreSignals>,
    script: Script,
    frame: u64,
    pixels: Vec<u32>,
    audio: Vec<i16>,
}

impl Drop for ScriptedCore {
    fn drop(&mut self) {
        self.log.lock().push("drop".to_string());
    }
}

impl EmulationCore for ScriptedCore {
    fn set_firmware_settings(&mut self, settings: &FirmwareSettings, firmware_file: Option<&str>) {
        self.log.lock().push(format!(
            "firmware boot={} file={:?}",
            settings.should_firmware_boot, firmware_file
        ));
    }

    fn load_free_bios(&mut self) {
        self.log.lock().push("free bios".to_string());
    }

    fn load_user_bios(&mut self) {
        self.log.lock().push("user bios".to_string());
    }

    fn load_rom(&mut self, _cart: Box<dyn CartHandle>, _reset: bool) -> bool {
        true
    }

    fn initialize(&mut self, direct_boot: bool) {
        self.log.lock().push(format!("initialize direct={}", direct_boot));
    }

    fn set_input(&mut self, mask: ButtonMask) {
        self.log.lock().push(format!("input {:#x}", mask.bits()));
    }

    fn touch_screen(&mut self, point: TouchPoint) {
        self.log.lock().push(format!("touch {},{}", point.x, point.y));
    }

    fn release_screen(&mut self) {
        self.log.lock().push("release".to_string());
    }

    fn advance_frame(&mut self, _ghost: bool) {
        self.frame += 1;
        if self.script.save_frames.contains(&self.frame) {
            self.signals.notify_save_written();
        }
        if self.script.stop_frame == Some(self.frame) {
            self.signals.request_stop();
        }
        if self.script.rumble {
            self.signals.rumble_start();
        }
        self.pixels.fill(self.frame as u32);
    }

    fn screen_buffer(&self, screen: Screen) -> Result<&[u32], CoreError> {
        if screen == Screen::Bottom && self.script.broken_bottom {
            return Err(CoreError::BufferUnavailable("bottom screen"));
        }
        Ok(&self.pixels)
    }

    fn audio_sample_count(&self) -> usize {
        100
    }

    fn audio_buffer(&self) -> Result<&[i16], CoreError> {
        Ok(&self.audio)
    }

    fn set_save_path(&mut self, path: &str) {
        self.log.lock().push(format!("save path {}", path));
    }

    fn game_title(&self) -> Option<String> {
        None
    }
}

struct ScriptedProvider {
    ready: std::sync::atomic::AtomicBool,
    created: AtomicUsize,
    log: Log,
    script: Script,
}

impl CoreProvider for ScriptedProvider {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn new_emulator(
        &self,
        _vfs: Arc<VirtualFileSystem>,
        signals: Arc<CoreSignals>,
    ) -> Box<dyn EmulationCore> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Box::new(ScriptedCore {
            log: Arc::clone(&self.log),
            signals,
            script: self.script.clone(),
            frame: 0,
            pixels: vec![0; SCREEN_PIXELS],
            audio: vec![7; 200],
        })
    }

    fn new_cart(&self, vfs: Arc<VirtualFileSystem>) -> Box<dyn CartHandle> {
        Box::new(dsa_session::NullCart::new(vfs))
    }
}

/// Audio output that records its calls in the shared log
struct LoggedOutput {
    log: Log,
    state: OutputState,
}

impl AudioOutput for LoggedOutput {
    fn start(&mut self, _bridge: Arc<AudioBridge>) -> Result<(), AudioError> {
        self.log.lock().push("audio start".to_string());
        self.state = OutputState::Running;
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        self.log.lock().push("audio suspend".to_string());
        self.state = OutputState::Suspended;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        self.log.lock().push("audio resume".to_string());
        self.state = OutputState::Running;
        Ok(())
    }

    fn close(&mut self) {
        self.log.lock().push("audio close".to_string());
        self.state = OutputState::Closed;
    }

    fn state(&self) -> OutputState {
        self.state
    }

    fn name(&self) -> &str {
        "logged"
    }
}

struct StickGamepad {
    rumbles: Arc<Mutex<Vec<RumbleEffect>>>,
}

impl GamepadSource for StickGamepad {
    fn poll(&mut self) -> Option<GamepadState> {
        Some(GamepadState {
            axes: vec![1.0, 0.0],
            buttons: vec![false; 16],
        })
    }

    fn play_rumble(&mut self, effect: RumbleEffect) {
        self.rumbles.lock().push(effect);
    }
}

struct Harness {
    session: Arc<Session>,
    provider: Arc<ScriptedProvider>,
    store: Arc<MemoryStore>,
    log: Log,
}

impl Harness {
    fn new(script: Script) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let log = Log::default();
        let hub = Arc::new(EventHub::new());
        let store = Arc::new(MemoryStore::new());
        let storage = Arc::new(StorageManager::new(
            Arc::new(VirtualFileSystem::new()),
            store.clone(),
            Arc::clone(&hub),
        ));
        let provider = Arc::new(ScriptedProvider {
            ready: std::sync::atomic::AtomicBool::new(true),
            created: AtomicUsize::new(0),
            log: Arc::clone(&log),
            script,
        });
        let factory_log = Arc::clone(&log);
        let session = Session::new(
            provider.clone(),
            storage,
            hub,
            Arc::new(move || -> Box<dyn AudioOutput> {
                Box::new(LoggedOutput {
                    log: Arc::clone(&factory_log),
                    state: OutputState::Idle,
                })
            }),
            128,
        );
        Self {
            session: Arc::new(session),
            provider,
            store,
            log,
        }
    }

    fn started(script: Script) -> Self {
        let harness = Self::new(script);
        harness.session.create().unwrap();
        harness
            .session
            .start(Box::new(NullSink::new()), Box::new(NullSink::new()))
            .unwrap();
        harness
    }

    fn count(&self, entry: &str) -> usize {
        self.log.lock().iter().filter(|e| e.as_str() == entry).count()
    }

    fn position(&self, entry: &str) -> Option<usize> {
        self.log.lock().iter().position(|e| e.as_str() == entry)
    }

    fn counter(&self, channel: Channel) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        self.session.subscribe(channel, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        });
        count
    }
}

fn invalid_state(result: dsa_core::Result<()>) -> bool {
    matches!(
        result,
        Err(EmulatorError::Session(SessionError::InvalidState { .. }))
    )
}

#[test]
fn test_create_twice_keeps_one_core() {
    let harness = Harness::new(Script::default());
    harness.session.create().unwrap();
    harness.session.create().unwrap();
    assert_eq!(harness.session.state(), SessionState::Created);
    assert_eq!(harness.provider.created.load(Ordering::SeqCst), 1);
}

#[test]
fn test_create_needs_ready_core() {
    let harness = Harness::new(Script::default());
    harness.provider.ready.store(false, Ordering::SeqCst);
    assert!(matches!(
        harness.session.create(),
        Err(EmulatorError::Session(SessionError::NotReady))
    ));
    assert_eq!(harness.session.state(), SessionState::Uninitialized);

    let ready = harness.counter(Channel::WasmReady);
    let session = Arc::downgrade(&harness.session);
    harness.session.on_core_ready(move || {
        if let Some(session) = session.upgrade() {
            session.create().unwrap();
        }
    });
    harness.provider.ready.store(true, Ordering::SeqCst);
    harness.session.announce_core_ready();

    assert_eq!(ready.load(Ordering::SeqCst), 1);
    assert_eq!(harness.session.state(), SessionState::Created);
}

#[test]
fn test_start_boots_core_and_audio() {
    let harness = Harness::started(Script::default());
    assert_eq!(harness.session.state(), SessionState::Running);
    assert_eq!(harness.count("initialize direct=true"), 1);
    assert_eq!(harness.count("audio start"), 1);
    assert!(harness.session.time_until_next_tick(Instant::now()).is_some());
}

#[test]
fn test_firmware_boot_disables_direct_boot() {
    let harness = Harness::new(Script::default());
    harness.session.create().unwrap();
    harness.session.load_user_bios().unwrap();
    harness
        .session
        .start(Box::new(NullSink::new()), Box::new(NullSink::new()))
        .unwrap();

    assert_eq!(
        harness.count("firmware boot=true file=Some(\"/firmware/firmware.bin\")"),
        1
    );
    assert_eq!(harness.count("initialize direct=false"), 1);
}

#[test]
fn test_out_of_order_calls() {
    let harness = Harness::new(Script::default());
    let session = &harness.session;

    assert!(invalid_state(session.pause()));
    assert!(invalid_state(session.resume()));
    assert!(invalid_state(session.set_speed(2.0)));
    assert!(invalid_state(
        session.start(Box::new(NullSink::new()), Box::new(NullSink::new()))
    ));

    session.create().unwrap();
    assert!(invalid_state(session.pause()));
    assert!(invalid_state(session.resume()));

    session
        .start(Box::new(NullSink::new()), Box::new(NullSink::new()))
        .unwrap();
    assert!(invalid_state(session.resume()));
    assert!(invalid_state(
        session.start(Box::new(NullSink::new()), Box::new(NullSink::new()))
    ));
    assert!(invalid_state(session.load_free_bios()));
}

#[test]
fn test_pause_is_idempotent() {
    let harness = Harness::started(Script::default());
    harness.session.pause().unwrap();
    harness.session.pause().unwrap();

    assert_eq!(harness.session.state(), SessionState::Paused);
    assert_eq!(harness.count("audio suspend"), 1);
    assert!(harness.session.time_until_next_tick(Instant::now()).is_none());
    assert!(!harness.session.pump(Instant::now() + Duration::from_secs(1)));
}

#[test]
fn test_set_speed_while_paused_applies_on_resume() {
    let harness = Harness::started(Script::default());
    harness.session.pause().unwrap();
    harness.session.set_speed(2.0).unwrap();

    assert_eq!(harness.session.state(), SessionState::Paused);
    assert_eq!(harness.session.speed().multiplier(), 2.0);
    assert!(harness.session.time_until_next_tick(Instant::now()).is_none());

    harness.session.resume().unwrap();
    let wait = harness.session.time_until_next_tick(Instant::now()).unwrap();
    assert!(wait <= FrameSpeed::new(2.0).unwrap().period());
    assert_eq!(harness.count("audio resume"), 1);
}

#[test]
fn test_set_speed_rejects_bad_multipliers() {
    let harness = Harness::started(Script::default());
    for bad in [0.0, -1.0, f64::NAN, f64::INFINITY, 1e-25] {
        assert!(matches!(
            harness.session.set_speed(bad),
            Err(EmulatorError::Session(SessionError::InvalidSpeed(_)))
        ));
    }
    assert_eq!(harness.session.speed(), FrameSpeed::BASE);
}

#[test]
fn test_shutdown_sequence() {
    let harness = Harness::started(Script::default());
    let session = &harness.session;
    session.set_speed(4.0).unwrap();
    assert!(session.run_tick(Instant::now()));
    assert!(!session.bridge().is_empty());

    let log = Arc::clone(&harness.log);
    let weak = Arc::downgrade(session);
    session.subscribe(Channel::Shutdown, move || {
        let state = weak.upgrade().map(|s| s.state());
        log.lock().push(format!("shutdown subscriber {:?}", state));
    });
    harness.counter(Channel::FrameUpdate);

    session.shutdown().unwrap();

    assert_eq!(session.state(), SessionState::Uninitialized);
    assert_eq!(session.speed(), FrameSpeed::BASE);
    assert!(session.bridge().is_empty());
    assert_eq!(session.bridge().available(), session.bridge().capacity());
    assert_eq!(session.hub().subscriber_count(Channel::Shutdown), 0);
    assert_eq!(session.hub().subscriber_count(Channel::FrameUpdate), 0);
    assert_eq!(session.audio_output_name(), "logged");
    assert!(session.time_until_next_tick(Instant::now()).is_none());

    let subscriber = harness
        .position("shutdown subscriber Some(ShuttingDown)")
        .unwrap();
    let close = harness.position("audio close").unwrap();
    let released = harness.position("drop").unwrap();
    assert!(subscriber < close);
    assert!(close < released);
}

#[test]
fn test_shutdown_when_uninitialized_is_noop() {
    let harness = Harness::new(Script::default());
    let shutdown = harness.counter(Channel::Shutdown);
    harness.session.shutdown().unwrap();
    assert_eq!(shutdown.load(Ordering::SeqCst), 0);
    assert_eq!(harness.session.hub().subscriber_count(Channel::Shutdown), 1);
}

#[test]
fn test_session_can_be_recreated_after_shutdown() {
    let harness = Harness::started(Script::default());
    harness.session.shutdown().unwrap();
    harness.session.create().unwrap();
    assert_eq!(harness.provider.created.load(Ordering::SeqCst), 2);
    assert!(!harness.session.key_down("a"));
}

#[test]
fn test_tick_sequence() {
    let harness = Harness::new(Script::default());
    harness.session.create().unwrap();
    let top = CaptureSink::new();
    harness
        .session
        .start(Box::new(top.clone()), Box::new(NullSink::new()))
        .unwrap();
    let frames = harness.counter(Channel::FrameUpdate);

    harness.session.key_down("l");
    assert!(harness.session.run_tick(Instant::now()));

    assert_eq!(harness.count("input 0x1"), 1);
    assert_eq!(top.latest(), vec![1; SCREEN_PIXELS]);
    assert_eq!(harness.session.bridge().len(), 100);
    assert_eq!(frames.load(Ordering::SeqCst), 1);
    assert_eq!(harness.session.stats().frames, 1);
}

#[test]
fn test_audio_bounded_by_bridge_capacity() {
    let harness = Harness::started(Script::default());
    harness.session.run_tick(Instant::now());
    harness.session.run_tick(Instant::now());

    let bridge = harness.session.bridge();
    assert_eq!(bridge.len(), bridge.capacity());
    assert_eq!(harness.session.stats().dropped_samples, 200 - 128);
}

#[test]
fn test_buffer_fault_is_swallowed() {
    let harness = Harness::started(Script {
        broken_bottom: true,
        ..Script::default()
    });
    let frames = harness.counter(Channel::FrameUpdate);

    assert!(harness.session.run_tick(Instant::now()));
    assert!(harness.session.run_tick(Instant::now()));
    assert_eq!(harness.session.stats().faults, 2);
    assert_eq!(frames.load(Ordering::SeqCst), 2);
}

#[test]
fn test_save_writes_coalesce_into_one_flush() {
    let harness = Harness::new(Script {
        save_frames: vec![1, 2, 3],
        ..Script::default()
    });
    harness.session.storage().prepare().unwrap();
    let initiated = harness.counter(Channel::SaveInitiate);
    let completed = harness.counter(Channel::SaveComplete);
    harness.session.create().unwrap();
    harness
        .session
        .start(Box::new(NullSink::new()), Box::new(NullSink::new()))
        .unwrap();

    let t0 = Instant::now();
    for ms in [20, 40, 60] {
        assert!(harness.session.pump(t0 + Duration::from_millis(ms)));
    }
    assert_eq!(initiated.load(Ordering::SeqCst), 3);
    assert!(harness.session.storage().is_saving());

    harness.session.pump(t0 + Duration::from_millis(519));
    assert_eq!(completed.load(Ordering::SeqCst), 0);

    harness.session.pump(t0 + Duration::from_millis(520));
    assert_eq!(completed.load(Ordering::SeqCst), 1);
    assert_eq!(harness.session.stats().flushes, 1);
    assert_eq!(harness.store.push_count(), 2);
    assert!(!harness.session.storage().is_saving());
}

#[test]
fn test_stop_request_shuts_down() {
    let harness = Harness::started(Script {
        stop_frame: Some(2),
        ..Script::default()
    });
    let shutdown = harness.counter(Channel::Shutdown);

    assert!(harness.session.run_tick(Instant::now()));
    assert_eq!(harness.session.state(), SessionState::Running);
    assert!(harness.session.run_tick(Instant::now()));
    assert_eq!(harness.session.state(), SessionState::Uninitialized);
    assert_eq!(shutdown.load(Ordering::SeqCst), 1);
}

#[test]
fn test_rumble_follows_controller_authority() {
    let harness = Harness::started(Script {
        rumble: true,
        ..Script::default()
    });
    // Keyboard authority: the core rumbles but nothing is played
    harness.session.run_tick(Instant::now());
    assert_eq!(harness.count("input 0x0"), 1);

    let rumbles = Arc::new(Mutex::new(Vec::new()));
    harness.session.set_gamepad(Box::new(StickGamepad {
        rumbles: Arc::clone(&rumbles),
    }));
    harness.session.run_tick(Instant::now());
    assert_eq!(harness.count("input 0x10"), 1);

    let played = rumbles.lock();
    assert_eq!(played.len(), 1);
    let intensity = InputSettings::default().gamepad_rumble_intensity;
    assert_eq!(played[0].weak_magnitude, intensity);
    assert_eq!(played[0].duration, FrameSpeed::BASE.period());
}

#[test]
fn test_touch_forwarded_while_attached() {
    let harness = Harness::new(Script::default());
    harness.session.create().unwrap();
    harness.session.touch(TouchPoint { x: 1, y: 2 });
    assert_eq!(harness.count("touch 1,2"), 0);

    harness
        .session
        .start(Box::new(NullSink::new()), Box::new(NullSink::new()))
        .unwrap();
    harness.session.drag_touch(TouchPoint { x: 5, y: 5 });
    harness.session.touch(TouchPoint { x: 1, y: 2 });
    harness.session.drag_touch(TouchPoint { x: 3, y: 4 });
    harness.session.release_touch();

    assert_eq!(harness.count("touch 5,5"), 0);
    assert_eq!(harness.count("touch 1,2"), 1);
    assert_eq!(harness.count("touch 3,4"), 1);
    assert_eq!(harness.count("release"), 1);
}
