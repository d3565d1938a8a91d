//! DS Anywhere - headless session runner
//!
//! Boots the null core with the configured cart and firmware settings and
//! drives the session loop until the run time elapses or the core stops.

use anyhow::Context;
use dsa_core::events::{Channel, EventHub};
use dsa_core::lifecycle::SessionState;
use dsa_core::Config;
use dsa_session::{NullCoreProvider, NullSink, Session};
use dsa_vfs::{HostDirStore, StorageManager, VirtualFileSystem};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Longest sleep between loop iterations
const MAX_IDLE: Duration = Duration::from_millis(5);

fn main() -> anyhow::Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    dsa_core::logging::init(&config.debug)?;

    if let Some(rom) = std::env::args().nth(1) {
        config.general.rom = Some(PathBuf::from(rom));
    }

    tracing::info!("Starting DS Anywhere");
    tracing::info!("Durable storage at {}", config.paths.storage.display());

    let hub = Arc::new(EventHub::new());
    let storage = Arc::new(StorageManager::new(
        Arc::new(VirtualFileSystem::new()),
        Arc::new(HostDirStore::new(&config.paths.storage)),
        Arc::clone(&hub),
    ));
    let session = Session::from_config(
        &config,
        Arc::new(NullCoreProvider::new()),
        Arc::clone(&storage),
        hub,
    )?;

    session.subscribe(Channel::SaveComplete, || tracing::info!("Saves synced"));
    storage.prepare().context("Failed to prepare storage")?;

    session.create()?;
    if config.firmware.should_firmware_boot && storage.can_boot_firmware()? {
        session.load_user_bios()?;
    } else {
        session.load_free_bios()?;
    }

    if let Some(path) = &config.general.rom {
        let rom = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
        let cart = session.boot_cart(&rom)?;
        tracing::info!("Booting {} ({})", cart.title, cart.code);
    }

    session.start(Box::new(NullSink::new()), Box::new(NullSink::new()))?;
    if config.general.speed != 1.0 {
        session.set_speed(config.general.speed)?;
    }

    let started = Instant::now();
    let run_for = (config.general.run_seconds > 0)
        .then(|| Duration::from_secs(config.general.run_seconds));

    while session.state() != SessionState::Uninitialized {
        let now = Instant::now();
        if run_for.is_some_and(|limit| now.duration_since(started) >= limit) {
            break;
        }
        session.pump(now);
        let idle = session
            .time_until_next_tick(Instant::now())
            .map_or(MAX_IDLE, |wait| wait.min(MAX_IDLE));
        std::thread::sleep(idle);
    }

    storage.flush_pending().context("Failed to sync saves")?;
    session.shutdown()?;

    let stats = session.stats();
    tracing::info!(
        "Ran {} frames ({} ticks skipped, {} audio pairs dropped, {} syncs)",
        stats.frames,
        stats.skipped_ticks,
        stats.dropped_samples,
        stats.flushes
    );
    Ok(())
}
