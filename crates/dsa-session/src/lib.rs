//! Session layer for ds-anywhere
//!
//! This crate drives an emulation core through its lifecycle: creation,
//! cart and BIOS loading, the frame tick, pause and speed control, and the
//! shutdown sequence.

pub mod emulator;
pub mod loader;
pub mod null_core;
pub mod runner;
pub mod sinks;

pub use emulator::{CartHandle, CoreProvider, CoreSignals, EmulationCore, Screen};
pub use loader::CartInfo;
pub use null_core::{NullCart, NullCore, NullCoreProvider};
pub use runner::{Session, SessionStats};
pub use sinks::{CaptureSink, FrameSink, NullSink};
