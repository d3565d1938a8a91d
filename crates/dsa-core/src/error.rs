//! Error types for the ds-anywhere session layer

use crate::lifecycle::SessionState;
use thiserror::Error;

/// Main error type for the session layer
#[derive(Error, Debug)]
pub enum EmulatorError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),
}

/// Session lifecycle errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Emulation core is not ready")]
    NotReady,

    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("No cart has been inserted")]
    NoCart,

    #[error("Failed to load cart from {0}")]
    CartLoadFailed(String),

    #[error("Core rejected cart")]
    RomRejected,

    #[error("Invalid speed multiplier: {0}")]
    InvalidSpeed(f64),
}

/// Virtual filesystem and durable storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Directory does not exist: {0}")]
    MissingDirectory(String),

    #[error("Invalid virtual path: {0}")]
    InvalidPath(String),

    #[error("Sync failed for {mount}: {source}")]
    Sync {
        mount: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio output errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No output device available")]
    NoDevice,

    #[error("Failed to get output config: {0}")]
    Config(String),

    #[error("Failed to build output stream: {0}")]
    Stream(String),

    #[error("Playback control failed: {0}")]
    Playback(String),

    #[error("Audio thread has exited")]
    ThreadGone,
}

/// Firmware and input settings validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    #[error("Nickname is {0} characters long, at most 10 are allowed")]
    NicknameTooLong(usize),

    #[error("Invalid birthday month: {0}")]
    InvalidMonth(u8),

    #[error("Invalid birthday day {day} for month {month}")]
    InvalidDay { month: u8, day: u8 },

    #[error("Unknown firmware language id: {0}")]
    UnknownLanguage(u8),

    #[error("Unknown button: {0}")]
    UnknownButton(String),

    #[error("Value {value} for {name} is outside [0, 1]")]
    OutOfRange { name: &'static str, value: f32 },
}

/// Faults reported by the emulation core while exposing its output buffers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("{0} buffer is unavailable")]
    BufferUnavailable(&'static str),

    #[error("{name} buffer holds {actual} values, expected {expected}")]
    BufferSize {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Core fault: {0}")]
    Fault(String),
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, EmulatorError>;
