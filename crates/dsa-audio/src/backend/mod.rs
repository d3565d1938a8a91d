//! Audio backends
//!
//! An output is the consumer side of the [`AudioBridge`]: once started it
//! pulls pairs from the bridge on its own schedule until suspended or closed.

pub mod cpal_backend;
pub mod null;

pub use cpal_backend::CpalAudioBackend;
pub use null::NullAudioBackend;

use crate::bridge::AudioBridge;
use dsa_core::error::AudioError;
use std::fmt;
use std::sync::Arc;

/// Playback state of an output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputState {
    /// Created, not yet consuming
    #[default]
    Idle,
    /// Pulling from the bridge
    Running,
    /// Stopped pulling, can resume
    Suspended,
    /// Torn down, must be recreated
    Closed,
}

impl fmt::Display for OutputState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Suspended => write!(f, "suspended"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Consumer of the audio bridge
pub trait AudioOutput: Send {
    /// Begin pulling from `bridge`
    fn start(&mut self, bridge: Arc<AudioBridge>) -> Result<(), AudioError>;

    /// Stop pulling, keeping the device open
    fn suspend(&mut self) -> Result<(), AudioError>;

    /// Continue pulling after `suspend`
    fn resume(&mut self) -> Result<(), AudioError>;

    /// Release the device; the output cannot be restarted afterwards
    fn close(&mut self);

    fn state(&self) -> OutputState;

    fn name(&self) -> &str;
}

/// Builds fresh outputs, used when a session recreates its consumer
pub type OutputFactory = Arc<dyn Fn() -> Box<dyn AudioOutput> + Send + Sync>;
