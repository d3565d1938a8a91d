//! Audio for ds-anywhere
//!
//! The [`AudioBridge`] carries samples from the frame tick to an
//! [`AudioOutput`], which drains it from the device thread.

pub mod backend;
pub mod bridge;
pub mod convert;

pub use backend::{AudioOutput, CpalAudioBackend, NullAudioBackend, OutputFactory, OutputState};
pub use bridge::{AudioBridge, BridgeStats, StereoSample, DEFAULT_CAPACITY};
pub use convert::CORE_SAMPLE_RATE;

use dsa_core::config::{AudioBackend, AudioConfig};
use std::sync::Arc;

/// Output factory for the configured backend
///
/// Disabled audio always yields the null backend.
pub fn output_factory(config: &AudioConfig) -> OutputFactory {
    let volume = config.volume;
    match (config.enable, config.backend) {
        (true, AudioBackend::Auto) => Arc::new(move || -> Box<dyn AudioOutput> {
            Box::new(CpalAudioBackend::new(volume))
        }),
        _ => Arc::new(|| -> Box<dyn AudioOutput> { Box::new(NullAudioBackend::new()) }),
    }
}
