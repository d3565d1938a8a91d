//! Null audio backend
//!
//! Accepts every command and never pulls from the bridge. Used for headless
//! runs and tests.

use super::{AudioOutput, OutputState};
use crate::bridge::AudioBridge;
use dsa_core::error::AudioError;
use std::sync::Arc;

/// Audio output that discards everything
#[derive(Debug, Default)]
pub struct NullAudioBackend {
    bridge: Option<Arc<AudioBridge>>,
    state: OutputState,
    suspends: u32,
    resumes: u32,
}

impl NullAudioBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of suspend calls that changed the state
    pub fn suspend_count(&self) -> u32 {
        self.suspends
    }

    pub fn resume_count(&self) -> u32 {
        self.resumes
    }

    pub fn is_attached(&self) -> bool {
        self.bridge.is_some()
    }
}

impl AudioOutput for NullAudioBackend {
    fn start(&mut self, bridge: Arc<AudioBridge>) -> Result<(), AudioError> {
        if self.state == OutputState::Closed {
            return Err(AudioError::Playback("output is closed".to_string()));
        }
        self.bridge = Some(bridge);
        self.state = OutputState::Running;
        tracing::debug!("Null audio output started");
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        if self.state == OutputState::Running {
            self.state = OutputState::Suspended;
            self.suspends += 1;
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        if self.state == OutputState::Suspended {
            self.state = OutputState::Running;
            self.resumes += 1;
        }
        Ok(())
    }

    fn close(&mut self) {
        self.bridge = None;
        self.state = OutputState::Closed;
    }

    fn state(&self) -> OutputState {
        self.state
    }

    fn name(&self) -> &str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_lifecycle() {
        let mut output = NullAudioBackend::new();
        assert_eq!(output.state(), OutputState::Idle);

        output.start(Arc::new(AudioBridge::new(16))).unwrap();
        assert!(output.is_attached());
        assert_eq!(output.state(), OutputState::Running);

        output.suspend().unwrap();
        output.suspend().unwrap();
        assert_eq!(output.suspend_count(), 1);

        output.resume().unwrap();
        assert_eq!(output.state(), OutputState::Running);

        output.close();
        assert_eq!(output.state(), OutputState::Closed);
        assert!(output.start(Arc::new(AudioBridge::new(16))).is_err());
    }
}
