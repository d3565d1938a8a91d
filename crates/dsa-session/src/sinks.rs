//! Screen outputs

use parking_lot::Mutex;
use std::sync::Arc;

/// Receives one screen's pixels after every frame
pub trait FrameSink: Send {
    fn put_pixels(&mut self, pixels: &[u32]);
}

/// Sink that only counts frames
#[derive(Debug, Default)]
pub struct NullSink {
    frames: u64,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl FrameSink for NullSink {
    fn put_pixels(&mut self, _pixels: &[u32]) {
        self.frames += 1;
    }
}

/// Sink keeping a copy of the latest frame, readable from another thread
#[derive(Debug, Clone, Default)]
pub struct CaptureSink {
    latest: Arc<Mutex<Vec<u32>>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the most recent frame; empty before the first one
    pub fn latest(&self) -> Vec<u32> {
        self.latest.lock().clone()
    }
}

impl FrameSink for CaptureSink {
    fn put_pixels(&mut self, pixels: &[u32]) {
        let mut latest = self.latest.lock();
        latest.clear();
        latest.extend_from_slice(pixels);
    }
}
