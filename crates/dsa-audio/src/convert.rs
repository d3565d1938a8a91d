//! Sample rate conversion on the consumer side
//!
//! The core produces pairs at [`CORE_SAMPLE_RATE`]; devices rarely run at
//! that rate. The converter pulls exactly as many source pairs as an output
//! buffer needs and linearly interpolates between them.

use crate::bridge::{AudioBridge, StereoSample};

/// Native output rate of the emulated sound hardware
pub const CORE_SAMPLE_RATE: u32 = 32823;

/// Stereo frame in device format
pub type StereoFrame = [f32; 2];

/// Convert one i16 sample to `[-1.0, 1.0)`
#[inline]
pub fn sample_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

/// Linear-interpolating rate converter
#[derive(Debug)]
pub struct RateConverter {
    /// Source pairs advanced per output frame
    step: f64,
    /// Fractional read position relative to `last`
    position: f64,
    /// Last source frame of the previous call
    last: StereoFrame,
    scratch: Vec<StereoSample>,
}

impl RateConverter {
    pub fn new(source_rate: u32, output_rate: u32) -> Self {
        Self {
            step: source_rate as f64 / output_rate.max(1) as f64,
            position: 0.0,
            last: [0.0; 2],
            scratch: Vec::new(),
        }
    }

    pub fn ratio(&self) -> f64 {
        self.step
    }

    /// Fill `out` from `bridge`, scaling by `volume`
    pub fn fill(&mut self, bridge: &AudioBridge, out: &mut [StereoFrame], volume: f32) {
        if out.is_empty() {
            return;
        }

        let end = self.position + out.len() as f64 * self.step;
        let needed = end.floor() as usize;
        self.scratch.resize(needed, [0, 0]);
        bridge.pull(&mut self.scratch);

        let frame_at = |index: usize, last: StereoFrame, scratch: &[StereoSample]| -> StereoFrame {
            if index == 0 || scratch.is_empty() {
                last
            } else {
                let pair = scratch[(index - 1).min(scratch.len() - 1)];
                [sample_to_f32(pair[0]), sample_to_f32(pair[1])]
            }
        };

        for (i, frame) in out.iter_mut().enumerate() {
            let t = self.position + i as f64 * self.step;
            let index = t.floor() as usize;
            let frac = (t - index as f64) as f32;
            let a = frame_at(index, self.last, &self.scratch);
            let b = frame_at(index + 1, self.last, &self.scratch);
            for channel in 0..2 {
                frame[channel] = (a[channel] + (b[channel] - a[channel]) * frac) * volume;
            }
        }

        if needed > 0 {
            self.last = frame_at(needed, self.last, &self.scratch);
        }
        self.position = end - needed as f64;
    }

    pub fn reset(&mut self) {
        self.position = 0.0;
        self.last = [0.0; 2];
    }
}
