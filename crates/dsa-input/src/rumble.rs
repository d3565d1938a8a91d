//! Rumble effects

use std::time::Duration;

/// Dual-motor rumble request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RumbleEffect {
    /// High frequency motor, `[0, 1]`
    pub weak_magnitude: f32,
    /// Low frequency motor, `[0, 1]`
    pub strong_magnitude: f32,
    pub duration: Duration,
}

impl RumbleEffect {
    /// Both motors at `intensity` for `duration`
    pub fn uniform(intensity: f32, duration: Duration) -> Self {
        let intensity = intensity.clamp(0.0, 1.0);
        Self {
            weak_magnitude: intensity,
            strong_magnitude: intensity,
            duration,
        }
    }

    pub fn is_active(&self) -> bool {
        (self.weak_magnitude > 0.0 || self.strong_magnitude > 0.0) && !self.duration.is_zero()
    }
}
