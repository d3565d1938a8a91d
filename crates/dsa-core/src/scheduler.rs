//! Frame tick scheduler
//!
//! This module implements the periodic frame schedule that drives the
//! session. It is a deadline tracker rather than a timer thread: the host
//! loop polls it with the current time and gets at most one due tick per
//! poll, so two ticks can never overlap. A schedule that falls behind skips
//! the missed deadlines instead of queueing a backlog.

use std::fmt;
use std::time::{Duration, Instant};

/// Base tick rate of the emulated console
pub const BASE_TICK_RATE_HZ: f64 = 60.0;

/// Frame speed multiplier relative to the base 60 Hz tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSpeed(f64);

impl FrameSpeed {
    /// Normal speed
    pub const BASE: FrameSpeed = FrameSpeed(1.0);

    /// Create a speed multiplier
    ///
    /// Rejects non-positive and non-finite values, and multipliers so small
    /// that their period does not fit in a `Duration`.
    pub fn new(multiplier: f64) -> Option<Self> {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return None;
        }
        period_for(multiplier).map(|_| Self(multiplier))
    }

    pub fn multiplier(&self) -> f64 {
        self.0
    }

    /// Tick period: 1000 ms / (60 * multiplier)
    pub fn period(&self) -> Duration {
        period_for(self.0).unwrap_or(Duration::MAX)
    }
}

fn period_for(multiplier: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(1.0 / (BASE_TICK_RATE_HZ * multiplier)).ok()
}

impl Default for FrameSpeed {
    fn default() -> Self {
        Self::BASE
    }
}

impl fmt::Display for FrameSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

/// Tick statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleStats {
    /// Ticks handed out by `poll`
    pub fired: u64,
    /// Times the schedule fell behind and dropped missed deadlines
    pub lagged: u64,
    /// Times the schedule was (re)armed
    pub armed: u64,
}

/// Periodic frame schedule
#[derive(Debug, Default)]
pub struct FrameScheduler {
    /// Current speed
    speed: FrameSpeed,
    /// Next deadline while armed
    next_deadline: Option<Instant>,
    /// Statistics
    stats: ScheduleStats,
}

impl FrameScheduler {
    /// Create a disarmed scheduler at base speed
    pub fn new() -> Self {
        Self::default()
    }

    pub fn speed(&self) -> FrameSpeed {
        self.speed
    }

    pub fn period(&self) -> Duration {
        self.speed.period()
    }

    pub fn is_armed(&self) -> bool {
        self.next_deadline.is_some()
    }

    pub fn stats(&self) -> ScheduleStats {
        self.stats
    }

    /// Arm the schedule; the first tick is due one period after `now`
    ///
    /// A period too long to add to `now` leaves the schedule disarmed.
    pub fn start(&mut self, now: Instant) {
        self.next_deadline = now.checked_add(self.period());
        if self.next_deadline.is_none() {
            tracing::warn!("Frame period {:?} out of range, schedule idle", self.period());
            return;
        }
        self.stats.armed += 1;
        tracing::debug!("Frame schedule armed at {} ({:?})", self.speed, self.period());
    }

    /// Cancel the schedule; only future ticks are affected
    pub fn cancel(&mut self) {
        if self.next_deadline.take().is_some() {
            tracing::debug!("Frame schedule cancelled");
        }
    }

    /// Change speed, cancelling the outstanding schedule and re-arming it
    /// at the new period if it was armed
    pub fn set_speed(&mut self, speed: FrameSpeed, now: Instant) {
        let was_armed = self.is_armed();
        self.cancel();
        self.speed = speed;
        if was_armed {
            self.start(now);
        }
        tracing::debug!("Frame speed set to {}", speed);
    }

    /// Cancel and restore base speed
    pub fn reset(&mut self) {
        self.cancel();
        self.speed = FrameSpeed::BASE;
    }

    /// Check whether a tick is due at `now`
    ///
    /// Returns true at most once per elapsed deadline. When the caller fell
    /// more than one period behind, the missed ticks are dropped and the
    /// next deadline is placed one period after `now`.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(deadline) = self.next_deadline else {
            return false;
        };
        if now < deadline {
            return false;
        }

        let period = self.period();
        let next = match deadline.checked_add(period) {
            Some(next) if next > now => Some(next),
            _ => {
                self.stats.lagged += 1;
                tracing::trace!("Frame schedule lagging, skipping missed ticks");
                now.checked_add(period)
            }
        };
        self.next_deadline = next;
        self.stats.fired += 1;
        true
    }

    /// Time left until the next tick, if armed
    pub fn time_until_next(&self, now: Instant) -> Option<Duration> {
        self.next_deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_speed_period() {
        let base = FrameSpeed::BASE.period();
        assert!((base.as_secs_f64() - 1.0 / 60.0).abs() < 1e-9);

        let double = FrameSpeed::new(2.0).unwrap().period();
        assert!((double.as_secs_f64() - 1.0 / 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_speed() {
        assert!(FrameSpeed::new(0.0).is_none());
        assert!(FrameSpeed::new(-1.0).is_none());
        assert!(FrameSpeed::new(f64::NAN).is_none());
        assert!(FrameSpeed::new(f64::INFINITY).is_none());
    }

    #[test]
    fn test_out_of_range_speed() {
        assert!(FrameSpeed::new(1e-25).is_none());
        assert!(FrameSpeed::new(f64::MIN_POSITIVE).is_none());

        // Period near the top of the Duration range
        let glacial = FrameSpeed::new(1e-21).unwrap();
        let mut scheduler = FrameScheduler::new();
        let t0 = Instant::now();
        scheduler.set_speed(glacial, t0);
        scheduler.start(t0);
        assert!(!scheduler.poll(t0 + ms(100)));
    }

    #[test]
    fn test_disarmed_never_fires() {
        let mut scheduler = FrameScheduler::new();
        let now = Instant::now();
        assert!(!scheduler.poll(now + ms(100)));
        assert_eq!(scheduler.stats().fired, 0);
    }

    #[test]
    fn test_fires_once_per_period() {
        let mut scheduler = FrameScheduler::new();
        let t0 = Instant::now();
        scheduler.start(t0);

        assert!(!scheduler.poll(t0 + ms(10)));
        assert!(scheduler.poll(t0 + ms(17)));
        // Same instant again: the next deadline has moved on
        assert!(!scheduler.poll(t0 + ms(17)));
        assert!(scheduler.poll(t0 + ms(34)));
        assert_eq!(scheduler.stats().fired, 2);
    }

    #[test]
    fn test_lag_skips_backlog() {
        let mut scheduler = FrameScheduler::new();
        let t0 = Instant::now();
        scheduler.start(t0);

        // Ten periods late: only one tick is handed out
        assert!(scheduler.poll(t0 + ms(170)));
        assert!(!scheduler.poll(t0 + ms(171)));
        assert_eq!(scheduler.stats().lagged, 1);
        assert_eq!(scheduler.stats().fired, 1);
    }

    #[test]
    fn test_cancel_stops_future_ticks() {
        let mut scheduler = FrameScheduler::new();
        let t0 = Instant::now();
        scheduler.start(t0);
        scheduler.cancel();
        assert!(!scheduler.is_armed());
        assert!(!scheduler.poll(t0 + ms(100)));
    }

    #[test]
    fn test_set_speed_rearms() {
        let mut scheduler = FrameScheduler::new();
        let t0 = Instant::now();
        scheduler.start(t0);

        scheduler.set_speed(FrameSpeed::new(2.0).unwrap(), t0 + ms(5));
        assert!(scheduler.is_armed());
        assert_eq!(scheduler.stats().armed, 2);
        // New period is ~8.3ms from the re-arm point
        assert!(!scheduler.poll(t0 + ms(12)));
        assert!(scheduler.poll(t0 + ms(14)));
    }

    #[test]
    fn test_set_speed_while_disarmed() {
        let mut scheduler = FrameScheduler::new();
        scheduler.set_speed(FrameSpeed::new(0.5).unwrap(), Instant::now());
        assert!(!scheduler.is_armed());
        assert_eq!(scheduler.speed().multiplier(), 0.5);
    }

    #[test]
    fn test_reset() {
        let mut scheduler = FrameScheduler::new();
        let t0 = Instant::now();
        scheduler.start(t0);
        scheduler.set_speed(FrameSpeed::new(4.0).unwrap(), t0);
        scheduler.reset();
        assert!(!scheduler.is_armed());
        assert_eq!(scheduler.speed(), FrameSpeed::BASE);
    }

    #[test]
    fn test_time_until_next() {
        let mut scheduler = FrameScheduler::new();
        let t0 = Instant::now();
        assert_eq!(scheduler.time_until_next(t0), None);
        scheduler.start(t0);
        let remaining = scheduler.time_until_next(t0 + ms(6)).unwrap();
        assert!(remaining <= ms(11));
        assert_eq!(scheduler.time_until_next(t0 + ms(100)), Some(Duration::ZERO));
    }
}
