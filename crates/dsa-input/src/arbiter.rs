//! Input arbitration
//!
//! Keyboard events and polled controller state both write the same button
//! mask. Whichever device was used last owns it: a bound key press takes
//! the mask back from the controller, and any non-neutral controller poll
//! takes it from the keyboard. While the controller owns the mask, each
//! poll replaces it outright.

use crate::buttons::ButtonMask;
use crate::gamepad::{GamepadBindings, GamepadState};
use crate::keyboard::KeyBindings;
use crate::rumble::RumbleEffect;
use dsa_core::config::InputSettings;
use std::fmt;
use std::time::Duration;

/// Device currently owning the button mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Authority {
    #[default]
    Keyboard,
    Gamepad,
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authority::Keyboard => write!(f, "keyboard"),
            Authority::Gamepad => write!(f, "gamepad"),
        }
    }
}

/// Merges keyboard and controller input into one mask
#[derive(Debug, Clone)]
pub struct InputArbiter {
    keys: KeyBindings,
    gamepad: GamepadBindings,
    authority: Authority,
    mask: ButtonMask,
    rumble_enabled: bool,
    rumble_intensity: f32,
}

impl InputArbiter {
    pub fn new(settings: &InputSettings) -> Self {
        Self {
            keys: KeyBindings::from_settings(settings),
            gamepad: GamepadBindings::from_settings(settings),
            authority: Authority::Keyboard,
            mask: ButtonMask::empty(),
            rumble_enabled: settings.rumble_enabled,
            rumble_intensity: settings.gamepad_rumble_intensity.clamp(0.0, 1.0),
        }
    }

    /// Replace bindings and rumble settings, keeping the current mask
    pub fn apply_settings(&mut self, settings: &InputSettings) {
        self.keys = KeyBindings::from_settings(settings);
        self.gamepad = GamepadBindings::from_settings(settings);
        self.rumble_enabled = settings.rumble_enabled;
        self.rumble_intensity = settings.gamepad_rumble_intensity.clamp(0.0, 1.0);
    }

    pub fn key_bindings(&self) -> &KeyBindings {
        &self.keys
    }

    pub fn gamepad_bindings(&self) -> &GamepadBindings {
        &self.gamepad
    }

    pub fn authority(&self) -> Authority {
        self.authority
    }

    /// Current mask
    pub fn mask(&self) -> ButtonMask {
        self.mask
    }

    fn take_keyboard(&mut self) {
        if self.authority == Authority::Gamepad {
            tracing::debug!("Input authority -> keyboard");
            self.authority = Authority::Keyboard;
            self.mask = ButtonMask::empty();
        }
    }

    /// Handle a key press; returns false for unbound keys
    pub fn key_down(&mut self, key: &str) -> bool {
        let Some(bit) = self.keys.lookup(key) else {
            return false;
        };
        self.take_keyboard();
        self.mask |= bit;
        true
    }

    /// Handle a key release; returns false for unbound keys
    pub fn key_up(&mut self, key: &str) -> bool {
        let Some(bit) = self.keys.lookup(key) else {
            return false;
        };
        self.take_keyboard();
        self.mask &= !bit;
        true
    }

    /// Fold one controller snapshot into the mask
    ///
    /// `None` (no controller) leaves everything as it is.
    pub fn poll_gamepad(&mut self, state: Option<&GamepadState>) {
        let Some(state) = state else {
            return;
        };
        let polled = self.gamepad.evaluate(state);
        if polled.is_empty() && self.authority == Authority::Keyboard {
            return;
        }
        if self.authority == Authority::Keyboard {
            tracing::debug!("Input authority -> gamepad");
        }
        self.authority = Authority::Gamepad;
        self.mask = polled;
    }

    /// Rumble to play this tick, given whether the core started rumble since the last one
    pub fn rumble(&self, core_rumbled: bool, tick: Duration) -> Option<RumbleEffect> {
        if self.rumble_enabled && core_rumbled && self.authority == Authority::Gamepad {
            Some(RumbleEffect::uniform(self.rumble_intensity, tick))
        } else {
            None
        }
    }

    /// Release everything and hand the mask back to the keyboard
    pub fn reset(&mut self) {
        self.authority = Authority::Keyboard;
        self.mask = ButtonMask::empty();
    }
}

impl Default for InputArbiter {
    fn default() -> Self {
        Self::new(&InputSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(16);

    fn stick(x: f32, y: f32) -> GamepadState {
        GamepadState {
            axes: vec![x, y],
            buttons: vec![false; 16],
        }
    }

    #[test]
    fn test_key_release_clears_only_its_bit() {
        let mut arbiter = InputArbiter::default();
        assert!(arbiter.key_down("a"));
        assert!(arbiter.key_down("d"));
        assert_eq!(arbiter.mask(), ButtonMask::DPAD_LEFT | ButtonMask::DPAD_RIGHT);

        assert!(arbiter.key_up("a"));
        assert_eq!(arbiter.mask(), ButtonMask::DPAD_RIGHT);
    }

    #[test]
    fn test_unbound_key_ignored() {
        let mut arbiter = InputArbiter::default();
        assert!(!arbiter.key_down("F5"));
        assert!(arbiter.mask().is_empty());
    }

    #[test]
    fn test_neutral_poll_keeps_keyboard() {
        let mut arbiter = InputArbiter::default();
        arbiter.key_down("l");
        arbiter.poll_gamepad(Some(&stick(0.1, 0.0)));
        assert_eq!(arbiter.authority(), Authority::Keyboard);
        assert_eq!(arbiter.mask(), ButtonMask::A);
    }

    #[test]
    fn test_active_poll_takes_over() {
        let mut arbiter = InputArbiter::default();
        arbiter.key_down("l");
        arbiter.poll_gamepad(Some(&stick(0.6, 0.0)));
        assert_eq!(arbiter.authority(), Authority::Gamepad);
        assert_eq!(arbiter.mask(), ButtonMask::DPAD_RIGHT);

        // Once the controller owns the mask a neutral poll clears it
        arbiter.poll_gamepad(Some(&stick(0.0, 0.0)));
        assert_eq!(arbiter.authority(), Authority::Gamepad);
        assert!(arbiter.mask().is_empty());
    }

    #[test]
    fn test_key_press_takes_back_authority() {
        let mut arbiter = InputArbiter::default();
        arbiter.poll_gamepad(Some(&stick(0.0, -0.9)));
        assert_eq!(arbiter.mask(), ButtonMask::DPAD_UP);

        arbiter.key_down("k");
        assert_eq!(arbiter.authority(), Authority::Keyboard);
        assert_eq!(arbiter.mask(), ButtonMask::B);
    }

    #[test]
    fn test_missing_controller_contributes_nothing() {
        let mut arbiter = InputArbiter::default();
        arbiter.poll_gamepad(Some(&stick(1.0, 0.0)));
        arbiter.poll_gamepad(None);
        assert_eq!(arbiter.mask(), ButtonMask::DPAD_RIGHT);
    }

    #[test]
    fn test_rumble_rules() {
        let mut arbiter = InputArbiter::default();
        assert_eq!(arbiter.rumble(true, TICK), None);

        arbiter.poll_gamepad(Some(&stick(1.0, 0.0)));
        assert_eq!(arbiter.rumble(false, TICK), None);
        let effect = arbiter.rumble(true, TICK).unwrap();
        assert_eq!(effect.weak_magnitude, 0.5);
        assert_eq!(effect.strong_magnitude, 0.5);
        assert_eq!(effect.duration, TICK);

        let mut settings = InputSettings::default();
        settings.rumble_enabled = false;
        arbiter.apply_settings(&settings);
        assert_eq!(arbiter.rumble(true, TICK), None);
    }

    #[test]
    fn test_reset() {
        let mut arbiter = InputArbiter::default();
        arbiter.poll_gamepad(Some(&stick(1.0, 0.0)));
        arbiter.reset();
        assert_eq!(arbiter.authority(), Authority::Keyboard);
        assert!(arbiter.mask().is_empty());
    }
}
