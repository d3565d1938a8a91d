//! Controller polling
//!
//! The host supplies a [`GamepadSource`]; the arbiter reads one snapshot per
//! tick and turns it into a button mask through [`GamepadBindings`].

use crate::buttons::{ButtonMask, DsButton};
use crate::rumble::RumbleEffect;
use dsa_core::config::InputSettings;
use std::collections::BTreeMap;

/// Snapshot of a standard-layout controller
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GamepadState {
    /// Axis positions in `[-1, 1]`; 0 is horizontal, 1 is vertical (down positive)
    pub axes: Vec<f32>,
    /// Pressed flag per physical button index
    pub buttons: Vec<bool>,
}

impl GamepadState {
    pub fn axis(&self, index: usize) -> f32 {
        self.axes.get(index).copied().unwrap_or(0.0)
    }

    pub fn is_pressed(&self, index: usize) -> bool {
        self.buttons.get(index).copied().unwrap_or(false)
    }
}

/// Host controller access
pub trait GamepadSource: Send {
    /// Current state of the first connected controller, if any
    fn poll(&mut self) -> Option<GamepadState>;

    /// Play a rumble effect on that controller
    fn play_rumble(&mut self, effect: RumbleEffect);
}

/// Source with nothing connected
#[derive(Debug, Default)]
pub struct NoGamepad;

impl GamepadSource for NoGamepad {
    fn poll(&mut self) -> Option<GamepadState> {
        None
    }

    fn play_rumble(&mut self, _effect: RumbleEffect) {}
}

/// Button -> physical indices, plus the stick dead zone
#[derive(Debug, Clone, PartialEq)]
pub struct GamepadBindings {
    binds: BTreeMap<DsButton, Vec<usize>>,
    sensitivity: f32,
}

impl GamepadBindings {
    pub fn from_settings(settings: &InputSettings) -> Self {
        let mut binds = BTreeMap::new();
        for (name, indices) in &settings.gamepad_binds {
            match name.parse::<DsButton>() {
                Ok(button) => {
                    binds.insert(button, indices.clone());
                }
                Err(e) => tracing::warn!("Ignoring gamepad binding: {}", e),
            }
        }
        Self {
            binds,
            sensitivity: settings.gamepad_axis_sensitivity.clamp(0.0, 1.0),
        }
    }

    pub fn write_settings(&self, settings: &mut InputSettings) {
        settings.gamepad_binds = self
            .binds
            .iter()
            .map(|(button, indices)| (button.name().to_string(), indices.clone()))
            .collect();
        settings.gamepad_axis_sensitivity = self.sensitivity;
    }

    /// Stick deflection needed to register a direction
    pub fn threshold(&self) -> f32 {
        1.0 - self.sensitivity
    }

    pub fn indices(&self, button: DsButton) -> &[usize] {
        self.binds.get(&button).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set_indices(&mut self, button: DsButton, indices: Vec<usize>) {
        self.binds.insert(button, indices);
    }

    /// Mask for one controller snapshot
    pub fn evaluate(&self, state: &GamepadState) -> ButtonMask {
        let threshold = self.threshold();
        let mut mask = ButtonMask::empty();

        let x = state.axis(0);
        if x > threshold {
            mask |= ButtonMask::DPAD_RIGHT;
        }
        if x < -threshold {
            mask |= ButtonMask::DPAD_LEFT;
        }
        let y = state.axis(1);
        if y > threshold {
            mask |= ButtonMask::DPAD_DOWN;
        }
        if y < -threshold {
            mask |= ButtonMask::DPAD_UP;
        }

        for (button, indices) in &self.binds {
            if indices.iter().any(|&index| state.is_pressed(index)) {
                mask |= button.mask();
            }
        }
        mask
    }
}

impl Default for GamepadBindings {
    fn default() -> Self {
        Self::from_settings(&InputSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stick(x: f32, y: f32) -> GamepadState {
        GamepadState {
            axes: vec![x, y],
            buttons: vec![false; 17],
        }
    }

    #[test]
    fn test_axis_threshold() {
        let bindings = GamepadBindings::default();
        assert_eq!(bindings.evaluate(&stick(0.6, 0.0)), ButtonMask::DPAD_RIGHT);
        assert_eq!(bindings.evaluate(&stick(0.4, 0.0)), ButtonMask::empty());
        assert_eq!(bindings.evaluate(&stick(-0.6, 0.0)), ButtonMask::DPAD_LEFT);
    }

    #[test]
    fn test_axes_independent() {
        let bindings = GamepadBindings::default();
        assert_eq!(
            bindings.evaluate(&stick(0.9, -0.9)),
            ButtonMask::DPAD_RIGHT | ButtonMask::DPAD_UP
        );
        assert_eq!(bindings.evaluate(&stick(0.0, 0.7)), ButtonMask::DPAD_DOWN);
    }

    #[test]
    fn test_bound_buttons_or_together() {
        let bindings = GamepadBindings::default();
        let mut state = stick(0.0, 0.0);
        state.buttons[7] = true;
        assert_eq!(bindings.evaluate(&state), ButtonMask::R);

        state.buttons[1] = true;
        assert_eq!(bindings.evaluate(&state), ButtonMask::R | ButtonMask::A);
    }

    #[test]
    fn test_short_snapshot() {
        let bindings = GamepadBindings::default();
        let state = GamepadState {
            axes: vec![],
            buttons: vec![true],
        };
        assert_eq!(bindings.evaluate(&state), ButtonMask::B);
    }

    #[test]
    fn test_sensitivity_from_settings() {
        let mut settings = InputSettings::default();
        settings.gamepad_axis_sensitivity = 0.8;
        let bindings = GamepadBindings::from_settings(&settings);
        assert_eq!(bindings.evaluate(&stick(0.3, 0.0)), ButtonMask::DPAD_RIGHT);
    }

    #[test]
    fn test_settings_round_trip() {
        let mut bindings = GamepadBindings::default();
        bindings.set_indices(DsButton::Select, vec![8, 16]);
        let mut settings = InputSettings::default();
        bindings.write_settings(&mut settings);
        assert_eq!(settings.gamepad_binds["SELECT"], vec![8, 16]);
        assert_eq!(GamepadBindings::from_settings(&settings), bindings);
    }
}
