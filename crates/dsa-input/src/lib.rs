//! Input handling for ds-anywhere
//!
//! Keyboard bindings, controller polling, touch mapping and the arbiter
//! that merges them into the per-frame button mask.

pub mod arbiter;
pub mod buttons;
pub mod gamepad;
pub mod keyboard;
pub mod rumble;
pub mod touch;

pub use arbiter::{Authority, InputArbiter};
pub use buttons::{ButtonMask, DsButton};
pub use gamepad::{GamepadBindings, GamepadSource, GamepadState, NoGamepad};
pub use keyboard::{BindingSlot, ButtonBinding, KeyBindings};
pub use rumble::RumbleEffect;
pub use touch::{TouchMapper, TouchPoint, TouchTracker};
