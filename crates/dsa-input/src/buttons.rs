//! Console buttons

use bitflags::bitflags;
use dsa_core::error::SettingsError;
use std::fmt;
use std::str::FromStr;

bitflags! {
    /// Pressed-button set handed to the core each frame
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ButtonMask: u16 {
        const A          = 1 << 0;
        const B          = 1 << 1;
        const SELECT     = 1 << 2;
        const START      = 1 << 3;
        const DPAD_RIGHT = 1 << 4;
        const DPAD_LEFT  = 1 << 5;
        const DPAD_UP    = 1 << 6;
        const DPAD_DOWN  = 1 << 7;
        const R          = 1 << 8;
        const L          = 1 << 9;
        const X          = 1 << 10;
        const Y          = 1 << 11;
    }
}

/// A single logical button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DsButton {
    A,
    B,
    Select,
    Start,
    DpadRight,
    DpadLeft,
    DpadUp,
    DpadDown,
    R,
    L,
    X,
    Y,
}

impl DsButton {
    /// All buttons in bit order
    pub const ALL: [DsButton; 12] = [
        DsButton::A,
        DsButton::B,
        DsButton::Select,
        DsButton::Start,
        DsButton::DpadRight,
        DsButton::DpadLeft,
        DsButton::DpadUp,
        DsButton::DpadDown,
        DsButton::R,
        DsButton::L,
        DsButton::X,
        DsButton::Y,
    ];

    pub fn mask(self) -> ButtonMask {
        ButtonMask::from_bits_truncate(1 << (self as u16))
    }

    /// The button owning exactly this single bit
    pub fn from_bit(bits: u16) -> Option<Self> {
        DsButton::ALL
            .into_iter()
            .find(|button| button.mask().bits() == bits)
    }

    /// Identifier used in the settings store
    pub fn name(self) -> &'static str {
        match self {
            DsButton::A => "A",
            DsButton::B => "B",
            DsButton::Select => "SELECT",
            DsButton::Start => "START",
            DsButton::DpadRight => "DPAD_RIGHT",
            DsButton::DpadLeft => "DPAD_LEFT",
            DsButton::DpadUp => "DPAD_UP",
            DsButton::DpadDown => "DPAD_DOWN",
            DsButton::R => "R",
            DsButton::L => "L",
            DsButton::X => "X",
            DsButton::Y => "Y",
        }
    }

    /// Human-readable label
    pub fn display_name(self) -> &'static str {
        match self {
            DsButton::A => "A",
            DsButton::B => "B",
            DsButton::Select => "Select",
            DsButton::Start => "Start",
            DsButton::DpadRight => "D-Pad Right",
            DsButton::DpadLeft => "D-Pad Left",
            DsButton::DpadUp => "D-Pad Up",
            DsButton::DpadDown => "D-Pad Down",
            DsButton::R => "R",
            DsButton::L => "L",
            DsButton::X => "X",
            DsButton::Y => "Y",
        }
    }
}

impl FromStr for DsButton {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DsButton::ALL
            .into_iter()
            .find(|button| button.name() == s)
            .ok_or_else(|| SettingsError::UnknownButton(s.to_string()))
    }
}

impl fmt::Display for DsButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl ButtonMask {
    /// Buttons set in this mask, in bit order
    pub fn buttons(self) -> impl Iterator<Item = DsButton> {
        DsButton::ALL
            .into_iter()
            .filter(move |button| self.contains(button.mask()))
    }
}

impl From<DsButton> for ButtonMask {
    fn from(button: DsButton) -> Self {
        button.mask()
    }
}
