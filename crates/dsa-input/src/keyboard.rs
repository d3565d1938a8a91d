//! Keyboard bindings
//!
//! Maps host key identifiers to console buttons. A key drives at most one
//! button and each button has a primary and an alternate slot.

use crate::buttons::{ButtonMask, DsButton};
use dsa_core::config::InputSettings;
use std::collections::{BTreeMap, BTreeSet};

/// Binding slot of a button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingSlot {
    Primary,
    Alternate,
}

/// Keys bound to one button
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ButtonBinding {
    pub primary: Option<String>,
    pub alternate: Option<String>,
}

/// Key -> button table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyBindings {
    keys: BTreeMap<String, DsButton>,
    alternates: BTreeSet<String>,
}

impl KeyBindings {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stored settings, skipping entries that are not a single button bit
    pub fn from_settings(settings: &InputSettings) -> Self {
        let mut bindings = Self::new();
        for (key, &bits) in &settings.keybinds {
            match DsButton::from_bit(bits) {
                Some(button) => {
                    bindings.keys.insert(key.clone(), button);
                    if settings.alternate_keybinds.contains(key) {
                        bindings.alternates.insert(key.clone());
                    }
                }
                None => tracing::warn!("Ignoring binding {} -> {:#x}", key, bits),
            }
        }
        bindings
    }

    /// Write the table back into stored settings
    pub fn write_settings(&self, settings: &mut InputSettings) {
        settings.keybinds = self
            .keys
            .iter()
            .map(|(key, button)| (key.clone(), button.mask().bits()))
            .collect();
        settings.alternate_keybinds = self.alternates.clone();
    }

    /// Button bit driven by `key`
    pub fn lookup(&self, key: &str) -> Option<ButtonMask> {
        self.keys.get(key).map(|button| button.mask())
    }

    pub fn is_bound(&self, key: &str) -> bool {
        self.keys.contains_key(key)
    }

    fn key_in_slot(&self, button: DsButton, slot: BindingSlot) -> Option<&str> {
        let wants_alternate = slot == BindingSlot::Alternate;
        self.keys
            .iter()
            .filter(|(key, bound)| {
                **bound == button && self.alternates.contains(key.as_str()) == wants_alternate
            })
            .map(|(key, _)| key.as_str())
            .next()
    }

    pub fn primary_key(&self, button: DsButton) -> Option<&str> {
        self.key_in_slot(button, BindingSlot::Primary)
    }

    pub fn alternate_key(&self, button: DsButton) -> Option<&str> {
        self.key_in_slot(button, BindingSlot::Alternate)
    }

    /// Bind `key` to a slot of `button`
    ///
    /// Any previous binding of `key` is cleared first, and the key that
    /// occupied the slot is unbound.
    pub fn bind(&mut self, button: DsButton, slot: BindingSlot, key: &str) {
        self.unbind_key(key);
        self.unbind(button, slot);

        self.keys.insert(key.to_string(), button);
        if slot == BindingSlot::Alternate {
            self.alternates.insert(key.to_string());
        }
        tracing::debug!("Bound {} to {} ({:?})", key, button.name(), slot);
    }

    /// Clear one slot of `button`
    pub fn unbind(&mut self, button: DsButton, slot: BindingSlot) -> Option<String> {
        let key = self.key_in_slot(button, slot)?.to_string();
        self.unbind_key(&key);
        Some(key)
    }

    /// Clear whatever `key` was bound to
    pub fn unbind_key(&mut self, key: &str) -> Option<DsButton> {
        self.alternates.remove(key);
        self.keys.remove(key)
    }

    /// Bindings for every button, in bit order
    pub fn bindings(&self) -> Vec<(DsButton, ButtonBinding)> {
        DsButton::ALL
            .into_iter()
            .map(|button| {
                let binding = ButtonBinding {
                    primary: self.primary_key(button).map(str::to_string),
                    alternate: self.alternate_key(button).map(str::to_string),
                };
                (button, binding)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
