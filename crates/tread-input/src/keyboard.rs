//! Held-key tracker.
//!
//! [`KeyboardState`] keeps the set of physical keys currently held down.
//! Input is edge-triggered: state only changes on press/release transitions,
//! and key-repeat events are ignored. Physical key codes are used so WASD
//! driving works the same on every keyboard layout.

use std::collections::HashSet;
use winit::event::{ElementState, KeyEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Minimal description of a key event for processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawKeyEvent {
    /// The physical key involved.
    pub key: PhysicalKey,
    /// Whether the key was pressed or released.
    pub state: ElementState,
    /// Whether this is a repeat event.
    pub repeat: bool,
}

impl RawKeyEvent {
    /// A non-repeat press of `code`.
    pub fn press(code: KeyCode) -> Self {
        Self {
            key: PhysicalKey::Code(code),
            state: ElementState::Pressed,
            repeat: false,
        }
    }

    /// A release of `code`.
    pub fn release(code: KeyCode) -> Self {
        Self {
            key: PhysicalKey::Code(code),
            state: ElementState::Released,
            repeat: false,
        }
    }
}

impl From<&KeyEvent> for RawKeyEvent {
    fn from(event: &KeyEvent) -> Self {
        Self {
            key: event.physical_key,
            state: event.state,
            repeat: event.repeat,
        }
    }
}

/// The set of held keys.
#[derive(Debug, Clone, Default)]
pub struct KeyboardState {
    held: HashSet<KeyCode>,
}

impl KeyboardState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes a winit [`KeyEvent`]. Returns `true` if the held set changed.
    pub fn process_event(&mut self, event: &KeyEvent) -> bool {
        self.process_raw(RawKeyEvent::from(event))
    }

    /// Processes a [`RawKeyEvent`]. Returns `true` if the held set changed.
    ///
    /// Repeats and keys without a known physical code are ignored.
    pub fn process_raw(&mut self, event: RawKeyEvent) -> bool {
        if event.repeat {
            return false;
        }
        let PhysicalKey::Code(code) = event.key else {
            return false;
        };
        match event.state {
            ElementState::Pressed => self.held.insert(code),
            ElementState::Released => self.held.remove(&code),
        }
    }

    /// Returns `true` while the key is held down.
    #[must_use]
    pub fn is_held(&self, code: KeyCode) -> bool {
        self.held.contains(&code)
    }

    /// Iterates the held keys in no particular order.
    pub fn held(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.held.iter().copied()
    }

    /// Release everything, e.g. when the window loses focus.
    pub fn clear(&mut self) -> bool {
        let had_keys = !self.held.is_empty();
        self.held.clear();
        had_keys
    }
}
