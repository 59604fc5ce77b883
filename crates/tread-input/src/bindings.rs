//! Key → tank action bindings.
//!
//! [`KeyMap`] maps physical keys to [`TankAction`]s. Several keys may drive
//! the same action. Bindings can be overridden by name from configuration,
//! e.g. `"fire" => "KeyF"`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use winit::keyboard::KeyCode;

/// Discrete tank controls.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum TankAction {
    Forward,
    Backward,
    RotateLeft,
    RotateRight,
    Fire,
}

impl TankAction {
    pub const ALL: [TankAction; 5] = [
        TankAction::Forward,
        TankAction::Backward,
        TankAction::RotateLeft,
        TankAction::RotateRight,
        TankAction::Fire,
    ];

    /// Configuration name, e.g. `"rotate_left"`.
    pub fn name(self) -> &'static str {
        match self {
            TankAction::Forward => "forward",
            TankAction::Backward => "backward",
            TankAction::RotateLeft => "rotate_left",
            TankAction::RotateRight => "rotate_right",
            TankAction::Fire => "fire",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.name() == name)
    }
}

/// Errors from applying binding overrides.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingError {
    #[error("unknown action {0:?}")]
    UnknownAction(String),

    #[error("unknown key {0:?}")]
    UnknownKey(String),
}

/// Physical key → action table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMap {
    keys: HashMap<KeyCode, TankAction>,
}

impl Default for KeyMap {
    /// W/S drive, A/D rotate, Space fires.
    fn default() -> Self {
        let mut map = Self::empty();
        map.bind(KeyCode::KeyW, TankAction::Forward);
        map.bind(KeyCode::KeyS, TankAction::Backward);
        map.bind(KeyCode::KeyA, TankAction::RotateLeft);
        map.bind(KeyCode::KeyD, TankAction::RotateRight);
        map.bind(KeyCode::Space, TankAction::Fire);
        map
    }
}

impl KeyMap {
    pub fn empty() -> Self {
        Self {
            keys: HashMap::new(),
        }
    }

    /// Defaults with each named action rebound to the named key. An override
    /// replaces every default key of that action.
    pub fn from_overrides<I, A, K>(overrides: I) -> Result<Self, BindingError>
    where
        I: IntoIterator<Item = (A, K)>,
        A: AsRef<str>,
        K: AsRef<str>,
    {
        let mut map = Self::default();
        for (action, key) in overrides {
            let action_name = action.as_ref();
            let key_name = key.as_ref();
            let action = TankAction::from_name(action_name)
                .ok_or_else(|| BindingError::UnknownAction(action_name.to_string()))?;
            let code = key_from_name(key_name)
                .ok_or_else(|| BindingError::UnknownKey(key_name.to_string()))?;
            map.unbind_action(action);
            map.bind(code, action);
            tracing::debug!("Bound {key_name} to {}", action.name());
        }
        Ok(map)
    }

    /// Bind `code` to `action`, replacing whatever it drove before.
    pub fn bind(&mut self, code: KeyCode, action: TankAction) {
        self.keys.insert(code, action);
    }

    pub fn unbind_action(&mut self, action: TankAction) {
        self.keys.retain(|_, bound| *bound != action);
    }

    pub fn action_for(&self, code: KeyCode) -> Option<TankAction> {
        self.keys.get(&code).copied()
    }

    /// Keys bound to `action`, in no particular order.
    pub fn keys_for(&self, action: TankAction) -> Vec<KeyCode> {
        self.keys
            .iter()
            .filter(|(_, bound)| **bound == action)
            .map(|(code, _)| *code)
            .collect()
    }
}

/// Parse a key name as written by winit's `Debug` output (`"KeyW"`,
/// `"Space"`, `"ArrowUp"`).
pub fn key_from_name(name: &str) -> Option<KeyCode> {
    Some(match name {
        "KeyA" => KeyCode::KeyA,
        "KeyB" => KeyCode::KeyB,
        "KeyC" => KeyCode::KeyC,
        "KeyD" => KeyCode::KeyD,
        "KeyE" => KeyCode::KeyE,
        "KeyF" => KeyCode::KeyF,
        "KeyG" => KeyCode::KeyG,
        "KeyH" => KeyCode::KeyH,
        "KeyI" => KeyCode::KeyI,
        "KeyJ" => KeyCode::KeyJ,
        "KeyK" => KeyCode::KeyK,
        "KeyL" => KeyCode::KeyL,
        "KeyM" => KeyCode::KeyM,
        "KeyN" => KeyCode::KeyN,
        "KeyO" => KeyCode::KeyO,
        "KeyP" => KeyCode::KeyP,
        "KeyQ" => KeyCode::KeyQ,
        "KeyR" => KeyCode::KeyR,
        "KeyS" => KeyCode::KeyS,
        "KeyT" => KeyCode::KeyT,
        "KeyU" => KeyCode::KeyU,
        "KeyV" => KeyCode::KeyV,
        "KeyW" => KeyCode::KeyW,
        "KeyX" => KeyCode::KeyX,
        "KeyY" => KeyCode::KeyY,
        "KeyZ" => KeyCode::KeyZ,
        "Digit0" => KeyCode::Digit0,
        "Digit1" => KeyCode::Digit1,
        "Digit2" => KeyCode::Digit2,
        "Digit3" => KeyCode::Digit3,
        "Digit4" => KeyCode::Digit4,
        "Digit5" => KeyCode::Digit5,
        "Digit6" => KeyCode::Digit6,
        "Digit7" => KeyCode::Digit7,
        "Digit8" => KeyCode::Digit8,
        "Digit9" => KeyCode::Digit9,
        "Space" => KeyCode::Space,
        "Enter" => KeyCode::Enter,
        "Tab" => KeyCode::Tab,
        "ShiftLeft" => KeyCode::ShiftLeft,
        "ShiftRight" => KeyCode::ShiftRight,
        "ControlLeft" => KeyCode::ControlLeft,
        "ControlRight" => KeyCode::ControlRight,
        "AltLeft" => KeyCode::AltLeft,
        "AltRight" => KeyCode::AltRight,
        "ArrowUp" => KeyCode::ArrowUp,
        "ArrowDown" => KeyCode::ArrowDown,
        "ArrowLeft" => KeyCode::ArrowLeft,
        "ArrowRight" => KeyCode::ArrowRight,
        _ => return None,
    })
}
