//! Edge-triggered input sampling with change detection.
//!
//! [`InputSampler`] turns device events into an [`InputState`]. Discrete
//! controls are recomputed from the held-key set on every press/release;
//! the turret angle is recomputed on every pointer move. Each observed change
//! (a discrete control flipping, or the angle moving further than the
//! threshold from its value at the last change) sets `has_changes` and bumps
//! `sequence_number` by one. `has_changes` stays set until
//! [`reset_changes`](InputSampler::reset_changes) is called, so a change is
//! never lost before it is transmitted.

use crate::aim::{AimMode, PointerEvent, SurfaceRect};
use crate::bindings::{KeyMap, TankAction};
use crate::keyboard::{KeyboardState, RawKeyEvent};

/// Minimum turret rotation, in radians, that counts as a change (~2.9°).
pub const ANGLE_CHANGE_THRESHOLD: f32 = 0.05;

/// Snapshot of the local controls.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputState {
    pub forward: bool,
    pub backward: bool,
    pub rotate_left: bool,
    pub rotate_right: bool,
    pub fire: bool,
    /// Radians.
    pub turret_angle: f32,
    /// Set by any change, cleared only by `reset_changes`.
    pub has_changes: bool,
    /// Incremented once per observed change.
    pub sequence_number: u32,
}

impl InputState {
    fn buttons(&self) -> [bool; 5] {
        [
            self.forward,
            self.backward,
            self.rotate_left,
            self.rotate_right,
            self.fire,
        ]
    }

    fn set(&mut self, action: TankAction, value: bool) {
        match action {
            TankAction::Forward => self.forward = value,
            TankAction::Backward => self.backward = value,
            TankAction::RotateLeft => self.rotate_left = value,
            TankAction::RotateRight => self.rotate_right = value,
            TankAction::Fire => self.fire = value,
        }
    }
}

/// Captures keyboard and pointer input for the local tank.
#[derive(Debug, Clone)]
pub struct InputSampler {
    keyboard: KeyboardState,
    bindings: KeyMap,
    aim: AimMode,
    surface: SurfaceRect,
    angle_threshold: f32,
    current: InputState,
    /// State as of the last recorded change.
    previous: InputState,
}

impl Default for InputSampler {
    fn default() -> Self {
        Self::new(KeyMap::default(), SurfaceRect::default())
    }
}

impl InputSampler {
    pub fn new(bindings: KeyMap, surface: SurfaceRect) -> Self {
        Self {
            keyboard: KeyboardState::new(),
            bindings,
            aim: AimMode::default(),
            surface,
            angle_threshold: ANGLE_CHANGE_THRESHOLD,
            current: InputState::default(),
            previous: InputState::default(),
        }
    }

    /// Override the angle change threshold (radians).
    pub fn with_angle_threshold(mut self, threshold: f32) -> Self {
        self.angle_threshold = threshold;
        self
    }

    /// Feed a key press or release. Returns `true` if it produced a change.
    pub fn on_key(&mut self, event: RawKeyEvent) -> bool {
        if !self.keyboard.process_raw(event) {
            return false;
        }
        self.recompute_buttons()
    }

    /// Release every key, e.g. on focus loss.
    pub fn release_all(&mut self) -> bool {
        if !self.keyboard.clear() {
            return false;
        }
        self.recompute_buttons()
    }

    /// Feed a pointer move. Returns `true` if it produced a change.
    pub fn on_pointer(&mut self, event: PointerEvent) -> bool {
        let angle = self.aim.apply(&event, &self.surface);
        self.current.turret_angle = angle;
        if (angle - self.previous.turret_angle).abs() > self.angle_threshold {
            self.record_change();
            true
        } else {
            false
        }
    }

    /// Switch between locked (relative) and unlocked (absolute) aiming.
    pub fn set_pointer_locked(&mut self, locked: bool) {
        if locked == self.aim.is_locked() {
            return;
        }
        if locked {
            self.aim.lock(&self.surface);
            tracing::debug!("Pointer locked");
        } else {
            self.aim.unlock();
            tracing::debug!("Pointer unlocked");
        }
    }

    pub fn is_pointer_locked(&self) -> bool {
        self.aim.is_locked()
    }

    /// Update the input surface, e.g. after a resize.
    pub fn set_surface(&mut self, surface: SurfaceRect) {
        self.surface = surface;
    }

    pub fn surface(&self) -> SurfaceRect {
        self.surface
    }

    /// Copy of the current state.
    pub fn state(&self) -> InputState {
        self.current
    }

    /// Clear `has_changes` only.
    pub fn reset_changes(&mut self) {
        self.current.has_changes = false;
    }

    pub fn sequence_number(&self) -> u32 {
        self.current.sequence_number
    }

    pub fn bindings(&self) -> &KeyMap {
        &self.bindings
    }

    fn recompute_buttons(&mut self) -> bool {
        for action in TankAction::ALL {
            self.current.set(action, false);
        }
        for code in self.keyboard.held() {
            if let Some(action) = self.bindings.action_for(code) {
                self.current.set(action, true);
            }
        }
        if self.current.buttons() != self.previous.buttons() {
            self.record_change();
            true
        } else {
            false
        }
    }

    fn record_change(&mut self) {
        self.current.has_changes = true;
        self.current.sequence_number = self.current.sequence_number.wrapping_add(1);
        self.previous = self.current;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use winit::keyboard::KeyCode;

    fn at(x: f32, y: f32) -> PointerEvent {
        PointerEvent {
            position: Vec2::new(x, y),
            movement: Vec2::ZERO,
        }
    }

    fn sampler() -> InputSampler {
        InputSampler::new(KeyMap::default(), SurfaceRect::sized(800.0, 600.0))
    }

    #[test]
    fn test_toggle_key_changes_on_both_edges() {
        let mut s = sampler();
        assert!(s.on_key(RawKeyEvent::press(KeyCode::KeyW)));
        let pressed = s.state();
        assert!(pressed.forward && pressed.has_changes);
        assert_eq!(pressed.sequence_number, 1);

        s.reset_changes();
        assert!(s.on_key(RawKeyEvent::release(KeyCode::KeyW)));
        let released = s.state();
        assert!(!released.forward && released.has_changes);
        assert_eq!(released.sequence_number, 2);
    }

    #[test]
    fn test_no_transition_no_sequence_bump() {
        let mut s = sampler();
        s.on_key(RawKeyEvent::press(KeyCode::KeyW));
        let before = s.sequence_number();

        assert!(!s.on_key(RawKeyEvent::press(KeyCode::KeyW)));
        let repeat = RawKeyEvent {
            repeat: true,
            ..RawKeyEvent::press(KeyCode::KeyW)
        };
        assert!(!s.on_key(repeat));
        assert!(!s.on_key(RawKeyEvent::release(KeyCode::KeyS)));
        assert!(!s.on_key(RawKeyEvent::press(KeyCode::KeyQ)), "unmapped key");
        assert_eq!(s.sequence_number(), before);
    }

    #[test]
    fn test_two_keys_for_one_action() {
        let mut bindings = KeyMap::default();
        bindings.bind(KeyCode::ArrowUp, TankAction::Forward);
        let mut s = InputSampler::new(bindings, SurfaceRect::sized(800.0, 600.0));

        s.on_key(RawKeyEvent::press(KeyCode::KeyW));
        assert!(!s.on_key(RawKeyEvent::press(KeyCode::ArrowUp)));
        assert!(!s.on_key(RawKeyEvent::release(KeyCode::KeyW)), "still held");
        assert!(s.state().forward);
        assert!(s.on_key(RawKeyEvent::release(KeyCode::ArrowUp)));
        assert!(!s.state().forward);
    }

    #[test]
    fn test_reset_changes_keeps_controls() {
        let mut s = sampler();
        s.on_key(RawKeyEvent::press(KeyCode::Space));
        s.on_pointer(at(800.0, 300.0));
        let before = s.state();
        s.reset_changes();
        let after = s.state();
        assert!(!after.has_changes);
        assert_eq!(after.fire, before.fire);
        assert_eq!(after.turret_angle, before.turret_angle);
        assert_eq!(after.sequence_number, before.sequence_number);
    }

    #[test]
    fn test_small_angle_moves_are_not_changes() {
        let mut s = sampler();
        // Centre (400, 300). Straight right is angle 0, the starting value.
        assert!(!s.on_pointer(at(700.0, 300.0)));
        // atan2(3, 300) ≈ 0.01 rad.
        assert!(!s.on_pointer(at(700.0, 303.0)));
        assert_eq!(s.sequence_number(), 0);
        assert!(!s.state().has_changes);
        assert!(s.state().turret_angle > 0.0, "angle still tracks the pointer");
    }

    #[test]
    fn test_creeping_angle_eventually_counts() {
        let mut s = sampler();
        let mut changes = 0;
        // 0.015 rad steps: changes land at 0.06 and 0.12, each measured
        // from the angle at the previous change.
        for i in 1..=9 {
            let angle = i as f32 * 0.015;
            let x = 400.0 + 300.0 * angle.cos();
            let y = 300.0 + 300.0 * angle.sin();
            if s.on_pointer(at(x, y)) {
                changes += 1;
            }
        }
        assert_eq!(changes, 2);
        assert_eq!(s.sequence_number(), 2);
    }

    #[test]
    fn test_large_angle_change_bumps_sequence() {
        let mut s = sampler();
        assert!(s.on_pointer(at(400.0, 600.0)));
        let state = s.state();
        assert!(state.has_changes);
        assert_eq!(state.sequence_number, 1);
        assert!((state.turret_angle - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_locked_pointer_uses_movement() {
        let mut s = sampler();
        s.on_pointer(at(400.0, 0.0)); // straight up: offset (0, -300)
        s.set_pointer_locked(true);
        assert!(s.is_pointer_locked());

        // Seeded offset (0, -300); move right 300 → (300, -300), angle -π/4.
        assert!(s.on_pointer(PointerEvent {
            position: Vec2::ZERO,
            movement: Vec2::new(300.0, 0.0),
        }));
        assert!((s.state().turret_angle + std::f32::consts::FRAC_PI_4).abs() < 1e-5);

        s.set_pointer_locked(false);
        assert!(!s.is_pointer_locked());
    }

    #[test]
    fn test_release_all_clears_controls() {
        let mut s = sampler();
        s.on_key(RawKeyEvent::press(KeyCode::KeyA));
        s.on_key(RawKeyEvent::press(KeyCode::KeyW));
        assert!(s.release_all());
        let state = s.state();
        assert!(!state.forward && !state.rotate_left);
        assert!(!s.release_all());
    }
}
