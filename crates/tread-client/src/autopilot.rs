//! Scripted driving for headless runs.
//!
//! [`Autopilot`] replays an eight second loop through the input sampler:
//! drive forward, arc right, reverse, turn left, idle. The trigger is tapped
//! every second and the turret sweeps a full circle every four seconds. It
//! goes through the same key and pointer paths as a player, so change
//! detection and rate limiting apply unchanged.

use std::f32::consts::TAU;

use glam::Vec2;
use tread_input::{InputSampler, PointerEvent, RawKeyEvent};
use winit::keyboard::KeyCode;

/// Length of one loop of the pattern.
pub const CYCLE_MS: u64 = 8000;
/// Turret sweep period.
pub const SWEEP_PERIOD_MS: u64 = 4000;

const FIRE_PERIOD_MS: u64 = 1000;
const FIRE_HOLD_MS: u64 = 100;

#[derive(Debug, Clone, Default)]
pub struct Autopilot {
    started_at: Option<u64>,
    held: Vec<KeyCode>,
}

impl Autopilot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the script to `now_ms` and feed the result to `sampler`.
    pub fn step(&mut self, now_ms: u64, sampler: &mut InputSampler) {
        let start = *self.started_at.get_or_insert(now_ms);
        let elapsed = now_ms.saturating_sub(start);

        let wanted = keys_at(elapsed);
        for code in &self.held {
            if !wanted.contains(code) {
                sampler.on_key(RawKeyEvent::release(*code));
            }
        }
        for code in &wanted {
            if !self.held.contains(code) {
                sampler.on_key(RawKeyEvent::press(*code));
            }
        }
        self.held = wanted;

        let surface = sampler.surface();
        let reach = surface.max_offset() * 0.8;
        sampler.on_pointer(PointerEvent {
            position: surface.center() + Vec2::from_angle(turret_angle_at(elapsed)) * reach,
            movement: Vec2::ZERO,
        });
    }

    /// Release everything the script is holding.
    pub fn stop(&mut self, sampler: &mut InputSampler) {
        for code in self.held.drain(..) {
            sampler.on_key(RawKeyEvent::release(code));
        }
        self.started_at = None;
    }
}

/// Keys held `elapsed_ms` into the script.
pub fn keys_at(elapsed_ms: u64) -> Vec<KeyCode> {
    let mut keys = match elapsed_ms % CYCLE_MS {
        0..2000 => vec![KeyCode::KeyW],
        2000..3500 => vec![KeyCode::KeyW, KeyCode::KeyD],
        3500..5000 => vec![KeyCode::KeyS],
        5000..6500 => vec![KeyCode::KeyA],
        _ => Vec::new(),
    };
    if elapsed_ms % FIRE_PERIOD_MS < FIRE_HOLD_MS {
        keys.push(KeyCode::Space);
    }
    keys
}

/// Turret target angle `elapsed_ms` into the script, in `[0, TAU)`.
pub fn turret_angle_at(elapsed_ms: u64) -> f32 {
    (elapsed_ms % SWEEP_PERIOD_MS) as f32 / SWEEP_PERIOD_MS as f32 * TAU
}

#[cfg(test)]
mod tests {
    use super::*;
    use tread_input::{KeyMap, SurfaceRect};

    fn sampler() -> InputSampler {
        InputSampler::new(KeyMap::default(), SurfaceRect::sized(800.0, 600.0))
    }

    #[test]
    fn test_script_phases() {
        assert_eq!(keys_at(500), vec![KeyCode::KeyW]);
        assert_eq!(keys_at(2500), vec![KeyCode::KeyW, KeyCode::KeyD]);
        assert_eq!(keys_at(4000), vec![KeyCode::KeyS, KeyCode::Space]);
        assert_eq!(keys_at(7500), Vec::<KeyCode>::new());
        assert_eq!(keys_at(CYCLE_MS + 500), keys_at(500));
    }

    #[test]
    fn test_drives_the_sampler() {
        let mut pilot = Autopilot::new();
        let mut s = sampler();

        pilot.step(10_000, &mut s);
        let state = s.state();
        assert!(state.forward && state.fire);
        assert!(state.has_changes);

        pilot.step(10_500, &mut s);
        let state = s.state();
        assert!(state.forward && !state.fire);
        assert!((state.turret_angle - turret_angle_at(500)).abs() < 1e-3);
    }

    #[test]
    fn test_steady_phase_makes_no_key_changes() {
        let mut pilot = Autopilot::new();
        let mut s = sampler();
        pilot.step(0, &mut s);
        pilot.step(200, &mut s);
        let seq = s.sequence_number();

        // Same keys and a sub-threshold turret move.
        pilot.step(201, &mut s);
        assert_eq!(s.sequence_number(), seq);
    }

    #[test]
    fn test_stop_releases_keys() {
        let mut pilot = Autopilot::new();
        let mut s = sampler();
        pilot.step(0, &mut s);
        pilot.step(2500, &mut s);
        assert!(s.state().rotate_right);

        pilot.stop(&mut s);
        let state = s.state();
        assert!(!state.forward && !state.rotate_right && !state.fire);
    }
}
