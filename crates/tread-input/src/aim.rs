//! Turret aim from pointer input.
//!
//! Two strategies, selected by [`AimMode`]:
//!
//! - **Locked** ([`RelativeAim`]): the pointer is captured and only reports
//!   movement. Deltas accumulate into an offset from the surface centre whose
//!   length is clamped to half the smaller surface dimension.
//! - **Unlocked** ([`AbsoluteAim`]): the pointer reports a client position,
//!   and the offset is measured from the centre of the surface rectangle.
//!
//! Either way the angle is `atan2(offset.y, offset.x)`.

use glam::Vec2;

/// The input surface's bounding rectangle in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl SurfaceRect {
    /// A `width` × `height` surface at the client origin.
    pub fn sized(width: f32, height: f32) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width,
            height,
        }
    }

    /// Centre in client coordinates.
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    /// Largest offset the locked mode allows.
    pub fn max_offset(&self) -> f32 {
        self.width.min(self.height).max(0.0) / 2.0
    }
}

impl Default for SurfaceRect {
    fn default() -> Self {
        Self::sized(1280.0, 720.0)
    }
}

/// One pointer-move notification.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerEvent {
    /// Client-space position.
    pub position: Vec2,
    /// Movement since the previous event.
    pub movement: Vec2,
}

fn angle_of(offset: Vec2) -> f32 {
    offset.y.atan2(offset.x)
}

/// Accumulates pointer deltas while the pointer is locked.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RelativeAim {
    offset: Vec2,
}

impl RelativeAim {
    /// Start from `offset`, clamped to the surface.
    pub fn seeded(offset: Vec2, surface: &SurfaceRect) -> Self {
        Self {
            offset: offset.clamp_length_max(surface.max_offset()),
        }
    }

    pub fn apply(&mut self, movement: Vec2, surface: &SurfaceRect) -> f32 {
        self.offset = (self.offset + movement).clamp_length_max(surface.max_offset());
        self.angle()
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn angle(&self) -> f32 {
        angle_of(self.offset)
    }
}

/// Tracks the pointer's position relative to the surface centre.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AbsoluteAim {
    offset: Vec2,
}

impl AbsoluteAim {
    pub fn apply(&mut self, position: Vec2, surface: &SurfaceRect) -> f32 {
        self.offset = position - surface.center();
        self.angle()
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn angle(&self) -> f32 {
        angle_of(self.offset)
    }
}

/// Active aim strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AimMode {
    Locked(RelativeAim),
    Unlocked(AbsoluteAim),
}

impl Default for AimMode {
    fn default() -> Self {
        AimMode::Unlocked(AbsoluteAim::default())
    }
}

impl AimMode {
    /// Feed a pointer event and return the new angle in radians.
    pub fn apply(&mut self, event: &PointerEvent, surface: &SurfaceRect) -> f32 {
        match self {
            AimMode::Locked(aim) => aim.apply(event.movement, surface),
            AimMode::Unlocked(aim) => aim.apply(event.position, surface),
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, AimMode::Locked(_))
    }

    /// Switch to locked mode, keeping the current offset so the aim does not
    /// jump.
    pub fn lock(&mut self, surface: &SurfaceRect) {
        if let AimMode::Unlocked(aim) = self {
            *self = AimMode::Locked(RelativeAim::seeded(aim.offset(), surface));
        }
    }

    /// Switch to unlocked mode. The next pointer position sets the offset.
    pub fn unlock(&mut self) {
        if let AimMode::Locked(aim) = self {
            *self = AimMode::Unlocked(AbsoluteAim {
                offset: aim.offset(),
            });
        }
    }

    pub fn offset(&self) -> Vec2 {
        match self {
            AimMode::Locked(aim) => aim.offset(),
            AimMode::Unlocked(aim) => aim.offset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    const EPS: f32 = 1e-5;

    fn surface() -> SurfaceRect {
        SurfaceRect {
            left: 100.0,
            top: 50.0,
            width: 800.0,
            height: 600.0,
        }
    }

    #[test]
    fn test_absolute_angle_from_rect_centre() {
        let mut aim = AbsoluteAim::default();
        // Centre is (500, 350); pointer straight below it.
        let angle = aim.apply(Vec2::new(500.0, 450.0), &surface());
        assert!((angle - FRAC_PI_2).abs() < EPS);
        // Straight left.
        let angle = aim.apply(Vec2::new(400.0, 350.0), &surface());
        assert!((angle - PI).abs() < EPS);
    }

    #[test]
    fn test_relative_offset_is_clamped() {
        let mut aim = RelativeAim::default();
        aim.apply(Vec2::new(10_000.0, 0.0), &surface());
        assert!((aim.offset().length() - 300.0).abs() < EPS);

        // Moving back reduces from the clamped value, not the raw total.
        aim.apply(Vec2::new(-300.0, 10.0), &surface());
        assert!((aim.offset().x).abs() < EPS);
        assert!((aim.angle() - FRAC_PI_2).abs() < EPS);
    }

    #[test]
    fn test_relative_accumulates_deltas() {
        let mut aim = RelativeAim::default();
        aim.apply(Vec2::new(10.0, 0.0), &surface());
        let angle = aim.apply(Vec2::new(0.0, 10.0), &surface());
        assert!((angle - PI / 4.0).abs() < EPS);
    }

    #[test]
    fn test_lock_seeds_offset_and_unlock_keeps_it() {
        let mut mode = AimMode::default();
        let s = surface();
        mode.apply(
            &PointerEvent {
                position: Vec2::new(900.0, 350.0),
                movement: Vec2::ZERO,
            },
            &s,
        );
        mode.lock(&s);
        assert!(mode.is_locked());
        assert!((mode.offset() - Vec2::new(300.0, 0.0)).length() < EPS);

        mode.unlock();
        assert!(!mode.is_locked());
        assert!((mode.offset() - Vec2::new(300.0, 0.0)).length() < EPS);
    }

    #[test]
    fn test_locked_mode_ignores_position() {
        let mut mode = AimMode::Locked(RelativeAim::default());
        let angle = mode.apply(
            &PointerEvent {
                position: Vec2::new(-5_000.0, -5_000.0),
                movement: Vec2::new(0.0, -4.0),
            },
            &surface(),
        );
        assert!((angle + FRAC_PI_2).abs() < EPS);
    }

    #[test]
    fn test_degenerate_surface() {
        let mut aim = RelativeAim::default();
        let angle = aim.apply(Vec2::new(5.0, 5.0), &SurfaceRect::sized(0.0, 0.0));
        assert_eq!(aim.offset(), Vec2::ZERO);
        assert_eq!(angle, 0.0);
    }
}
