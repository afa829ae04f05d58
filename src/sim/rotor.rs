//! Unit-magnitude 2D rotation type
//!
//! Orientation is a first-class value with an explicit unit-magnitude
//! invariant, not a bare angle or an ad-hoc complex number. Every operation
//! that could drift the magnitude goes through [`Rotor::renormalized`], and a
//! zero-magnitude result is reported to the caller instead of silently
//! propagating.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// A rotation in the plane, stored as the unit vector (cos θ, sin θ).
///
/// Composition is complex multiplication; `conjugate` inverts; `sqrt` halves
/// the rotation angle along the short arc.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rotor {
    re: f32,
    im: f32,
}

impl Rotor {
    /// The zero rotation
    pub const IDENTITY: Rotor = Rotor { re: 1.0, im: 0.0 };

    /// Rotor for a rotation of `angle` radians
    #[inline]
    pub fn from_angle(angle: f32) -> Self {
        Self {
            re: angle.cos(),
            im: angle.sin(),
        }
    }

    /// Build from raw components, renormalizing. `None` if the input has no
    /// usable direction (zero or non-finite magnitude).
    pub fn from_components(re: f32, im: f32) -> Option<Self> {
        Rotor { re, im }.renormalized()
    }

    #[inline]
    pub fn re(&self) -> f32 {
        self.re
    }

    #[inline]
    pub fn im(&self) -> f32 {
        self.im
    }

    /// The rotation angle in [-π, π]
    #[inline]
    pub fn angle(&self) -> f32 {
        self.im.atan2(self.re)
    }

    /// The heading this rotor points along (the rotated +X axis)
    #[inline]
    pub fn as_vec2(&self) -> Vec2 {
        Vec2::new(self.re, self.im)
    }

    /// Apply the rotation to a vector
    #[inline]
    pub fn rotate(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.re * v.x - self.im * v.y, self.im * v.x + self.re * v.y)
    }

    /// The inverse rotation
    #[inline]
    pub fn conjugate(&self) -> Self {
        Self {
            re: self.re,
            im: -self.im,
        }
    }

    /// Signed angle from `self` to `other` in [-π, π]
    #[inline]
    pub fn angle_to(&self, other: Rotor) -> f32 {
        (self.conjugate() * other).angle()
    }

    #[inline]
    pub fn magnitude(&self) -> f32 {
        (self.re * self.re + self.im * self.im).sqrt()
    }

    /// Rescale to unit magnitude. `None` when the magnitude is zero or
    /// non-finite; for simulation state that is an unrecoverable invariant
    /// violation the caller must surface.
    pub fn renormalized(&self) -> Option<Self> {
        let mag = self.magnitude();
        if !mag.is_finite() || mag < f32::EPSILON {
            return None;
        }
        Some(Self {
            re: self.re / mag,
            im: self.im / mag,
        })
    }

    /// Half-angle rotor along the short arc.
    ///
    /// For the midpoint-heading computation the input is a relative rotation
    /// between two consecutive orientations, so the short arc is always the
    /// intended branch.
    pub fn sqrt(&self) -> Self {
        let re = ((1.0 + self.re) * 0.5).max(0.0).sqrt();
        let im = ((1.0 - self.re) * 0.5).max(0.0).sqrt();
        let im = if self.im < 0.0 { -im } else { im };
        // Unit in exact arithmetic; renormalize to keep the invariant tight.
        Rotor { re, im }.renormalized().unwrap_or(Rotor::IDENTITY)
    }

    pub fn is_finite(&self) -> bool {
        self.re.is_finite() && self.im.is_finite()
    }
}

impl std::ops::Mul for Rotor {
    type Output = Rotor;

    #[inline]
    fn mul(self, rhs: Rotor) -> Rotor {
        Rotor {
            re: self.re * rhs.re - self.im * rhs.im,
            im: self.re * rhs.im + self.im * rhs.re,
        }
    }
}

impl Default for Rotor {
    fn default() -> Self {
        Rotor::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_from_angle_roundtrip() {
        for angle in [-3.0f32, -FRAC_PI_2, 0.0, 0.7, FRAC_PI_2, 3.0] {
            let r = Rotor::from_angle(angle);
            assert!((r.angle() - angle).abs() < 1e-6);
            assert!((r.magnitude() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_rotate_quarter_turn() {
        let r = Rotor::from_angle(FRAC_PI_2);
        let v = r.rotate(Vec2::X);
        assert!(v.x.abs() < 1e-6);
        assert!((v.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_conjugate_inverts() {
        let r = Rotor::from_angle(0.8);
        let id = r * r.conjugate();
        assert!((id.re() - 1.0).abs() < 1e-6);
        assert!(id.im().abs() < 1e-6);
    }

    #[test]
    fn test_sqrt_halves_angle() {
        for angle in [-2.5f32, -0.4, 0.0, 0.4, 1.3, 3.0] {
            let half = Rotor::from_angle(angle).sqrt();
            assert!((half.angle() - angle / 2.0).abs() < 1e-5, "angle {angle}");
        }
    }

    #[test]
    fn test_sqrt_of_half_turn() {
        // θ = π lands exactly on the branch point; the positive root is taken
        let half = Rotor::from_angle(PI).sqrt();
        assert!((half.angle().abs() - FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_renormalized_rejects_degenerate() {
        assert!(Rotor { re: 0.0, im: 0.0 }.renormalized().is_none());
        assert!(
            Rotor {
                re: f32::NAN,
                im: 0.0
            }
            .renormalized()
            .is_none()
        );
        let r = Rotor { re: 3.0, im: 4.0 }.renormalized().unwrap();
        assert!((r.magnitude() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_angle_to_is_signed() {
        let a = Rotor::from_angle(0.2);
        let b = Rotor::from_angle(1.0);
        assert!((a.angle_to(b) - 0.8).abs() < 1e-6);
        assert!((b.angle_to(a) + 0.8).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn prop_composition_stays_unit(angles in proptest::collection::vec(-PI..PI, 1..64)) {
            let mut r = Rotor::IDENTITY;
            for a in angles {
                r = (r * Rotor::from_angle(a)).renormalized().unwrap();
            }
            prop_assert!((r.magnitude() - 1.0).abs() < 1e-6);
        }
    }
}
