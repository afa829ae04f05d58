//! Simulated bodies and verlet integration
//!
//! Bodies are point/disc entities stepped with velocity-free Störmer-Verlet
//! integration: the next position comes from the previous two positions plus
//! accumulated force, with no explicit velocity state. Orientation uses the
//! rotational analogue on [`Rotor`]s and is renormalized after every step.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::rotor::Rotor;
use crate::config::SimConfig;

/// Stable handle for a body, indexing the world's insertion-ordered table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct BodyId(pub u32);

impl BodyId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Guest action bitflags (wire values for `send_actions`)
pub mod action_flags {
    pub const THRUST: i32 = 0b0001;
    pub const LEFT: i32 = 0b0010;
    pub const RIGHT: i32 = 0b0100;
    pub const SHOOT: i32 = 0b1000;
    /// Any bit outside this mask is a protocol violation
    pub const ALL: i32 = THRUST | LEFT | RIGHT | SHOOT;
}

/// A validated per-tick command, consumed during force application.
///
/// Every tick starts from [`Action::Idle`]; a bot that reports nothing moves
/// under physics alone. Previous actions are never carried over.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Action {
    /// No command this tick (the safe default)
    #[default]
    Idle,
    /// Discrete ship controls decoded from action bitflags
    Ship {
        thrust: bool,
        left: bool,
        right: bool,
        shoot: bool,
    },
    /// Continuous acceleration, already clamped to the configured maximum
    Accel(Vec2),
}

impl Action {
    /// Whether this action requests a shot this tick
    pub fn wants_shot(&self) -> bool {
        matches!(self, Action::Ship { shoot: true, .. })
    }
}

/// A simulated point/disc with position, orientation, mass, inertia, radius.
///
/// Owned exclusively by the world; sandboxes only ever see value snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    /// Position at the end of the previous step
    pub old_pos: Vec2,
    /// Current position
    pub pos: Vec2,
    /// Orientation at the end of the previous step
    pub old_rot: Rotor,
    /// Current orientation (unit magnitude)
    pub rot: Rotor,
    /// Force accumulated this tick, cleared by integration
    pub force: Vec2,
    /// Torque accumulated this tick, cleared by integration
    pub torque: f32,
    pub mass: f32,
    pub inertia: f32,
    pub radius: f32,
}

impl Body {
    /// A unit-mass body at rest at `pos`, facing +X.
    pub fn new(pos: Vec2) -> Self {
        Self {
            old_pos: pos,
            pos,
            old_rot: Rotor::IDENTITY,
            rot: Rotor::IDENTITY,
            force: Vec2::ZERO,
            torque: 0.0,
            mass: 1.0,
            inertia: 1.0,
            radius: 0.05,
        }
    }

    /// Implicit velocity from the two stored positions
    #[inline]
    pub fn velocity(&self, dt: f32) -> Vec2 {
        (self.pos - self.old_pos) / dt
    }

    /// Rewrite the implicit velocity by moving `old_pos`. Used by collision
    /// response and damping, which think in velocities.
    #[inline]
    pub fn set_velocity(&mut self, vel: Vec2, dt: f32) {
        self.old_pos = self.pos - vel * dt;
    }

    #[inline]
    pub fn clear_forces(&mut self) {
        self.force = Vec2::ZERO;
        self.torque = 0.0;
    }

    #[inline]
    pub fn add_force(&mut self, force: Vec2) {
        self.force += force;
    }

    #[inline]
    pub fn add_torque(&mut self, torque: f32) {
        self.torque += torque;
    }

    /// Geometric midpoint orientation between `old_rot` and `rot`.
    ///
    /// Thrust is applied along this heading rather than either endpoint,
    /// which keeps the thrust direction consistent with the verlet scheme's
    /// implicit mid-step velocity.
    #[inline]
    pub fn heading_mid(&self) -> Rotor {
        self.old_rot * (self.rot * self.old_rot.conjugate()).sqrt()
    }

    /// Convert a validated action into forces/torques for this tick.
    /// `shoot` has no physics effect; the orchestrator records it.
    pub fn apply_action(&mut self, action: &Action, config: &SimConfig) {
        match *action {
            Action::Idle => {}
            Action::Ship {
                thrust,
                left,
                right,
                ..
            } => {
                if thrust {
                    self.add_force(self.heading_mid().as_vec2() * config.thrust);
                }
                if left {
                    self.add_torque(config.torque);
                }
                if right {
                    self.add_torque(-config.torque);
                }
            }
            Action::Accel(accel) => {
                self.add_force(accel * self.mass);
            }
        }
    }

    /// Advance one verlet step and clear accumulated forces.
    ///
    /// Returns `false` when the resulting position or orientation is no
    /// longer finite/unit-magnitude. That is fatal to the match; the caller
    /// must not keep stepping a body in that state.
    #[must_use]
    pub fn integrate(&mut self, dt: f32) -> bool {
        let accel = self.force / self.mass;
        let next_pos = 2.0 * self.pos - self.old_pos + accel * dt * dt;

        let rot_accel = self.torque / self.inertia;
        let next_rot = (self.rot * self.rot * self.old_rot.conjugate()
            * Rotor::from_angle(rot_accel * dt * dt))
        .renormalized();

        self.old_pos = self.pos;
        self.pos = next_pos;
        self.old_rot = self.rot;
        self.clear_forces();

        match next_rot {
            Some(rot) => self.rot = rot,
            None => return false,
        }
        self.pos.is_finite() && self.rot.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_force_is_straight_line() {
        let mut body = Body::new(Vec2::new(1.0, 2.0));
        body.old_pos = Vec2::new(0.9, 1.95);
        let step_before = body.pos - body.old_pos;

        assert!(body.integrate(1.0 / 60.0));
        let step_after = body.pos - body.old_pos;
        assert!((step_after - step_before).length() < 1e-7);
    }

    #[test]
    fn test_integration_clears_forces() {
        let mut body = Body::new(Vec2::ZERO);
        body.add_force(Vec2::new(1.0, 0.0));
        body.add_torque(0.5);
        assert!(body.integrate(0.1));
        assert_eq!(body.force, Vec2::ZERO);
        assert_eq!(body.torque, 0.0);
    }

    #[test]
    fn test_verlet_position_update() {
        // pos' = 2*pos - old_pos + accel*dt²
        let mut body = Body::new(Vec2::new(0.5, 0.0));
        body.old_pos = Vec2::new(0.4, 0.0);
        body.mass = 2.0;
        body.add_force(Vec2::new(4.0, 0.0)); // accel = 2
        assert!(body.integrate(1.0));
        assert!((body.pos.x - (2.0 * 0.5 - 0.4 + 2.0)).abs() < 1e-6);
    }

    #[test]
    fn test_thrust_with_identity_heading() {
        // old_rot == rot == identity → thrust is exactly +X
        let mut body = Body::new(Vec2::ZERO);
        let config = SimConfig::default();
        body.apply_action(
            &Action::Ship {
                thrust: true,
                left: false,
                right: false,
                shoot: false,
            },
            &config,
        );
        assert!((body.force.x - config.thrust).abs() < 1e-6);
        assert!(body.force.y.abs() < 1e-7);
    }

    #[test]
    fn test_thrust_uses_midpoint_heading() {
        let mut body = Body::new(Vec2::ZERO);
        body.old_rot = Rotor::from_angle(0.0);
        body.rot = Rotor::from_angle(0.8);
        let mid = body.heading_mid();
        assert!((mid.angle() - 0.4).abs() < 1e-5);

        let config = SimConfig::default();
        body.apply_action(
            &Action::Ship {
                thrust: true,
                left: false,
                right: false,
                shoot: false,
            },
            &config,
        );
        let dir = body.force.normalize();
        assert!((dir.x - 0.4f32.cos()).abs() < 1e-5);
        assert!((dir.y - 0.4f32.sin()).abs() < 1e-5);
    }

    #[test]
    fn test_accel_action_scales_by_mass() {
        let mut body = Body::new(Vec2::ZERO);
        body.mass = 3.0;
        body.apply_action(&Action::Accel(Vec2::new(0.2, 0.0)), &SimConfig::default());
        assert!((body.force.x - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_set_velocity_roundtrip() {
        let dt = 1.0 / 60.0;
        let mut body = Body::new(Vec2::new(0.3, 0.3));
        body.set_velocity(Vec2::new(-1.0, 0.5), dt);
        assert!((body.velocity(dt) - Vec2::new(-1.0, 0.5)).length() < 1e-5);
    }

    #[test]
    fn test_non_finite_position_detected() {
        let mut body = Body::new(Vec2::ZERO);
        body.add_force(Vec2::new(f32::NAN, 0.0));
        assert!(!body.integrate(0.1));
    }

    proptest! {
        #[test]
        fn prop_zero_force_preserves_step(
            px in -10.0f32..10.0, py in -10.0f32..10.0,
            vx in -5.0f32..5.0, vy in -5.0f32..5.0,
            steps in 1usize..50,
        ) {
            let dt = 1.0 / 60.0;
            let mut body = Body::new(Vec2::new(px, py));
            body.set_velocity(Vec2::new(vx, vy), dt);
            let step = body.pos - body.old_pos;
            for _ in 0..steps {
                prop_assert!(body.integrate(dt));
                prop_assert!((body.pos - body.old_pos - step).length() < 1e-4);
            }
        }

        #[test]
        fn prop_orientation_stays_unit(
            torques in proptest::collection::vec(-2.0f32..2.0, 1..100),
        ) {
            let dt = 1.0 / 60.0;
            let mut body = Body::new(Vec2::ZERO);
            for torque in torques {
                body.add_torque(torque);
                prop_assert!(body.integrate(dt));
                prop_assert!((body.rot.magnitude() - 1.0).abs() < 1e-6);
            }
        }
    }
}
