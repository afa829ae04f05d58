//! Gravbots - a deterministic gravity arena for sandboxed bot programs
//!
//! Core modules:
//! - `sim`: Deterministic simulation (verlet physics, gravity, perception)
//! - `sandbox`: Resource-bounded execution of untrusted bot programs
//! - `config`: Data-driven match configuration
//! - `error`: Setup, load, and match fault taxonomy
//!
//! Untrusted control programs steer bodies through a shared 2D world, one
//! invocation per simulation tick. The orchestration loop is synchronous and
//! single-threaded; sandbox calls are the only operations that may block, and
//! every fault they can raise is converted into a typed, per-tick outcome.

pub mod config;
pub mod error;
pub mod sandbox;
pub mod sim;

pub use config::SimConfig;
pub use error::{LoadError, MatchError, SetupError};

use glam::Vec2;

/// Shared simulation constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;

    /// Distance floor for pairwise gravity (avoids singular forces)
    pub const EPS: f32 = 1e-5;

    /// Determinant floor below which a ray and a wall count as parallel
    pub const RAY_DET_EPS: f32 = 1e-12;

    /// Default gravitational constant
    pub const GRAVITY_CONST: f32 = 1.0;

    /// Default forward thrust magnitude
    pub const THRUST: f32 = 0.5;

    /// Default turning torque magnitude
    pub const TORQUE: f32 = 0.3;

    /// Default cap on guest-commanded acceleration
    pub const MAX_ACCEL: f32 = 0.5;

    /// Default per-tick velocity damping base
    pub const DAMPING: f32 = 0.8;

    /// Default vision cone half-angle (radians)
    pub const VISION_HALF_ANGLE: f32 = 0.9;

    /// Default vision reach
    pub const VISION_REACH: f32 = 1.5;

    /// Arena half-extent for the default square boundary
    pub const ARENA_HALF_EXTENT: f32 = 1.0;
}

/// Convert polar (r, theta) to cartesian (x, y)
#[inline]
pub fn polar_to_cartesian(r: f32, theta: f32) -> Vec2 {
    Vec2::new(r * theta.cos(), r * theta.sin())
}
