//! Match configuration
//!
//! A [`SimConfig`] is immutable for the lifetime of a match. It round-trips
//! through JSON so tournaments can pin the exact rules a replay was recorded
//! under.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::SetupError;
use crate::sandbox::{InstancePolicy, ResourceBudget};

/// Axis-aligned world boundary rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Square boundary centered on the origin
    pub fn centered(half_extent: f32) -> Self {
        Self {
            min: Vec2::splat(-half_extent),
            max: Vec2::splat(half_extent),
        }
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// The four wall segments, in a fixed order (bottom, right, top, left).
    /// Perception iterates these in order, so the order is part of the
    /// determinism contract.
    pub fn walls(&self) -> [(Vec2, Vec2); 4] {
        let bl = self.min;
        let br = Vec2::new(self.max.x, self.min.y);
        let tr = self.max;
        let tl = Vec2::new(self.min.x, self.max.y);
        [(bl, br), (br, tr), (tr, tl), (tl, bl)]
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::centered(ARENA_HALF_EXTENT)
    }
}

/// Complete rules for one match (immutable once the match starts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Pairwise gravitational constant
    pub gravity_const: f32,
    /// Forward thrust force magnitude for discrete ship controls
    pub thrust: f32,
    /// Turning torque magnitude for discrete ship controls
    pub torque: f32,
    /// Cap on guest-commanded acceleration magnitude
    pub max_accel: f32,
    /// Per-tick velocity damping base (applied as damping^dt)
    pub damping: f32,
    /// Vision cone half-angle in radians
    pub vision_half_angle: f32,
    /// Vision reach (bodies farther away are invisible)
    pub vision_reach: f32,
    /// World boundary rectangle
    pub bounds: Bounds,
    /// Fixed simulation timestep
    pub dt: f32,
    /// Match seed (spawn placement; never exposed to guests)
    pub seed: u64,
    /// Per-invocation resource budget, re-issued in full every tick
    pub budget: ResourceBudget,
    /// Whether each bot keeps one sandbox instance for the whole match
    pub instance_policy: InstancePolicy,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            gravity_const: GRAVITY_CONST,
            thrust: THRUST,
            torque: TORQUE,
            max_accel: MAX_ACCEL,
            damping: DAMPING,
            vision_half_angle: VISION_HALF_ANGLE,
            vision_reach: VISION_REACH,
            bounds: Bounds::default(),
            dt: SIM_DT,
            seed: 0,
            budget: ResourceBudget::default(),
            instance_policy: InstancePolicy::Persistent,
        }
    }
}

impl SimConfig {
    /// Check the invariants that are fatal to get wrong. Violations here are
    /// configuration bugs, not runtime faults, and abort match setup.
    pub fn validate(&self) -> Result<(), SetupError> {
        if !(self.dt > 0.0) {
            return Err(SetupError::NonPositiveTimestep(self.dt));
        }
        if !(self.damping > 0.0 && self.damping <= 1.0) {
            return Err(SetupError::DampingOutOfRange(self.damping));
        }
        if !(self.vision_reach > 0.0) {
            return Err(SetupError::NonPositiveVisionReach(self.vision_reach));
        }
        if !(self.bounds.min.x < self.bounds.max.x && self.bounds.min.y < self.bounds.max.y) {
            return Err(SetupError::DegenerateBounds);
        }
        Ok(())
    }

    /// Load a config from a JSON file, falling back to defaults on error.
    pub fn load(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Bad config {}: {e}; using defaults", path.display());
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("Using default config");
                Self::default()
            }
        }
    }

    /// Save the config as pretty JSON.
    pub fn save(&self, path: &std::path::Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).expect("config serializes");
        std::fs::write(path, json)
    }
}
