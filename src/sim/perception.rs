//! Vision-limited perception
//!
//! Each tick every bot-controlled body gets a filtered, *relative* snapshot
//! of the world: the bodies inside its vision cone and the distance to the
//! nearest boundary wall along its heading. Views are values copied out of
//! the physics state; nothing a sandbox receives aliases live bodies.

use glam::Vec2;

use super::body::{Body, BodyId};
use crate::config::{Bounds, SimConfig};
use crate::consts::{EPS, RAY_DET_EPS};

/// Read-only snapshot of one body as seen from another's origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyView {
    /// Position relative to the observer
    pub rel_pos: Vec2,
    /// Velocity relative to the observer (verlet position-delta proxy)
    pub rel_vel: Vec2,
    /// Heading relative to the observer's heading, radians
    pub rel_heading: f32,
    pub radius: f32,
    pub mass: f32,
}

/// One bot's complete view of the world for a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Perception {
    /// Visible bodies in insertion order
    pub visible: Vec<(BodyId, BodyView)>,
    /// Distance to the nearest boundary wall along the observer's heading
    pub nearest_wall: f32,
}

/// Ray/line intersection distance via the 2×2 determinant solve.
///
/// `dir` must be unit length so `t` is a distance. Returns `None` when the
/// ray is parallel to the wall (determinant near zero) or the intersection
/// lies behind the origin (`t < 0`).
pub fn raycast(origin: Vec2, dir: Vec2, l1: Vec2, l2: Vec2) -> Option<f32> {
    let line_dir = l2 - l1;

    let det = dir.x * (-line_dir.y) - dir.y * (-line_dir.x);
    if det.abs() < RAY_DET_EPS {
        return None;
    }

    let rhs = l1 - origin;
    let t = (rhs.x * (-line_dir.y) - rhs.y * (-line_dir.x)) / det;
    if t < 0.0 {
        return None;
    }
    Some(t)
}

/// Minimum positive ray hit across the four boundary walls.
///
/// The observer is always inside the boundary, so for a valid configuration
/// at least one wall lies ahead; `None` therefore means corrupt state, not a
/// routine miss.
pub fn nearest_wall_distance(origin: Vec2, heading: Vec2, bounds: &Bounds) -> Option<f32> {
    let mut nearest: Option<f32> = None;
    for (start, end) in bounds.walls() {
        if let Some(t) = raycast(origin, heading, start, end) {
            nearest = Some(match nearest {
                Some(best) => best.min(t),
                None => t,
            });
        }
    }
    nearest
}

/// Build the filtered view for `origin`: bodies within `vision_reach` whose
/// bearing is inside the vision cone, plus the nearest-wall distance.
pub fn generate_view(
    origin: BodyId,
    bodies: &[Body],
    config: &SimConfig,
) -> Option<Perception> {
    let observer = &bodies[origin.index()];
    let heading = observer.rot.as_vec2();
    let cos_cone = config.vision_half_angle.cos();
    let observer_vel = observer.velocity(config.dt);

    let mut visible = Vec::new();
    for (index, body) in bodies.iter().enumerate() {
        if index == origin.index() {
            continue;
        }
        let delta = body.pos - observer.pos;
        let dist = delta.length();
        if dist > config.vision_reach {
            continue;
        }
        // Coincident bodies have no bearing; they are trivially in view
        if dist >= EPS && heading.dot(delta / dist) < cos_cone {
            continue;
        }
        visible.push((
            BodyId(index as u32),
            BodyView {
                rel_pos: delta,
                rel_vel: body.velocity(config.dt) - observer_vel,
                rel_heading: observer.rot.angle_to(body.rot),
                radius: body.radius,
                mass: body.mass,
            },
        ));
    }

    let nearest_wall = nearest_wall_distance(observer.pos, heading, &config.bounds)?;
    Some(Perception {
        visible,
        nearest_wall,
    })
}
