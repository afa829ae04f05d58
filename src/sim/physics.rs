//! World-level physics passes
//!
//! Pairwise gravity, disc collision response, drag, and the integration
//! sweep. Every pass iterates bodies in insertion order; gravity summation
//! and collision order affect floating point results, so replay determinism
//! depends on that order never varying.

use super::body::Body;
use crate::consts::EPS;
use crate::error::MatchError;

/// Clear accumulated forces/torques on all bodies (start-of-tick phase).
pub fn clear_forces(bodies: &mut [Body]) {
    for body in bodies {
        body.clear_forces();
    }
}

/// O(n²) pairwise attraction with an epsilon-floored denominator.
///
/// Forces are applied with equal and opposite magnitude to each body of a
/// pair, so the summed force over any pair cancels exactly.
pub fn compute_gravity(bodies: &mut [Body], gravity_const: f32) {
    for i in 0..bodies.len() {
        for j in (i + 1)..bodies.len() {
            let (head, tail) = bodies.split_at_mut(j);
            let a = &mut head[i];
            let b = &mut tail[0];

            let delta = b.pos - a.pos;
            let safe_dist = delta.length().max(EPS);
            let magnitude = gravity_const * a.mass * b.mass / (safe_dist * safe_dist);
            let force = delta / safe_dist * magnitude;

            a.add_force(force);
            b.add_force(-force);
        }
    }
}

/// Resolve overlapping discs with a simplified normal-impulse rule.
///
/// If a pair is approaching along the center line, each body's velocity
/// loses the relative-velocity projection onto the collision normal;
/// tangential velocity is untouched. Separating or tangential pairs are
/// left alone, so post-resolution relative normal velocity is >= 0.
pub fn resolve_collisions(bodies: &mut [Body], dt: f32) {
    for i in 0..bodies.len() {
        for j in (i + 1)..bodies.len() {
            let (head, tail) = bodies.split_at_mut(j);
            let a = &mut head[i];
            let b = &mut tail[0];

            let delta = b.pos - a.pos;
            let dist = delta.length();
            if dist > a.radius + b.radius {
                continue;
            }
            if dist < EPS {
                // Coincident centers have no usable normal
                continue;
            }
            let normal = delta / dist;

            let vel_a = a.velocity(dt);
            let vel_b = b.velocity(dt);
            let approach = (vel_a - vel_b).dot(normal);
            if approach <= 0.0 {
                continue;
            }

            a.set_velocity(vel_a - approach * normal, dt);
            b.set_velocity(vel_b + approach * normal, dt);
        }
    }
}

/// Scale velocities by `damping^dt`, modeling drag.
pub fn apply_damping(bodies: &mut [Body], damping: f32, dt: f32) {
    let factor = damping.powf(dt);
    for body in bodies {
        let vel = body.velocity(dt);
        body.set_velocity(vel * factor, dt);
    }
}

/// Integrate every body, failing the match on non-finite results.
pub fn integrate(bodies: &mut [Body], dt: f32, tick: u64) -> Result<(), MatchError> {
    for (index, body) in bodies.iter_mut().enumerate() {
        if !body.integrate(dt) {
            return Err(MatchError::NonFinitePhysics { body: index, tick });
        }
    }
    Ok(())
}

/// Force magnitude between two masses at `distance`, as used by
/// [`compute_gravity`]. Exposed for tests and tooling.
#[inline]
pub fn attraction_magnitude(gravity_const: f32, mass_a: f32, mass_b: f32, distance: f32) -> f32 {
    let safe = distance.max(EPS);
    gravity_const * mass_a * mass_b / (safe * safe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn body_at(x: f32, y: f32) -> Body {
        Body::new(Vec2::new(x, y))
    }

    #[test]
    fn test_gravity_is_symmetric() {
        let mut bodies = vec![body_at(-0.5, 0.0), body_at(0.5, 0.3)];
        bodies[0].mass = 2.0;
        bodies[1].mass = 3.0;
        compute_gravity(&mut bodies, 1.0);

        // Exact cancellation, not approximate
        assert_eq!(bodies[0].force, -bodies[1].force);

        let dist = (bodies[1].pos - bodies[0].pos).length();
        let expected = attraction_magnitude(1.0, 2.0, 3.0, dist);
        assert!((bodies[0].force.length() - expected).abs() < 1e-5);
    }

    #[test]
    fn test_gravity_epsilon_floor() {
        // Coincident bodies must not produce NaN or infinite forces
        let mut bodies = vec![body_at(0.0, 0.0), body_at(0.0, 0.0)];
        compute_gravity(&mut bodies, 1.0);
        assert!(bodies[0].force.is_finite());
        assert!(bodies[1].force.is_finite());
    }

    #[test]
    fn test_two_body_scenario() {
        // Masses 1.0 at (-0.5,0) and (0.5,0), G=1, dt=1: each sees accel
        // magnitude 1.0 toward the other, then pos' = 2*pos - old + accel*dt²
        let mut bodies = vec![body_at(-0.5, 0.0), body_at(0.5, 0.0)];
        compute_gravity(&mut bodies, 1.0);

        let accel_a = bodies[0].force / bodies[0].mass;
        assert!((accel_a.x - 1.0).abs() < 1e-6);
        assert!(accel_a.y.abs() < 1e-7);

        integrate(&mut bodies, 1.0, 0).unwrap();
        assert!((bodies[0].pos.x - 0.5).abs() < 1e-5);
        assert!((bodies[1].pos.x + 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_collision_resolves_approach() {
        let dt = 1.0 / 60.0;
        let mut bodies = vec![body_at(-0.05, 0.0), body_at(0.05, 0.0)];
        bodies[0].radius = 0.06;
        bodies[1].radius = 0.06;
        bodies[0].set_velocity(Vec2::new(1.0, 0.0), dt);
        bodies[1].set_velocity(Vec2::new(-1.0, 0.0), dt);

        resolve_collisions(&mut bodies, dt);

        let normal = (bodies[1].pos - bodies[0].pos).normalize();
        let rel = bodies[0].velocity(dt) - bodies[1].velocity(dt);
        assert!(rel.dot(normal) <= 1e-5, "still approaching after resolve");
    }

    #[test]
    fn test_collision_keeps_tangential_velocity() {
        let dt = 1.0 / 60.0;
        let mut bodies = vec![body_at(-0.05, 0.0), body_at(0.05, 0.0)];
        bodies[0].radius = 0.06;
        bodies[1].radius = 0.06;
        bodies[0].set_velocity(Vec2::new(1.0, 0.7), dt);
        bodies[1].set_velocity(Vec2::new(-1.0, -0.2), dt);

        resolve_collisions(&mut bodies, dt);

        // Normal is +X here, so Y components must be untouched
        assert!((bodies[0].velocity(dt).y - 0.7).abs() < 1e-4);
        assert!((bodies[1].velocity(dt).y + 0.2).abs() < 1e-4);
    }

    #[test]
    fn test_separating_pair_unchanged() {
        let dt = 1.0 / 60.0;
        let mut bodies = vec![body_at(-0.05, 0.0), body_at(0.05, 0.0)];
        bodies[0].radius = 0.06;
        bodies[1].radius = 0.06;
        bodies[0].set_velocity(Vec2::new(-1.0, 0.0), dt);
        bodies[1].set_velocity(Vec2::new(1.0, 0.0), dt);
        let before: Vec<Vec2> = bodies.iter().map(|b| b.velocity(dt)).collect();

        resolve_collisions(&mut bodies, dt);

        for (body, vel) in bodies.iter().zip(before) {
            assert!((body.velocity(dt) - vel).length() < 1e-6);
        }
    }

    #[test]
    fn test_non_overlapping_pair_ignored() {
        let dt = 1.0 / 60.0;
        let mut bodies = vec![body_at(-0.5, 0.0), body_at(0.5, 0.0)];
        bodies[0].set_velocity(Vec2::new(1.0, 0.0), dt);
        bodies[1].set_velocity(Vec2::new(-1.0, 0.0), dt);
        resolve_collisions(&mut bodies, dt);
        assert!((bodies[0].velocity(dt).x - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_damping_scales_velocity() {
        let dt = 0.5;
        let mut bodies = vec![body_at(0.0, 0.0)];
        bodies[0].set_velocity(Vec2::new(2.0, 0.0), dt);
        apply_damping(&mut bodies, 0.25, dt);
        // 0.25^0.5 = 0.5
        assert!((bodies[0].velocity(dt).x - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_integrate_reports_corruption() {
        let mut bodies = vec![body_at(0.0, 0.0)];
        bodies[0].add_force(Vec2::new(f32::INFINITY, 0.0));
        let err = integrate(&mut bodies, 0.1, 7).unwrap_err();
        assert_eq!(err, MatchError::NonFinitePhysics { body: 0, tick: 7 });
    }
}
