//! Fixed timestep match orchestration
//!
//! Drives the per-tick sequence: clear forces, perceive, invoke sandboxes,
//! apply validated actions, gravity, collisions, damping, integrate, advance.
//! Perception for tick N always reflects the physics state after tick N-1's
//! integration; no entity ever observes another's in-progress action.
//!
//! Everything iterates in insertion order. Gravity summation and collision
//! resolution order affect floating point results, so replay determinism
//! depends on this order never varying.

use crate::config::SimConfig;
use crate::error::{LoadError, MatchError, SetupError};
use crate::sandbox::{
    BotId, ExecutionResult, FaultCounters, GuestState, SandboxManager, Substrate,
};

use super::body::{Body, BodyId};
use super::perception::generate_view;
use super::physics;

/// Orchestrator state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Setup: bodies and pilots may still be added
    Idle,
    /// Ticking
    Running,
    /// Torn down (match end or fatal physics corruption)
    Finished,
}

/// Non-physics happenings surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickEvent {
    /// A bot requested a shot this tick. The core spawns no projectiles;
    /// this is the extension point for combat layers.
    ShotFired { body: BodyId, bot: BotId },
}

/// Everything that happened during one tick.
#[derive(Debug, Clone)]
pub struct TickSummary {
    pub tick: u64,
    /// One entry per pilot, in registration order
    pub executions: Vec<(BotId, ExecutionResult)>,
    pub events: Vec<TickEvent>,
}

/// A complete match: the world, its bot sandboxes, and the tick loop.
///
/// Single-threaded and synchronous by design; there is no parallelism
/// across entities within a tick.
pub struct Match<S: Substrate> {
    config: SimConfig,
    bodies: Vec<Body>,
    /// Bot-controlled entities in registration order
    pilots: Vec<(BodyId, BotId)>,
    sandbox: SandboxManager<S>,
    tick: u64,
    phase: MatchPhase,
}

impl<S: Substrate> Match<S> {
    pub fn new(config: SimConfig, substrate: S) -> Result<Self, SetupError> {
        config.validate()?;
        Ok(Self {
            sandbox: SandboxManager::new(substrate, &config),
            config,
            bodies: Vec::new(),
            pilots: Vec::new(),
            tick: 0,
            phase: MatchPhase::Idle,
        })
    }

    /// Add a body at match setup. Invariant violations here are fatal
    /// configuration errors, not runtime faults.
    pub fn add_body(&mut self, body: Body) -> Result<BodyId, SetupError> {
        let index = self.bodies.len();
        if !(body.mass > 0.0) {
            return Err(SetupError::NonPositiveMass {
                index,
                value: body.mass,
            });
        }
        if !(body.inertia > 0.0) {
            return Err(SetupError::NonPositiveInertia {
                index,
                value: body.inertia,
            });
        }
        if !(body.radius >= 0.0) {
            return Err(SetupError::NegativeRadius {
                index,
                value: body.radius,
            });
        }
        if !self.config.bounds.contains(body.pos) {
            return Err(SetupError::BodyOutOfBounds { index });
        }
        self.bodies.push(body);
        Ok(BodyId(index as u32))
    }

    /// Register a bot program and attach it to a body. On `Err` the bot is
    /// not admitted; the body and the rest of the match are unaffected.
    pub fn add_pilot(
        &mut self,
        name: &str,
        program: &[u8],
        body: BodyId,
    ) -> Result<BotId, LoadError> {
        let bot = self.sandbox.register(name, program)?;
        self.pilots.push((body, bot));
        Ok(bot)
    }

    /// Advance the match by one tick.
    ///
    /// Sandbox faults never surface here; they are folded into the
    /// summary's [`ExecutionResult`]s. An `Err` means the physics state is
    /// corrupt and the match is over.
    pub fn step(&mut self) -> Result<TickSummary, MatchError> {
        match self.phase {
            MatchPhase::Idle => self.phase = MatchPhase::Running,
            MatchPhase::Running => {}
            MatchPhase::Finished => {
                return Ok(TickSummary {
                    tick: self.tick,
                    executions: Vec::new(),
                    events: Vec::new(),
                });
            }
        }
        match self.step_inner() {
            Ok(summary) => Ok(summary),
            Err(e) => {
                // No recovery path from corrupt physics: tear down rather
                // than let non-finite values reach perception next tick
                log::error!("match failed at tick {}: {e}", self.tick);
                self.finish();
                Err(e)
            }
        }
    }

    fn step_inner(&mut self) -> Result<TickSummary, MatchError> {
        let dt = self.config.dt;

        physics::clear_forces(&mut self.bodies);

        // Perceive and invoke. Invocation cannot touch physics state, so
        // every pilot sees the end-of-previous-tick world no matter where
        // it sits in the order.
        let mut executions = Vec::with_capacity(self.pilots.len());
        for i in 0..self.pilots.len() {
            let (body_id, bot_id) = self.pilots[i];
            let perception =
                generate_view(body_id, &self.bodies, &self.config).ok_or(
                    MatchError::NoWallAhead {
                        body: body_id.index(),
                        tick: self.tick,
                    },
                )?;
            let observer = &self.bodies[body_id.index()];
            let state = GuestState::from_perception(
                observer.velocity(dt),
                observer.rot.angle(),
                &perception,
            );
            let result = self.sandbox.invoke(bot_id, &state);
            executions.push((bot_id, result));
        }

        // Apply all collected actions
        let mut events = Vec::new();
        for (i, &(body_id, bot_id)) in self.pilots.iter().enumerate() {
            let action = executions[i].1.action;
            if action.wants_shot() {
                events.push(TickEvent::ShotFired {
                    body: body_id,
                    bot: bot_id,
                });
            }
            self.bodies[body_id.index()].apply_action(&action, &self.config);
        }

        physics::compute_gravity(&mut self.bodies, self.config.gravity_const);
        physics::resolve_collisions(&mut self.bodies, dt);
        physics::apply_damping(&mut self.bodies, self.config.damping, dt);
        physics::integrate(&mut self.bodies, dt, self.tick)?;

        let summary = TickSummary {
            tick: self.tick,
            executions,
            events,
        };
        self.tick += 1;
        Ok(summary)
    }

    /// Run `ticks` consecutive steps, stopping on the first fatal error.
    pub fn run(&mut self, ticks: u64) -> Result<(), MatchError> {
        for _ in 0..ticks {
            self.step()?;
        }
        Ok(())
    }

    /// End the match and terminate every sandbox.
    pub fn finish(&mut self) {
        self.phase = MatchPhase::Finished;
        self.sandbox.terminate_all();
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Read-only view of the physics state (observability layers read
    /// this; nothing outside the orchestrator mutates it).
    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn body(&self, id: BodyId) -> &Body {
        &self.bodies[id.index()]
    }

    pub fn bot_name(&self, id: BotId) -> &str {
        self.sandbox.name(id)
    }

    pub fn fault_counts(&self, id: BotId) -> FaultCounters {
        self.sandbox.fault_counts(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::native::{GuestProgram, NativeSubstrate};
    use crate::sandbox::{ExecStatus, InstancePolicy};
    use crate::sim::action_flags;
    use glam::Vec2;

    fn thruster() -> GuestProgram {
        GuestProgram {
            init: Some(Box::new(|_, _| Ok(()))),
            update: Some(Box::new(|env, _| {
                env.charge(10)?;
                env.send_actions(action_flags::THRUST);
                Ok(())
            })),
        }
    }

    fn fuel_hog() -> GuestProgram {
        GuestProgram {
            init: Some(Box::new(|_, _| Ok(()))),
            update: Some(Box::new(|env, _| {
                loop {
                    env.charge(10_000)?;
                }
            })),
        }
    }

    fn demo_match() -> Match<NativeSubstrate> {
        let substrate = NativeSubstrate::with_demo_bots();
        // Gravity off and a roomy arena: these runs are about the
        // orchestration loop, and must not depend on how violently two
        // close bodies slingshot each other
        let config = SimConfig {
            seed: 7,
            gravity_const: 0.0,
            bounds: crate::config::Bounds::centered(4.0),
            ..Default::default()
        };
        let mut m = Match::new(config, substrate).unwrap();
        let a = m.add_body(Body::new(Vec2::new(-0.4, 0.0))).unwrap();
        let b = m.add_body(Body::new(Vec2::new(0.4, 0.0))).unwrap();
        m.add_pilot("rammer", b"rammer", a).unwrap();
        m.add_pilot("orbiter", b"orbiter", b).unwrap();
        m
    }

    #[test]
    fn test_phase_machine() {
        let mut m = demo_match();
        assert_eq!(m.phase(), MatchPhase::Idle);
        m.step().unwrap();
        assert_eq!(m.phase(), MatchPhase::Running);
        m.finish();
        assert_eq!(m.phase(), MatchPhase::Finished);

        // Stepping a finished match is a no-op
        let summary = m.step().unwrap();
        assert!(summary.executions.is_empty());
        assert_eq!(m.tick(), 1);
    }

    #[test]
    fn test_add_body_validates_invariants() {
        let mut m = Match::new(SimConfig::default(), NativeSubstrate::new()).unwrap();

        let mut bad = Body::new(Vec2::ZERO);
        bad.mass = 0.0;
        assert!(matches!(
            m.add_body(bad),
            Err(SetupError::NonPositiveMass { .. })
        ));

        let mut bad = Body::new(Vec2::ZERO);
        bad.inertia = -1.0;
        assert!(matches!(
            m.add_body(bad),
            Err(SetupError::NonPositiveInertia { .. })
        ));

        let outside = Body::new(Vec2::new(5.0, 0.0));
        assert!(matches!(
            m.add_body(outside),
            Err(SetupError::BodyOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_match_runs_to_completion() {
        let mut m = demo_match();
        m.run(120).unwrap();
        assert_eq!(m.tick(), 120);
        for body in m.bodies() {
            assert!(body.pos.is_finite());
            assert!((body.rot.magnitude() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_determinism_same_seed_same_trajectory() {
        let mut a = demo_match();
        let mut b = demo_match();
        a.run(120).unwrap();
        b.run(120).unwrap();

        // Bitwise identical, not merely close
        for (x, y) in a.bodies().iter().zip(b.bodies()) {
            assert_eq!(x.pos, y.pos);
            assert_eq!(x.old_pos, y.old_pos);
            assert_eq!(x.rot, y.rot);
        }
    }

    #[test]
    fn test_fault_containment() {
        let mut substrate = NativeSubstrate::new();
        substrate.register("hog", fuel_hog);
        substrate.register("steady", thruster);

        let mut m = Match::new(SimConfig::default(), substrate).unwrap();
        let a = m.add_body(Body::new(Vec2::new(-0.4, 0.0))).unwrap();
        let b = m.add_body(Body::new(Vec2::new(0.4, 0.0))).unwrap();
        let hog = m.add_pilot("hog", b"hog", a).unwrap();
        let steady = m.add_pilot("steady", b"steady", b).unwrap();

        let summary = m.step().unwrap();
        assert_eq!(summary.executions[0].1.status, ExecStatus::FuelExhausted);
        assert_eq!(summary.executions[1].1.status, ExecStatus::Success);

        // The hog idles, the healthy bot thrusts, the match keeps going
        m.run(10).unwrap();
        assert_eq!(m.fault_counts(hog).fuel_exhausted, 11);
        assert_eq!(m.fault_counts(steady).total(), 0);
    }

    #[test]
    fn test_perception_reflects_previous_tick() {
        // Pilot B encodes "I saw my neighbor moving" into its color. On the
        // very first tick, A's burst of thrust must not be visible yet: all
        // views come from the end-of-previous-tick state.
        let mut substrate = NativeSubstrate::new();
        substrate.register("burst", thruster);
        substrate.register("watcher", || GuestProgram {
            init: Some(Box::new(|_, _| Ok(()))),
            update: Some(Box::new(|env, args| {
                env.charge(10)?;
                let moving = match (args.get(7), args.get(8)) {
                    (
                        Some(crate::sandbox::WireValue::F32(vx)),
                        Some(crate::sandbox::WireValue::F32(vy)),
                    ) => vx.abs() > 1e-6 || vy.abs() > 1e-6,
                    _ => false,
                };
                if moving {
                    env.set_color(1.0, 0.0, 0.0);
                } else {
                    env.set_color(0.0, 1.0, 0.0);
                }
                Ok(())
            })),
        });

        // Keep gravity out so the only motion source is A's thrust
        let config = SimConfig {
            gravity_const: 0.0,
            ..Default::default()
        };
        let mut m = Match::new(config, substrate).unwrap();
        let a = m.add_body(Body::new(Vec2::new(-0.2, 0.0))).unwrap();
        let mut watcher_body = Body::new(Vec2::new(0.2, 0.0));
        watcher_body.rot = crate::sim::Rotor::from_angle(std::f32::consts::PI);
        watcher_body.old_rot = watcher_body.rot;
        let b = m.add_body(watcher_body).unwrap();
        m.add_pilot("burst", b"burst", a).unwrap();
        m.add_pilot("watcher", b"watcher", b).unwrap();

        // Tick 0: A thrusts this tick, but B's view predates the thrust
        let s0 = m.step().unwrap();
        assert_eq!(s0.executions[1].1.color, [0.0, 1.0, 0.0]);

        // Tick 1: A's tick-0 thrust has been integrated and is now visible
        let s1 = m.step().unwrap();
        assert_eq!(s1.executions[1].1.color, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_shot_event_recorded() {
        let mut m = demo_match();
        let mut shot_ticks = Vec::new();
        for _ in 0..40 {
            let summary = m.step().unwrap();
            if !summary.events.is_empty() {
                shot_ticks.push(summary.tick);
            }
        }
        // The orbiter shoots on its 30th update
        assert_eq!(shot_ticks, vec![29]);
    }

    #[test]
    fn test_corrupt_physics_fails_match() {
        // Extreme gravity on coincident bodies overflows f32 immediately
        let config = SimConfig {
            gravity_const: 1e38,
            ..Default::default()
        };
        let mut m = Match::new(config, NativeSubstrate::new()).unwrap();
        m.add_body(Body::new(Vec2::ZERO)).unwrap();
        m.add_body(Body::new(Vec2::ZERO)).unwrap();

        let err = m.step().unwrap_err();
        assert!(matches!(err, MatchError::NonFinitePhysics { .. }));
        assert_eq!(m.phase(), MatchPhase::Finished);
    }

    #[test]
    fn test_fresh_per_tick_policy_plumbed_through() {
        let mut substrate = NativeSubstrate::new();
        substrate.register("counter", || {
            let mut calls = 0u32;
            GuestProgram {
                init: Some(Box::new(|_, _| Ok(()))),
                update: Some(Box::new(move |env, _| {
                    calls += 1;
                    if calls > 1 {
                        env.send_actions(action_flags::SHOOT);
                    }
                    Ok(())
                })),
            }
        });
        let config = SimConfig {
            instance_policy: InstancePolicy::FreshPerTick,
            ..Default::default()
        };
        let mut m = Match::new(config, substrate).unwrap();
        let a = m.add_body(Body::new(Vec2::ZERO)).unwrap();
        m.add_pilot("counter", b"counter", a).unwrap();

        for _ in 0..3 {
            let summary = m.step().unwrap();
            assert!(summary.events.is_empty(), "state leaked across ticks");
        }
    }
}
