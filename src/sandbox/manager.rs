//! Sandbox lifecycle and per-tick invocation
//!
//! One isolated execution context per bot, created at registration and (by
//! default) kept for the whole match so bots can carry internal state across
//! ticks. Every invocation gets a fresh resource budget; every fault a guest
//! can raise is converted into a typed [`ExecutionResult`] so nothing ever
//! unwinds through the orchestrator.

use std::time::{Duration, Instant};

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::report::ReportSink;
use super::substrate::{CallOutcome, ResourceBudget, Substrate, WireValue};
use crate::config::SimConfig;
use crate::error::LoadError;
use crate::sim::{Action, Perception};

/// Host/guest wire contract version. Field orders in [`config_args`] and
/// [`state_args`] are frozen per version; changing either requires a bump
/// and a synchronized guest-side update.
pub const ABI_VERSION: u32 = 1;

/// Stable handle for a registered bot, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BotId(pub u32);

impl BotId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Whether a bot keeps one sandbox instance for the whole match or gets a
/// fresh one (re-running `init`) before every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InstancePolicy {
    /// One persistent instance per bot; supports bot-internal memory
    #[default]
    Persistent,
    /// Re-instantiate before every tick; no state survives between ticks
    FreshPerTick,
}

/// How one sandbox invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    Success,
    FuelExhausted,
    Timeout,
    Trap,
    ProtocolViolation,
    LoadError,
}

/// Typed outcome of one sandbox invocation. Statuses other than `Success`
/// carry the safe default action; the match always continues.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub status: ExecStatus,
    /// The validated action, or no-op on any fault
    pub action: Action,
    /// Last valid reported color (persists across faulty ticks)
    pub color: [f32; 3],
    pub elapsed: Duration,
    pub diagnostic: Option<String>,
}

/// Per-bot running tally of recoverable faults, for caller-side
/// disqualification policies. The core never disqualifies on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultCounters {
    pub fuel_exhausted: u32,
    pub timeouts: u32,
    pub traps: u32,
    pub protocol_violations: u32,
}

impl FaultCounters {
    pub fn total(&self) -> u32 {
        self.fuel_exhausted + self.timeouts + self.traps + self.protocol_violations
    }
}

/// Bot lifecycle: `Ready -> Stepping -> Ready` each tick until terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BotPhase {
    Ready,
    Stepping,
    Terminated,
}

/// The per-tick guest state, before marshalling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuestState {
    /// Observer's own velocity (world frame)
    pub vel: Vec2,
    /// Observer's heading angle, radians
    pub heading: f32,
    /// Distance to the nearest boundary wall along the heading
    pub nearest_wall: f32,
    /// How many bodies are in view
    pub visible_count: u32,
    /// Nearest visible body: relative pos, relative vel, relative heading,
    /// radius, mass. Zeros when nothing is visible.
    pub nearest: [f32; 7],
}

impl GuestState {
    /// Flatten a perception snapshot into the wire fields. The nearest
    /// visible body (by relative distance) is the one marshalled; ties
    /// resolve to the earlier body in insertion order.
    pub fn from_perception(vel: Vec2, heading: f32, perception: &Perception) -> Self {
        let nearest = perception
            .visible
            .iter()
            .min_by(|(_, a), (_, b)| {
                a.rel_pos
                    .length()
                    .partial_cmp(&b.rel_pos.length())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(_, view)| {
                [
                    view.rel_pos.x,
                    view.rel_pos.y,
                    view.rel_vel.x,
                    view.rel_vel.y,
                    view.rel_heading,
                    view.radius,
                    view.mass,
                ]
            })
            .unwrap_or([0.0; 7]);
        Self {
            vel,
            heading,
            nearest_wall: perception.nearest_wall,
            visible_count: perception.visible.len() as u32,
            nearest,
        }
    }
}

/// `init` argument list, ABI v1. Field order is frozen:
/// gravity_const, thrust, torque, max_accel, damping, vision_half_angle,
/// vision_reach, bounds min x/y, bounds max x/y, dt.
/// The match seed is deliberately not exposed to guests.
pub fn config_args(config: &SimConfig) -> Vec<WireValue> {
    vec![
        WireValue::F32(config.gravity_const),
        WireValue::F32(config.thrust),
        WireValue::F32(config.torque),
        WireValue::F32(config.max_accel),
        WireValue::F32(config.damping),
        WireValue::F32(config.vision_half_angle),
        WireValue::F32(config.vision_reach),
        WireValue::F32(config.bounds.min.x),
        WireValue::F32(config.bounds.min.y),
        WireValue::F32(config.bounds.max.x),
        WireValue::F32(config.bounds.max.y),
        WireValue::F32(config.dt),
    ]
}

/// `update` argument list, ABI v1. Field order is frozen:
/// vel x/y, heading, nearest_wall, visible_count, then the nearest visible
/// body's rel pos x/y, rel vel x/y, rel heading, radius, mass.
pub fn state_args(state: &GuestState) -> Vec<WireValue> {
    let mut args = vec![
        WireValue::F32(state.vel.x),
        WireValue::F32(state.vel.y),
        WireValue::F32(state.heading),
        WireValue::F32(state.nearest_wall),
        WireValue::I32(state.visible_count as i32),
    ];
    args.extend(state.nearest.iter().map(|&f| WireValue::F32(f)));
    args
}

struct BotSlot<S: Substrate> {
    name: String,
    module: S::Module,
    instance: S::Instance,
    sink: ReportSink,
    phase: BotPhase,
    faults: FaultCounters,
}

/// Owns every bot's execution context and drives one bounded invocation per
/// bot per tick.
pub struct SandboxManager<S: Substrate> {
    substrate: S,
    config_args: Vec<WireValue>,
    budget: ResourceBudget,
    policy: InstancePolicy,
    max_accel: f32,
    bots: Vec<BotSlot<S>>,
}

impl<S: Substrate> SandboxManager<S> {
    pub fn new(substrate: S, config: &SimConfig) -> Self {
        Self {
            substrate,
            config_args: config_args(config),
            budget: config.budget,
            policy: config.instance_policy,
            max_accel: config.max_accel,
            bots: Vec::new(),
        }
    }

    /// Compile, instantiate and initialize one bot.
    ///
    /// Any failure here (malformed program, missing `init`/`update` export,
    /// faulting `init`) is a [`LoadError`]: the bot is never admitted and
    /// the caller reports the error back to the submitter.
    pub fn register(&mut self, name: &str, program: &[u8]) -> Result<BotId, LoadError> {
        let module = self.substrate.compile(program)?;
        let sink = ReportSink::new(self.max_accel);
        let mut instance = self.substrate.instantiate(&module, sink.imports())?;

        for export in ["init", "update"] {
            if !self.substrate.has_export(&instance, export) {
                return Err(LoadError::MissingExport(export.to_string()));
            }
        }

        sink.begin_tick();
        match self
            .substrate
            .call(&mut instance, "init", &self.config_args, &self.budget)
        {
            CallOutcome::Completed => {}
            outcome => return Err(LoadError::Init(describe_outcome(&outcome))),
        }
        for violation in sink.take().violations {
            log::warn!("bot `{name}` init: {violation}");
        }

        let id = BotId(self.bots.len() as u32);
        self.bots.push(BotSlot {
            name: name.to_string(),
            module,
            instance,
            sink,
            phase: BotPhase::Ready,
            faults: FaultCounters::default(),
        });
        log::info!("bot `{name}` registered as {id:?}");
        Ok(id)
    }

    /// Run one bot's `update` for this tick under a fresh budget.
    ///
    /// Never fails: every guest fault becomes a status on the returned
    /// [`ExecutionResult`], the action degrades to no-op, and the bot's
    /// persistent state is left intact for future ticks.
    pub fn invoke(&mut self, id: BotId, state: &GuestState) -> ExecutionResult {
        let slot = &mut self.bots[id.index()];
        if slot.phase == BotPhase::Terminated {
            return ExecutionResult {
                status: ExecStatus::Trap,
                action: Action::Idle,
                color: slot.sink.take().color,
                elapsed: Duration::ZERO,
                diagnostic: Some("bot is terminated".to_string()),
            };
        }
        slot.phase = BotPhase::Stepping;
        slot.sink.begin_tick();

        let start = Instant::now();

        // Fresh-per-tick policy rebuilds the context (and re-runs init)
        // before every update, so no guest state survives between ticks.
        if self.policy == InstancePolicy::FreshPerTick {
            match self.substrate.instantiate(&slot.module, slot.sink.imports()) {
                Ok(mut fresh) => match self.substrate.call(
                    &mut fresh,
                    "init",
                    &self.config_args,
                    &self.budget,
                ) {
                    CallOutcome::Completed => slot.instance = fresh,
                    outcome => {
                        slot.phase = BotPhase::Ready;
                        return finish_faulty(slot, outcome, start.elapsed());
                    }
                },
                Err(e) => {
                    slot.phase = BotPhase::Ready;
                    slot.faults.traps += 1;
                    return ExecutionResult {
                        status: ExecStatus::Trap,
                        action: Action::Idle,
                        color: slot.sink.take().color,
                        elapsed: start.elapsed(),
                        diagnostic: Some(format!("re-instantiation failed: {e}")),
                    };
                }
            }
        }

        let args = state_args(state);
        let outcome = self
            .substrate
            .call(&mut slot.instance, "update", &args, &self.budget);
        let elapsed = start.elapsed();
        slot.phase = BotPhase::Ready;

        match outcome {
            CallOutcome::Completed => {
                let report = slot.sink.take();
                if report.violations.is_empty() {
                    ExecutionResult {
                        status: ExecStatus::Success,
                        action: report.action,
                        color: report.color,
                        elapsed,
                        diagnostic: None,
                    }
                } else {
                    slot.faults.protocol_violations += 1;
                    let diagnostic = report.violations.join("; ");
                    log::warn!("bot `{}`: protocol violation: {diagnostic}", slot.name);
                    ExecutionResult {
                        status: ExecStatus::ProtocolViolation,
                        action: Action::Idle,
                        color: report.color,
                        elapsed,
                        diagnostic: Some(diagnostic),
                    }
                }
            }
            outcome => finish_faulty(slot, outcome, elapsed),
        }
    }

    /// Mark every bot terminated (match end). Instances are dropped with
    /// the manager.
    pub fn terminate_all(&mut self) {
        for slot in &mut self.bots {
            slot.phase = BotPhase::Terminated;
        }
    }

    pub fn bot_count(&self) -> usize {
        self.bots.len()
    }

    pub fn name(&self, id: BotId) -> &str {
        &self.bots[id.index()].name
    }

    pub fn fault_counts(&self, id: BotId) -> FaultCounters {
        self.bots[id.index()].faults
    }
}

fn describe_outcome(outcome: &CallOutcome) -> String {
    match outcome {
        CallOutcome::Completed => "completed".to_string(),
        CallOutcome::FuelExhausted => "fuel exhausted".to_string(),
        CallOutcome::Timeout => "timed out".to_string(),
        CallOutcome::Trap(msg) => format!("trap: {msg}"),
    }
}

fn finish_faulty<S: Substrate>(
    slot: &mut BotSlot<S>,
    outcome: CallOutcome,
    elapsed: Duration,
) -> ExecutionResult {
    let (status, diagnostic) = match &outcome {
        CallOutcome::FuelExhausted => {
            slot.faults.fuel_exhausted += 1;
            (ExecStatus::FuelExhausted, describe_outcome(&outcome))
        }
        CallOutcome::Timeout => {
            slot.faults.timeouts += 1;
            (ExecStatus::Timeout, describe_outcome(&outcome))
        }
        CallOutcome::Trap(_) => {
            slot.faults.traps += 1;
            (ExecStatus::Trap, describe_outcome(&outcome))
        }
        CallOutcome::Completed => unreachable!("completed calls are not faults"),
    };
    log::warn!("bot `{}`: {diagnostic}", slot.name);
    ExecutionResult {
        status,
        action: Action::Idle,
        color: slot.sink.take().color,
        elapsed,
        diagnostic: Some(diagnostic),
    }
}
