//! Guest report capture and validation
//!
//! Guests report actions by calling host-bound callbacks during `update`;
//! the sink captures the most recent report as the tick's candidate action.
//! Everything a guest reports is validated here, before it can reach the
//! physics system:
//! - every numeric component must be finite
//! - acceleration magnitude is clamped to the configured maximum
//! - color channels must lie in [0,1]; out-of-range reports are rejected
//!   outright and the last valid color is retained
//!
//! Any rejected report poisons the tick: the candidate action falls back to
//! no-op and the violation is surfaced as a diagnostic.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec2;

use super::substrate::HostImports;
use crate::sim::{Action, action_flags};

/// Default cosmetic color for bots that never report one.
pub const DEFAULT_COLOR: [f32; 3] = [1.0, 1.0, 1.0];

#[derive(Debug)]
struct SinkState {
    max_accel: f32,
    action: Action,
    color: [f32; 3],
    violations: Vec<String>,
}

/// What the sink collected over one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// The validated candidate action (no-op if nothing valid was reported)
    pub action: Action,
    /// Last valid color, persisted across ticks
    pub color: [f32; 3],
    /// Validation failures recorded this tick
    pub violations: Vec<String>,
}

/// Capture point for one bot's host callbacks.
///
/// One sink lives per bot for the whole match; the color channel persists
/// across ticks while the action channel resets to no-op every tick.
#[derive(Clone)]
pub struct ReportSink {
    inner: Rc<RefCell<SinkState>>,
}

impl ReportSink {
    pub fn new(max_accel: f32) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SinkState {
                max_accel,
                action: Action::Idle,
                color: DEFAULT_COLOR,
                violations: Vec::new(),
            })),
        }
    }

    /// Host callbacks for binding into a guest instance.
    pub fn imports(&self) -> HostImports {
        let actions = self.inner.clone();
        let accel = self.inner.clone();
        let color = self.inner.clone();
        HostImports {
            send_actions: Box::new(move |flags| actions.borrow_mut().report_flags(flags)),
            send_action: Box::new(move |ax, ay| accel.borrow_mut().report_accel(ax, ay)),
            set_color: Box::new(move |r, g, b| color.borrow_mut().report_color(r, g, b)),
        }
    }

    /// Reset the per-tick channels. The action always starts from no-op so
    /// a silent guest never replays a stale action; color persists.
    pub fn begin_tick(&self) {
        let mut state = self.inner.borrow_mut();
        state.action = Action::Idle;
        state.violations.clear();
    }

    /// Collect the tick's outcome. A tick with any violation yields the
    /// safe default action.
    pub fn take(&self) -> TickReport {
        let state = self.inner.borrow();
        TickReport {
            action: if state.violations.is_empty() {
                state.action
            } else {
                Action::Idle
            },
            color: state.color,
            violations: state.violations.clone(),
        }
    }
}

impl SinkState {
    fn report_flags(&mut self, flags: i32) {
        if flags & !action_flags::ALL != 0 {
            self.violations
                .push(format!("unknown action bits in {flags:#06b}"));
            self.action = Action::Idle;
            return;
        }
        self.action = Action::Ship {
            thrust: flags & action_flags::THRUST != 0,
            left: flags & action_flags::LEFT != 0,
            right: flags & action_flags::RIGHT != 0,
            shoot: flags & action_flags::SHOOT != 0,
        };
    }

    fn report_accel(&mut self, ax: f32, ay: f32) {
        if !ax.is_finite() || !ay.is_finite() {
            self.violations
                .push(format!("non-finite acceleration ({ax}, {ay})"));
            self.action = Action::Idle;
            return;
        }
        let mut accel = Vec2::new(ax, ay);
        let mag = accel.length();
        if mag > self.max_accel {
            accel = accel / mag * self.max_accel;
        }
        self.action = Action::Accel(accel);
    }

    fn report_color(&mut self, r: f32, g: f32, b: f32) {
        let channels = [r, g, b];
        if channels.iter().any(|c| !c.is_finite()) {
            self.violations
                .push(format!("non-finite color ({r}, {g}, {b})"));
            return;
        }
        if channels.iter().any(|c| !(0.0..=1.0).contains(c)) {
            self.violations
                .push(format!("color out of [0,1] range ({r}, {g}, {b})"));
            return;
        }
        self.color = channels;
    }
}
