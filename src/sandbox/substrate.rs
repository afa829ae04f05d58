//! Abstract execution substrate
//!
//! The sandbox layer is written entirely against this capability: compile
//! bytes into a module, instantiate it with host-bound callbacks, call an
//! export under a resource budget. WASM engines, interpreters, or the
//! in-process reference substrate all plug in behind [`Substrate`]; nothing
//! in this crate parses bytecode or meters fuel itself.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LoadError;

/// A value crossing the host/guest boundary.
///
/// The numeric layout is part of the versioned wire contract: exports take
/// `F32` fields in a fixed documented order, and the discrete action
/// callback takes a single `I32` bitflag set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WireValue {
    I32(i32),
    F32(f32),
}

/// Per-invocation resource limits, re-issued in full at the start of every
/// tick. Fuel bounds metered work; the wall-clock timeout is the secondary
/// guard for code paths fuel cannot bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceBudget {
    /// Linear memory limit in 64 KiB pages
    pub memory_pages: u32,
    /// Computational fuel units for one invocation
    pub fuel: u64,
    /// Wall-clock limit for one invocation
    pub timeout: Duration,
}

impl Default for ResourceBudget {
    fn default() -> Self {
        Self {
            memory_pages: 10,
            fuel: 1_000_000,
            timeout: Duration::from_millis(5),
        }
    }
}

/// How one export call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// The export returned normally
    Completed,
    /// The fuel budget ran out mid-execution
    FuelExhausted,
    /// The wall-clock budget ran out
    Timeout,
    /// A runtime fault inside the guest (invalid memory access, unknown
    /// export, explicit abort)
    Trap(String),
}

/// Host callbacks bound into a guest instance.
///
/// Guests do not *return* actions; they report them by calling back into
/// the host. These closures are the only outward channel a guest has.
pub struct HostImports {
    /// `send_actions(flags: i32)` - discrete ship controls
    pub send_actions: Box<dyn FnMut(i32)>,
    /// `send_action(ax: f32, ay: f32)` - continuous acceleration
    pub send_action: Box<dyn FnMut(f32, f32)>,
    /// `set_color(r: f32, g: f32, b: f32)` - cosmetic color, each in [0,1]
    pub set_color: Box<dyn FnMut(f32, f32, f32)>,
}

/// The external sandboxed-execution capability.
///
/// Contract notes for implementors:
/// - `call` must not unwind on guest faults; every fault becomes a
///   [`CallOutcome`].
/// - `call` must honor `budget.timeout` even against guests that never
///   yield. Operationally that means running the guest on an execution
///   context the host can abandon at the deadline (a watchdog-interrupted
///   engine, or a separate thread/process that is torn down) without
///   affecting the caller or other instances.
/// - Instances are stateful across calls; the host decides their lifetime.
pub trait Substrate {
    type Module;
    type Instance;

    /// Validate and compile a guest program.
    fn compile(&self, bytes: &[u8]) -> Result<Self::Module, LoadError>;

    /// Create a fresh instance with the given host callbacks bound in.
    fn instantiate(
        &self,
        module: &Self::Module,
        imports: HostImports,
    ) -> Result<Self::Instance, LoadError>;

    /// Whether the instance exposes a callable export with this name.
    fn has_export(&self, instance: &Self::Instance, name: &str) -> bool;

    /// Call an export with a fresh resource budget.
    fn call(
        &self,
        instance: &mut Self::Instance,
        export: &str,
        args: &[WireValue],
        budget: &ResourceBudget,
    ) -> CallOutcome;
}
