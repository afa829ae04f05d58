//! Sandboxed bot execution
//!
//! Runs untrusted control programs under hard resource and time bounds,
//! exposing only the narrow host/guest callback interface. The guarantees
//! this module exists to provide:
//! - No bot fault can block the match indefinitely or escape as an
//!   unhandled failure; every outcome is typed
//! - No shared mutable state ever crosses the sandbox boundary; guests see
//!   value snapshots and talk back only through validated callbacks
//! - A fresh resource budget every tick, so a bot is bounded per tick but
//!   never starved across a long match

pub mod manager;
pub mod native;
pub mod report;
pub mod substrate;

pub use manager::{
    ABI_VERSION, BotId, ExecStatus, ExecutionResult, FaultCounters, GuestState, InstancePolicy,
    SandboxManager,
};
pub use report::{DEFAULT_COLOR, ReportSink, TickReport};
pub use substrate::{CallOutcome, HostImports, ResourceBudget, Substrate, WireValue};
