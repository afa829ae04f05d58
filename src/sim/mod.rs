//! Deterministic simulation module
//!
//! All world state and physics live here. This module must stay pure and
//! deterministic:
//! - Fixed timestep only
//! - Seeded RNG only (and only at match setup)
//! - Stable iteration order (insertion order, everywhere)
//! - No rendering or platform dependencies
//!
//! The only externally risky operation a tick performs is invoking the
//! sandboxes, and those are bounded per invocation by the resource budget.

pub mod body;
pub mod perception;
pub mod physics;
pub mod rotor;
pub mod tick;

pub use body::{Action, Body, BodyId, action_flags};
pub use perception::{BodyView, Perception, generate_view, nearest_wall_distance, raycast};
pub use rotor::Rotor;
pub use tick::{Match, MatchPhase, TickEvent, TickSummary};
