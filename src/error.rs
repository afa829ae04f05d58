//! Fault taxonomy
//!
//! Three tiers, matching who they are fatal to:
//! - [`SetupError`]: bad match configuration, fatal at setup
//! - [`LoadError`]: bad bot program, fatal to that bot's registration only
//! - [`MatchError`]: corrupted physics state, fatal to the whole match
//!
//! Per-tick sandbox faults (fuel, timeout, trap, protocol violation) are NOT
//! errors in this sense: they are converted into typed
//! [`ExecutionResult`](crate::sandbox::ExecutionResult) outcomes and the match
//! continues.

use thiserror::Error;

/// Fatal configuration errors, detected before the first tick.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SetupError {
    #[error("body {index}: mass must be positive (got {value})")]
    NonPositiveMass { index: usize, value: f32 },

    #[error("body {index}: inertia must be positive (got {value})")]
    NonPositiveInertia { index: usize, value: f32 },

    #[error("body {index}: radius must be non-negative (got {value})")]
    NegativeRadius { index: usize, value: f32 },

    #[error("body {index}: spawn position is outside the boundary")]
    BodyOutOfBounds { index: usize },

    #[error("boundary rectangle is degenerate (min must be strictly below max)")]
    DegenerateBounds,

    #[error("timestep must be positive (got {0})")]
    NonPositiveTimestep(f32),

    #[error("damping must lie in (0, 1] (got {0})")]
    DampingOutOfRange(f32),

    #[error("vision reach must be positive (got {0})")]
    NonPositiveVisionReach(f32),
}

/// Bot registration failures. The bot is never admitted into the match;
/// everything else keeps running.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    #[error("malformed program: {0}")]
    Malformed(String),

    #[error("missing required export `{0}`")]
    MissingExport(String),

    #[error("instantiation failed: {0}")]
    Instantiate(String),

    #[error("init call failed: {0}")]
    Init(String),
}

/// Unrecoverable mid-match corruption. There is no legitimate way to
/// continue once physics state goes non-finite, so these abort the match
/// instead of propagating garbage into later ticks and perception.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchError {
    #[error("non-finite position or orientation for body {body} at tick {tick}")]
    NonFinitePhysics { body: usize, tick: u64 },

    #[error("no boundary wall ahead of body {body} at tick {tick}")]
    NoWallAhead { body: usize, tick: u64 },

    #[error(transparent)]
    Setup(#[from] SetupError),
}
