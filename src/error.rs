//! Crate-wide error taxonomy.
//!
//! Configuration and data errors abort before any sampling compute is spent.
//! Per-chain failures are isolated and surfaced next to the trace rather than
//! aborting healthy chains. Convergence problems are reported as data in the
//! [`DiagnosticReport`](crate::diagnostics::DiagnosticReport), never as errors.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A prior hyperparameter or sampler setting is outside its valid domain.
    #[error("invalid configuration: {name} must be positive, got {value}")]
    InvalidHyperparameter { name: &'static str, value: f64 },

    /// Too many change points for the series length.
    #[error("{k} change points is too many for a series of {len} observations")]
    TooManyChangePoints { k: usize, len: usize },

    /// The series does not carry enough observations for the requested model.
    #[error("series too short: {len} observations, need at least {min}")]
    InsufficientData { len: usize, min: usize },

    /// Timestamps and values differ in length.
    #[error("timestamps ({timestamps}) and values ({values}) differ in length")]
    LengthMismatch { timestamps: usize, values: usize },

    /// Timestamps must be strictly increasing; duplicates are rejected too.
    #[error("timestamps not strictly increasing at index {index}")]
    NonIncreasingTimestamps { index: usize },

    /// Missing values are the cleaning collaborator's responsibility.
    #[error("non-finite value at index {index}; clean the series upstream")]
    NonFiniteValue { index: usize },

    /// The sampler configuration itself is invalid (zero chains, zero draws).
    #[error("invalid sampler configuration: {0}")]
    SamplerConfig(String),

    /// The likelihood was undefined at every attempted starting point.
    #[error("chain {chain} failed to initialize after {attempts} attempts")]
    Initialization { chain: usize, attempts: usize },

    /// Every requested chain failed to initialize.
    #[error("all {0} chains failed to initialize")]
    AllChainsFailed(usize),

    /// Fewer than two usable chains; R-hat/ESS would be fabricated numbers.
    #[error("diagnostics unavailable: {healthy} usable chain(s), need at least 2")]
    DiagnosticsUnavailable { healthy: usize },

    /// The trace holds no retained posterior draws (e.g. cancelled early).
    #[error("trace contains no usable posterior draws")]
    EmptyTrace,

    /// Credible levels are open-interval probabilities.
    #[error("credible level must lie in (0, 1), got {0}")]
    InvalidLevel(f64),

    /// Model comparison needs traces fit against the same series.
    #[error("traces were fit to different series ({0} vs {1} observations)")]
    SeriesMismatch(usize, usize),

    /// Building the scoped worker pool failed.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),

    #[cfg(feature = "csv")]
    #[error("csv export failed: {0}")]
    Csv(#[from] ::csv::Error),

    #[cfg(feature = "csv")]
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
