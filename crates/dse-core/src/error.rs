//! Typed error kinds for the design-space explorer.
//!
//! The core crates return `Result<_, DseError>`; `dse-cli` wraps these in
//! `anyhow` at the program boundary and prints a single-line diagnostic.

use thiserror::Error;

/// The four error kinds the system can surface.
#[derive(Debug, Error)]
pub enum DseError {
    /// A `model` layer line had fewer fields than expected.
    #[error("malformed input in {file} at line {line}: {reason}")]
    MalformedInput {
        file: String,
        line: usize,
        reason: String,
    },

    /// No hardware candidate survived resource pruning.
    #[error(
        "infeasible search space: best infeasible candidate used {dsp_pct:.1}% DSP, {bram_pct:.1}% BRAM18K"
    )]
    InfeasibleSearchSpace { dsp_pct: f64, bram_pct: f64 },

    /// The expanded layer count did not match what the topology predicts.
    #[error("topology mismatch: expected {expected} expanded layers, got {got}")]
    TopologyMismatch { expected: usize, got: usize },

    /// A divisor-zero or non-positive tile value reached a cost kernel.
    ///
    /// This should never happen given the generator constraints; it signals
    /// an invariant violation rather than a user-facing error.
    #[error("domain error (invariant violation): {0}")]
    DomainError(String),
}
