//! Error taxonomy for the analysis pipeline (spec §7).
//!
//! `ContainmentDrift` and `NegativeExclusive` are deliberately absent: the
//! spec treats both as internal bookkeeping (counters, a post-traversal
//! clamp) that never surfaces as an error, only as a `tracing::debug!` line.

use thiserror::Error;

/// Errors that can terminate processing of a single trace, or a single
/// external-tool invocation. Per-trace variants never escape a worker —
/// the pipeline catches them and records an empty `MetricSet` instead.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// A required field was missing or a timing field failed to parse as
    /// an integer. Per-trace fatal.
    #[error("malformed trace input: {detail}")]
    MalformedInput { detail: String },

    /// Strict mode saw zero or multiple potential roots, or lenient mode
    /// found no span matching the required service+operation. Per-trace
    /// fatal.
    #[error("no root span found: {reason}")]
    NoRoot { reason: String },

    /// The external `difffolded`-equivalent tool failed for one
    /// percentile pair. Other percentiles are unaffected.
    #[error("external tool '{tool}' failed: {detail}")]
    ExternalProcessFailure { tool: &'static str, detail: String },
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
