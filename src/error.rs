//! Error types for the edgequake-stitch library.
//!
//! Three layers of failure, each with its own type:
//!
//! * [`StitchError`]: **Fatal** for the run: bad window sizes, no provider,
//!   I/O on the output file, or an assembly that could not be completed.
//!   The last case carries a full [`AssemblyReport`] so nothing about the
//!   partial run is lost.
//!
//! * [`OracleError`]: a single oracle call failed. `Unavailable` is
//!   transient and has already been retried by the oracle; `Rejected` is
//!   permanent and was not retried.
//!
//! * [`BoundaryError`]: two adjacent rewritten windows could not be joined,
//!   neither automatically nor by the assisted stitch. Stored inside
//!   [`crate::output::BoundaryFailure`].

use crate::output::AssemblyReport;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-stitch library.
#[derive(Debug, Error)]
pub enum StitchError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// Window/overlap sizes cannot produce a valid split.
    #[error("Invalid split configuration (window_size={window_size}, overlap_size={overlap_size}): {reason}")]
    SplitConfiguration {
        window_size: usize,
        overlap_size: usize,
        reason: String,
    },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Assembly errors ───────────────────────────────────────────────────
    /// At least one window or boundary could not be resolved.
    ///
    /// The report lists every failed window and every unresolved boundary,
    /// together with the rewrites that did succeed.
    #[error(
        "Assembly failed: {} window(s) and {} boundary(ies) unresolved",
        .0.window_failures.len(),
        .0.boundary_failures.len()
    )]
    AssemblyFailed(Box<AssemblyReport>),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not read the input document.
    #[error("Failed to read input file '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StitchError {
    /// The structured report, if this is an assembly failure.
    pub fn report(&self) -> Option<&AssemblyReport> {
        match self {
            StitchError::AssemblyFailed(report) => Some(report),
            _ => None,
        }
    }
}

/// Failure of a single oracle call (rewrite or stitch).
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum OracleError {
    /// Transient failure; the oracle already retried `attempts` times.
    #[error("oracle unavailable after {attempts} attempt(s): {detail}")]
    Unavailable { attempts: u32, detail: String },

    /// Permanent failure: the input violates the oracle's constraints.
    #[error("oracle rejected the request: {detail}")]
    Rejected { detail: String },
}

impl OracleError {
    /// Whether a caller may reasonably retry the same request later.
    pub fn is_transient(&self) -> bool {
        matches!(self, OracleError::Unavailable { .. })
    }
}

/// A boundary between two rewritten windows that could not be joined.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum BoundaryError {
    #[error(
        "Boundary {left_index}→{right_index} unresolved: best automatic match \
         {best_match_len} chars (threshold {min_match_len}); {reason}"
    )]
    Unresolved {
        left_index: usize,
        right_index: usize,
        best_match_len: usize,
        min_match_len: usize,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_configuration_display() {
        let e = StitchError::SplitConfiguration {
            window_size: 100,
            overlap_size: 100,
            reason: "overlap_size must be smaller than window_size".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("window_size=100"), "got: {msg}");
        assert!(msg.contains("overlap_size must be smaller"), "got: {msg}");
    }

    #[test]
    fn assembly_failed_display_counts() {
        let e = StitchError::AssemblyFailed(Box::default());
        assert!(e.to_string().contains("0 window(s)"));
        assert!(e.report().is_some());
    }

    #[test]
    fn oracle_error_transience() {
        let transient = OracleError::Unavailable {
            attempts: 4,
            detail: "503".into(),
        };
        let permanent = OracleError::Rejected {
            detail: "content_filter".into(),
        };
        assert!(transient.is_transient());
        assert!(!permanent.is_transient());
        assert!(transient.to_string().contains("4 attempt(s)"));
    }

    #[test]
    fn boundary_error_display() {
        let e = BoundaryError::Unresolved {
            left_index: 2,
            right_index: 3,
            best_match_len: 7,
            min_match_len: 20,
            reason: "assisted stitch returned an empty fragment".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("2→3"), "got: {msg}");
        assert!(msg.contains("7 chars"), "got: {msg}");
        assert!(msg.contains("empty fragment"), "got: {msg}");
    }
}
