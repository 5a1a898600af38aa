//! Result types produced by the assembler.
//!
//! A run ends in exactly one of two shapes:
//!
//! * [`MergedDocument`]: every window was rewritten and every boundary was
//!   joined. The text is ready for the downstream sectionizer.
//! * [`AssemblyReport`]: carried by [`crate::StitchError::AssemblyFailed`]
//!   when at least one window or boundary failed. It keeps the successful
//!   rewrites so a caller can retry only what failed.

use crate::error::{BoundaryError, OracleError};
use crate::pipeline::oracle::RewrittenWindow;
use crate::pipeline::reconcile::{BoundaryState, Join, JoinStrategy};
use crate::pipeline::split::Window;
use serde::{Deserialize, Serialize};

/// The fully reassembled document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergedDocument {
    /// Final text, windows concatenated in source order with overlaps collapsed.
    pub text: String,
    /// The source windows the document was split into.
    pub windows: Vec<Window>,
    /// One join per adjacent window pair, in boundary order.
    pub joins: Vec<Join>,
    /// Timing and join statistics.
    pub stats: AssemblyStats,
}

impl MergedDocument {
    /// Joins produced by the last-resort forcing policy.
    pub fn forced_joins(&self) -> impl Iterator<Item = &Join> {
        self.joins
            .iter()
            .filter(|j| j.strategy == JoinStrategy::Forced)
    }

    /// True when no boundary had to be forced.
    pub fn is_clean(&self) -> bool {
        self.forced_joins().next().is_none()
    }
}

/// Aggregate statistics for one assembly run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyStats {
    pub total_windows: usize,
    pub auto_joins: usize,
    pub assisted_joins: usize,
    pub forced_joins: usize,
    /// Input length in chars.
    pub input_chars: usize,
    /// Output length in chars.
    pub output_chars: usize,
    pub oracle_duration_ms: u64,
    pub reconcile_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl AssemblyStats {
    pub(crate) fn count_joins(&mut self, joins: &[Join]) {
        for join in joins {
            match join.strategy {
                JoinStrategy::Auto => self.auto_joins += 1,
                JoinStrategy::Assisted => self.assisted_joins += 1,
                JoinStrategy::Forced => self.forced_joins += 1,
            }
        }
    }
}

/// A window whose oracle call failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowFailure {
    pub window: Window,
    pub error: OracleError,
}

impl WindowFailure {
    pub fn index(&self) -> usize {
        self.window.index
    }
}

/// A boundary that neither the automatic nor the assisted path could join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryFailure {
    pub error: BoundaryError,
    /// Tail of the left window that was searched (and sent to the stitcher).
    pub left_tail: String,
    /// Head of the right window that was searched (and sent to the stitcher).
    pub right_head: String,
}

impl BoundaryFailure {
    /// `(left_index, right_index)` of the failed boundary.
    pub fn indices(&self) -> (usize, usize) {
        match &self.error {
            BoundaryError::Unresolved {
                left_index,
                right_index,
                ..
            } => (*left_index, *right_index),
        }
    }

    pub fn best_match_len(&self) -> usize {
        match &self.error {
            BoundaryError::Unresolved { best_match_len, .. } => *best_match_len,
        }
    }
}

/// Structured description of an unsuccessful run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssemblyReport {
    /// All source windows.
    pub windows: Vec<Window>,
    /// `rewritten[i]` is the rewrite of `windows[i]`, if its oracle call succeeded.
    pub rewritten: Vec<Option<RewrittenWindow>>,
    pub window_failures: Vec<WindowFailure>,
    pub boundary_failures: Vec<BoundaryFailure>,
    /// `boundary_states[i]` is the outcome of the boundary between windows
    /// `i` and `i + 1`. A boundary next to a failed window stays `Pending`.
    pub boundary_states: Vec<BoundaryState>,
}

impl AssemblyReport {
    /// Indices of windows that need another oracle pass.
    pub fn failed_window_indices(&self) -> Vec<usize> {
        self.window_failures.iter().map(WindowFailure::index).collect()
    }

    /// All rewrites, if every window succeeded.
    ///
    /// Useful for calling [`crate::merge_rewritten`] again with a relaxed
    /// `min_match_len` after a boundary-only failure.
    pub fn complete_rewrites(&self) -> Option<Vec<RewrittenWindow>> {
        self.rewritten.iter().cloned().collect()
    }

    /// Left indices of boundaries that could not be attempted yet.
    pub fn pending_boundaries(&self) -> Vec<usize> {
        self.boundary_states
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == BoundaryState::Pending)
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(index: usize) -> Window {
        Window {
            index,
            start_offset: index * 10,
            end_offset: index * 10 + 20,
            text: "x".repeat(20),
        }
    }

    #[test]
    fn failed_window_indices_in_order() {
        let report = AssemblyReport {
            window_failures: vec![
                WindowFailure {
                    window: window(1),
                    error: OracleError::Rejected {
                        detail: "nope".into(),
                    },
                },
                WindowFailure {
                    window: window(4),
                    error: OracleError::Unavailable {
                        attempts: 3,
                        detail: "timeout".into(),
                    },
                },
            ],
            ..Default::default()
        };
        assert_eq!(report.failed_window_indices(), vec![1, 4]);
    }

    #[test]
    fn complete_rewrites_requires_every_window() {
        let rw = RewrittenWindow {
            source_window: window(0),
            rewritten_text: "x".into(),
        };
        let partial = AssemblyReport {
            rewritten: vec![Some(rw.clone()), None],
            ..Default::default()
        };
        assert!(partial.complete_rewrites().is_none());

        let full = AssemblyReport {
            rewritten: vec![Some(rw.clone()), Some(rw)],
            ..Default::default()
        };
        assert_eq!(full.complete_rewrites().map(|v| v.len()), Some(2));
    }

    #[test]
    fn pending_boundaries_by_left_index() {
        let report = AssemblyReport {
            boundary_states: vec![
                BoundaryState::Pending,
                BoundaryState::Failed,
                BoundaryState::AutoMatched,
                BoundaryState::Pending,
            ],
            ..Default::default()
        };
        assert_eq!(report.pending_boundaries(), vec![0, 3]);
    }

    #[test]
    fn boundary_failure_accessors() {
        let f = BoundaryFailure {
            error: BoundaryError::Unresolved {
                left_index: 0,
                right_index: 1,
                best_match_len: 12,
                min_match_len: 20,
                reason: "assisted stitch disabled".into(),
            },
            left_tail: "abc".into(),
            right_head: "def".into(),
        };
        assert_eq!(f.indices(), (0, 1));
        assert_eq!(f.best_match_len(), 12);
    }
}
