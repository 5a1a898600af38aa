//! Progress-callback trait for per-window and per-boundary events.
//!
//! Inject an [`Arc<dyn AssemblyProgressCallback>`] via
//! [`crate::config::StitchConfigBuilder::progress_callback`] to follow a run:
//! window events arrive while the oracle stage runs (concurrently, in
//! completion order), boundary events arrive afterwards, in boundary order.
//!
//! # Example
//!
//! ```rust
//! use edgequake_stitch::{AssemblyProgressCallback, BoundaryState, StitchConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Escalations(AtomicUsize);
//!
//! impl AssemblyProgressCallback for Escalations {
//!     fn on_boundary_resolved(&self, _left: usize, state: BoundaryState, _len: usize) {
//!         if state == BoundaryState::AssistedMatched {
//!             self.0.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//!
//! let config = StitchConfig::builder()
//!     .progress_callback(Arc::new(Escalations(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::pipeline::reconcile::BoundaryState;
use std::sync::Arc;

/// Called by the assembler as it processes windows and boundaries.
///
/// Window methods may be called concurrently from several tasks;
/// implementations must synchronise shared state. All methods default to
/// no-ops.
pub trait AssemblyProgressCallback: Send + Sync {
    /// Called once after splitting, before any oracle call.
    fn on_assembly_start(&self, total_windows: usize) {
        let _ = total_windows;
    }

    /// Called just before the rewrite oracle is invoked for a window.
    fn on_window_start(&self, index: usize, total_windows: usize) {
        let _ = (index, total_windows);
    }

    /// Called when a window was rewritten.
    ///
    /// `rewritten_len` is the char length of the rewrite.
    fn on_window_complete(&self, index: usize, total_windows: usize, rewritten_len: usize) {
        let _ = (index, total_windows, rewritten_len);
    }

    /// Called when the rewrite oracle failed for a window.
    fn on_window_error(&self, index: usize, total_windows: usize, error: &str) {
        let _ = (index, total_windows, error);
    }

    /// Called when the boundary after window `left_index` was joined.
    fn on_boundary_resolved(&self, left_index: usize, state: BoundaryState, match_len: usize) {
        let _ = (left_index, state, match_len);
    }

    /// Called when the boundary after window `left_index` could not be joined.
    fn on_boundary_failed(&self, left_index: usize, error: &str) {
        let _ = (left_index, error);
    }

    /// Called once at the end of a run, successful or not.
    fn on_assembly_complete(&self, total_windows: usize, success: bool) {
        let _ = (total_windows, success);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AssemblyProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::StitchConfig`].
pub type ProgressCallback = Arc<dyn AssemblyProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        windows_done: AtomicUsize,
        window_errors: AtomicUsize,
        boundaries: AtomicUsize,
        boundary_failures: AtomicUsize,
    }

    impl AssemblyProgressCallback for TrackingCallback {
        fn on_window_complete(&self, _i: usize, _t: usize, _len: usize) {
            self.windows_done.fetch_add(1, Ordering::SeqCst);
        }

        fn on_window_error(&self, _i: usize, _t: usize, _e: &str) {
            self.window_errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_boundary_resolved(&self, _l: usize, _s: BoundaryState, _len: usize) {
            self.boundaries.fetch_add(1, Ordering::SeqCst);
        }

        fn on_boundary_failed(&self, _l: usize, _e: &str) {
            self.boundary_failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_assembly_start(3);
        cb.on_window_start(0, 3);
        cb.on_window_complete(0, 3, 42);
        cb.on_window_error(1, 3, "503");
        cb.on_boundary_resolved(0, BoundaryState::AutoMatched, 2900);
        cb.on_boundary_failed(1, "below threshold");
        cb.on_assembly_complete(3, false);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_window_complete(0, 2, 10);
        tracker.on_window_complete(1, 2, 12);
        tracker.on_window_error(1, 2, "timeout");
        tracker.on_boundary_resolved(0, BoundaryState::AssistedMatched, 4);
        tracker.on_boundary_failed(0, "empty");

        assert_eq!(tracker.windows_done.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.window_errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.boundaries.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.boundary_failures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_assembly_start(10);
        cb.on_window_complete(1, 10, 512);
    }
}
