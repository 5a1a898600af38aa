//! Pipeline stages for window rewriting and reassembly.
//!
//! Each submodule implements exactly one step.
//!
//! ## Data Flow
//!
//! ```text
//! split ──▶ oracle ──▶ postprocess ──▶ reconcile ──▶ assisted
//! (windows) (rewrite)  (cleanup)       (align)       (stitch fallback)
//! ```
//!
//! 1. [`split`]: cut the source text into overlapping windows
//! 2. [`oracle`]: rewrite each window; the only stage with network I/O
//! 3. [`postprocess`]: deterministic cleanup of oracle output
//! 4. [`reconcile`]: find the shared block between adjacent rewrites
//! 5. [`assisted`]: ask the stitch oracle when no block is long enough

pub mod assisted;
pub mod oracle;
pub mod postprocess;
pub mod reconcile;
pub mod split;
