//! # edgequake-stitch
//!
//! Rewrite long documents through an LLM in overlapping windows and stitch
//! the rewrites back into one clean text.
//!
//! ## Why this crate?
//!
//! Text extracted from a PDF is full of running headers, page numbers and
//! sentences broken across lines. A model cleans it well, but not in one
//! call: a textbook chapter is far larger than a useful output budget. This
//! crate cuts the text into overlapping windows, rewrites them concurrently,
//! then finds each overlap again *by content* in the rewritten text and joins
//! the windows so nothing is dropped or repeated.
//!
//! ## Pipeline Overview
//!
//! ```text
//! raw text
//!  │
//!  ├─ 1. Split      overlapping windows (6000 chars, 3000 overlap)
//!  ├─ 2. Rewrite    concurrent oracle calls, retry/backoff per call
//!  ├─ 3. Reconcile  longest common block in each tail/head pair
//!  ├─ 4. Assist     stitch oracle for boundaries with no long-enough block
//!  └─ 5. Splice     one merged document + per-join audit trail
//! ```
//!
//! Any window or boundary that cannot be resolved fails the run with an
//! [`AssemblyReport`] instead of producing a silently corrupted document.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_stitch::{assemble, StitchConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = StitchConfig::builder().document_label("chapter_8").build()?;
//!     let raw = std::fs::read_to_string("chapter_8.txt")?;
//!     let doc = assemble(&raw, &config).await?;
//!     println!("{}", doc.text);
//!     eprintln!("joins: {} auto / {} assisted",
//!         doc.stats.auto_joins,
//!         doc.stats.assisted_joins);
//!     Ok(())
//! }
//! ```
//!
//! ## Custom oracles
//!
//! Anything implementing [`RewriteOracle`] and [`StitchOracle`] can drive
//! [`assemble_with`]. Wrap a rewrite oracle in [`MemoOracle`] to avoid paying
//! twice for windows that already succeeded.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `stitch` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-stitch = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assemble;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use assemble::{assemble, assemble_sync, assemble_to_file, assemble_with, merge_rewritten, plan};
pub use config::{StitchConfig, StitchConfigBuilder};
pub use error::{BoundaryError, OracleError, StitchError};
pub use output::{AssemblyReport, AssemblyStats, BoundaryFailure, MergedDocument, WindowFailure};
pub use pipeline::assisted::{reconcile_assisted, AssistedError};
pub use pipeline::oracle::{LlmOracle, MemoOracle, RewriteOracle, RewrittenWindow, StitchOracle};
pub use pipeline::reconcile::{BoundaryReconciler, BoundaryState, Join, JoinStrategy};
pub use pipeline::split::{split, Window};
pub use progress::{AssemblyProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{rewrite_stream, WindowStream};
