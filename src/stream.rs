//! Streaming rewrite API: emit windows as their oracle calls complete.
//!
//! [`crate::assemble::assemble_with`] waits for every window before any
//! boundary work starts, because reconciliation needs both neighbours. Callers
//! that only want the rewrites (to persist them, to show partial output, or
//! to feed [`crate::assemble::merge_rewritten`] later) can consume this
//! stream directly.
//!
//! Items arrive in completion order, not window order. Sort by
//! [`RewrittenWindow::index`] if order matters.

use crate::config::StitchConfig;
use crate::output::WindowFailure;
use crate::pipeline::oracle::{RewriteOracle, RewrittenWindow};
use crate::pipeline::split::Window;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::{debug, warn};

/// A boxed stream of per-window rewrite results.
pub type WindowStream =
    Pin<Box<dyn Stream<Item = Result<RewrittenWindow, WindowFailure>> + Send>>;

/// Rewrite `windows` through `oracle`, at most `config.oracle_concurrency`
/// calls in flight.
///
/// Progress events from `config.progress_callback` fire per window. A failed
/// window never affects the others.
///
/// # Example
/// ```rust,no_run
/// use edgequake_stitch::{rewrite_stream, split, LlmOracle, StitchConfig};
/// use futures::StreamExt;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = StitchConfig::default();
/// let windows = split("raw extracted text", config.window_size, config.overlap_size)?;
/// let oracle = Arc::new(LlmOracle::from_config(&config)?);
/// let mut stream = rewrite_stream(windows, oracle, &config);
/// while let Some(item) = stream.next().await {
///     match item {
///         Ok(rw) => println!("window {}: {} chars", rw.index(), rw.rewritten_text.len()),
///         Err(f) => eprintln!("window {} failed: {}", f.index(), f.error),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn rewrite_stream(
    windows: Vec<Window>,
    oracle: Arc<dyn RewriteOracle>,
    config: &StitchConfig,
) -> WindowStream {
    let total = windows.len();
    let concurrency = config.oracle_concurrency.max(1);
    let callback = config.progress_callback.clone();

    let s = stream::iter(windows.into_iter().map(move |window| {
        let oracle = Arc::clone(&oracle);
        let callback = callback.clone();
        async move {
            if let Some(ref cb) = callback {
                cb.on_window_start(window.index, total);
            }

            match oracle.rewrite(&window.text).await {
                Ok(rewritten_text) => {
                    debug!(
                        "window {}: {} -> {} chars",
                        window.index,
                        window.len(),
                        rewritten_text.chars().count()
                    );
                    if let Some(ref cb) = callback {
                        cb.on_window_complete(window.index, total, rewritten_text.chars().count());
                    }
                    Ok(RewrittenWindow {
                        source_window: window,
                        rewritten_text,
                    })
                }
                Err(error) => {
                    warn!("window {} failed: {}", window.index, error);
                    if let Some(ref cb) = callback {
                        cb.on_window_error(window.index, total, &error.to_string());
                    }
                    Err(WindowFailure { window, error })
                }
            }
        }
    }))
    .buffer_unordered(concurrency);

    Box::pin(s)
}
