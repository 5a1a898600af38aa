//! Eager (full-document) assembly entry points.
//!
//! A run has five steps:
//!
//! ```text
//! text ──▶ split ──▶ rewrite (concurrent) ──▶ reconcile boundaries ──▶ splice
//!                         │                        │
//!                         └─ any window failed ────┴─ any boundary failed ──▶ AssemblyFailed(report)
//! ```
//!
//! Boundary resolution is strictly sequential. Every boundary whose two
//! rewrites exist is attempted, even after a window or another boundary
//! failed, so a failure report lists all of them at once.

use crate::config::StitchConfig;
use crate::error::{BoundaryError, StitchError};
use crate::output::{AssemblyReport, AssemblyStats, BoundaryFailure, MergedDocument, WindowFailure};
use crate::pipeline::assisted::reconcile_assisted;
use crate::pipeline::oracle::{LlmOracle, RewriteOracle, RewrittenWindow, StitchOracle};
use crate::pipeline::reconcile::{
    char_prefix, BoundaryReconciler, BoundaryState, Join, JoinStrategy, Unmatched,
};
use crate::pipeline::split::{split, Window};
use crate::stream::rewrite_stream;
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Rewrite and reassemble `text` using the LLM provider from `config`.
///
/// The same provider serves as both rewrite and stitch oracle.
///
/// # Errors
/// * [`StitchError::SplitConfiguration`] for invalid window sizes.
/// * [`StitchError::ProviderNotConfigured`] when no provider can be resolved.
/// * [`StitchError::AssemblyFailed`] when any window or boundary failed;
///   the report keeps every successful rewrite.
///
/// # Example
/// ```rust,no_run
/// use edgequake_stitch::{assemble, StitchConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let raw = std::fs::read_to_string("chapter_8.txt")?;
/// let config = StitchConfig::builder().document_label("chapter_8").build()?;
/// let doc = assemble(&raw, &config).await?;
/// println!("{}", doc.text);
/// # Ok(())
/// # }
/// ```
pub async fn assemble(text: &str, config: &StitchConfig) -> Result<MergedDocument, StitchError> {
    let oracle = Arc::new(LlmOracle::from_config(config)?);
    assemble_with(text, config, oracle.clone(), oracle).await
}

/// Rewrite and reassemble `text` with injected oracles.
pub async fn assemble_with(
    text: &str,
    config: &StitchConfig,
    rewriter: Arc<dyn RewriteOracle>,
    stitcher: Arc<dyn StitchOracle>,
) -> Result<MergedDocument, StitchError> {
    let total_start = Instant::now();
    config.validate()?;

    // ── Step 1: Split ────────────────────────────────────────────────────
    let windows = split(text, config.window_size, config.overlap_size)?;
    let total = windows.len();
    let input_chars = text.chars().count();
    info!(
        "Assembling {} chars in {} window(s) ({} / {} overlap)",
        input_chars, total, config.window_size, config.overlap_size
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_assembly_start(total);
    }

    if windows.is_empty() {
        if let Some(ref cb) = config.progress_callback {
            cb.on_assembly_complete(0, true);
        }
        return Ok(MergedDocument::default());
    }

    // ── Step 2: Rewrite every window ─────────────────────────────────────
    let oracle_start = Instant::now();
    let results: Vec<_> = rewrite_stream(windows.clone(), rewriter, config)
        .collect()
        .await;
    let oracle_duration_ms = oracle_start.elapsed().as_millis() as u64;

    let mut rewritten: Vec<Option<RewrittenWindow>> = vec![None; total];
    let mut window_failures: Vec<WindowFailure> = Vec::new();
    for result in results {
        match result {
            Ok(rw) => {
                let i = rw.index();
                rewritten[i] = Some(rw);
            }
            Err(failure) => window_failures.push(failure),
        }
    }
    window_failures.sort_by_key(WindowFailure::index);
    info!(
        "Rewrote {}/{} window(s) in {}ms",
        total - window_failures.len(),
        total,
        oracle_duration_ms
    );

    // ── Step 3: Report window failures ───────────────────────────────────
    if !window_failures.is_empty() {
        warn!(
            "{} window(s) failed; checking the remaining boundaries for the report",
            window_failures.len()
        );
        let slots: Vec<Option<&RewrittenWindow>> = rewritten.iter().map(Option::as_ref).collect();
        let boundaries = resolve_boundaries(&slots, config, stitcher.as_ref()).await;
        if let Some(ref cb) = config.progress_callback {
            cb.on_assembly_complete(total, false);
        }
        return Err(StitchError::AssemblyFailed(Box::new(AssemblyReport {
            windows,
            rewritten,
            window_failures,
            boundary_failures: boundaries.failures,
            boundary_states: boundaries.states,
        })));
    }

    let rewrites: Vec<RewrittenWindow> = rewritten.into_iter().flatten().collect();

    // ── Steps 4-5: Reconcile and splice ──────────────────────────────────
    let mut doc = merge_rewritten(&rewrites, config, stitcher.as_ref()).await?;
    doc.stats.oracle_duration_ms = oracle_duration_ms;
    doc.stats.input_chars = input_chars;
    doc.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Assembly complete: {} windows, {} auto / {} assisted / {} forced joins, {}ms",
        doc.stats.total_windows,
        doc.stats.auto_joins,
        doc.stats.assisted_joins,
        doc.stats.forced_joins,
        doc.stats.total_duration_ms
    );

    Ok(doc)
}

/// Reconcile and splice already-rewritten windows.
///
/// `rewrites` must be the complete, ordered set of rewrites for one split,
/// e.g. from [`AssemblyReport::complete_rewrites`]. Use this after retrying
/// failed windows, or with a relaxed `min_match_len` after a boundary-only
/// failure, without paying for the rewrites again.
pub async fn merge_rewritten(
    rewrites: &[RewrittenWindow],
    config: &StitchConfig,
    stitcher: &dyn StitchOracle,
) -> Result<MergedDocument, StitchError> {
    let start = Instant::now();
    let total = rewrites.len();

    if let Some((pos, rw)) = rewrites.iter().enumerate().find(|(i, rw)| rw.index() != *i) {
        return Err(StitchError::Internal(format!(
            "rewrites out of order: position {} holds window {}",
            pos,
            rw.index()
        )));
    }

    let slots: Vec<Option<&RewrittenWindow>> = rewrites.iter().map(Some).collect();
    let Boundaries {
        joins,
        failures: boundary_failures,
        states: boundary_states,
    } = resolve_boundaries(&slots, config, stitcher).await;

    if !boundary_failures.is_empty() {
        warn!(
            "{} of {} boundary(ies) unresolved",
            boundary_failures.len(),
            total - 1
        );
        if let Some(ref cb) = config.progress_callback {
            cb.on_assembly_complete(total, false);
        }
        return Err(StitchError::AssemblyFailed(Box::new(AssemblyReport {
            windows: rewrites.iter().map(|rw| rw.source_window.clone()).collect(),
            rewritten: rewrites.iter().cloned().map(Some).collect(),
            window_failures: Vec::new(),
            boundary_failures,
            boundary_states,
        })));
    }

    let text = splice(rewrites, &joins);

    let mut stats = AssemblyStats {
        total_windows: total,
        input_chars: rewrites
            .last()
            .map(|rw| rw.source_window.end_offset)
            .unwrap_or(0),
        output_chars: text.chars().count(),
        reconcile_duration_ms: start.elapsed().as_millis() as u64,
        ..Default::default()
    };
    stats.count_joins(&joins);
    stats.total_duration_ms = stats.reconcile_duration_ms;

    if stats.forced_joins > 0 {
        warn!(
            "{} boundary(ies) were force-joined; output may repeat overlap text",
            stats.forced_joins
        );
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_assembly_complete(total, true);
    }

    Ok(MergedDocument {
        text,
        windows: rewrites.iter().map(|rw| rw.source_window.clone()).collect(),
        joins,
        stats,
    })
}

/// Assemble `text` and write the merged document to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn assemble_to_file(
    text: &str,
    output_path: impl AsRef<Path>,
    config: &StitchConfig,
) -> Result<AssemblyStats, StitchError> {
    let doc = assemble(text, config).await?;
    write_atomic(output_path.as_ref(), &doc.text).await?;
    Ok(doc.stats)
}

/// Write `contents` to `path` via a sibling temp file and a rename.
pub async fn write_atomic(path: &Path, contents: &str) -> Result<(), StitchError> {
    let write_err = |e: std::io::Error| StitchError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

/// Synchronous wrapper around [`assemble`].
///
/// Creates a temporary tokio runtime internally.
pub fn assemble_sync(text: &str, config: &StitchConfig) -> Result<MergedDocument, StitchError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| StitchError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(assemble(text, config))
}

/// Split `text` without calling any oracle.
///
/// Does not require an LLM provider or API key.
pub fn plan(text: &str, config: &StitchConfig) -> Result<Vec<Window>, StitchError> {
    split(text, config.window_size, config.overlap_size)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Result of folding over every boundary.
struct Boundaries {
    joins: Vec<Join>,
    failures: Vec<BoundaryFailure>,
    states: Vec<BoundaryState>,
}

/// Resolve every boundary whose two rewrites are present, in order.
///
/// A boundary next to a missing rewrite stays `Pending`. Failures are
/// collected rather than returned early.
async fn resolve_boundaries(
    slots: &[Option<&RewrittenWindow>],
    config: &StitchConfig,
    stitcher: &dyn StitchOracle,
) -> Boundaries {
    let reconciler = BoundaryReconciler::from_config(config);
    let mut out = Boundaries {
        joins: Vec::with_capacity(slots.len().saturating_sub(1)),
        failures: Vec::new(),
        states: vec![BoundaryState::Pending; slots.len().saturating_sub(1)],
    };

    // Chars at the head of the current left window already covered by the
    // previous join.
    let mut consumed = 0usize;

    for (i, pair) in slots.windows(2).enumerate() {
        let (Some(left), Some(right)) = (pair[0], pair[1]) else {
            consumed = 0;
            continue;
        };
        match resolve_boundary(&reconciler, left, right, consumed, config, stitcher).await {
            Ok(join) => {
                consumed = join.match_start_in_right;
                debug!(
                    "boundary {}→{}: {:?}, match {} chars",
                    join.left_index, join.right_index, join.strategy, join.match_len
                );
                if let Some(ref cb) = config.progress_callback {
                    cb.on_boundary_resolved(join.left_index, join.state(), join.match_len);
                }
                out.states[i] = join.state();
                out.joins.push(join);
            }
            Err(failure) => {
                warn!("{}", failure.error);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_boundary_failed(left.index(), &failure.error.to_string());
                }
                consumed = 0;
                if config.force_unresolved {
                    let join = forced_join(left, right, failure.best_match_len());
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_boundary_resolved(join.left_index, BoundaryState::Forced, join.match_len);
                    }
                    out.states[i] = BoundaryState::Forced;
                    out.joins.push(join);
                } else {
                    out.states[i] = BoundaryState::Failed;
                    out.failures.push(failure);
                }
            }
        }
    }

    out
}

/// Auto match, else assisted stitch (if enabled), else failure.
///
/// `consumed` is the number of leading chars of `left` the previous join
/// already placed in the output; the join never cuts before it.
async fn resolve_boundary(
    reconciler: &BoundaryReconciler,
    left: &RewrittenWindow,
    right: &RewrittenWindow,
    consumed: usize,
    config: &StitchConfig,
    stitcher: &dyn StitchOracle,
) -> Result<Join, BoundaryFailure> {
    let unmatched = match reconciler.reconcile_from(left, right, consumed) {
        Ok(join) => return Ok(join),
        Err(u) => u,
    };

    let left_tail = unmatched.left_tail(&left.rewritten_text);
    let right_head = unmatched.right_head(&right.rewritten_text);

    if !config.assisted_reconcile {
        return Err(boundary_failure(
            left,
            right,
            &unmatched,
            reconciler,
            "assisted stitch disabled".to_string(),
        ));
    }

    info!(
        "boundary {}→{}: best match {} chars, escalating to stitch oracle",
        left.index(),
        right.index(),
        unmatched.best.len
    );

    match reconcile_assisted(stitcher, left_tail, right_head).await {
        Ok(fragment) => Ok(Join {
            left_index: left.index(),
            right_index: right.index(),
            match_start_in_left: unmatched.left_tail_start,
            match_start_in_right: unmatched.right_head_end,
            match_len: unmatched.best.len,
            bridge: fragment,
            strategy: JoinStrategy::Assisted,
        }),
        Err(e) => Err(boundary_failure(left, right, &unmatched, reconciler, e.to_string())),
    }
}

fn boundary_failure(
    left: &RewrittenWindow,
    right: &RewrittenWindow,
    unmatched: &Unmatched,
    reconciler: &BoundaryReconciler,
    reason: String,
) -> BoundaryFailure {
    BoundaryFailure {
        error: BoundaryError::Unresolved {
            left_index: left.index(),
            right_index: right.index(),
            best_match_len: unmatched.best.len,
            min_match_len: reconciler.min_match_len(),
            reason,
        },
        left_tail: unmatched.left_tail(&left.rewritten_text).to_string(),
        right_head: unmatched.right_head(&right.rewritten_text).to_string(),
    }
}

/// Keep both windows whole and mark the seam.
fn forced_join(left: &RewrittenWindow, right: &RewrittenWindow, best_match_len: usize) -> Join {
    Join {
        left_index: left.index(),
        right_index: right.index(),
        match_start_in_left: left.rewritten_text.chars().count(),
        match_start_in_right: 0,
        match_len: best_match_len,
        bridge: format!(
            "\n<!-- stitch: forced join windows {}-{} -->\n",
            left.index(),
            right.index()
        ),
        strategy: JoinStrategy::Forced,
    }
}

/// Fold `joins` over `rewrites` into one text.
///
/// After joining into window `i` the merged text ends with
/// `rewrites[i][b..]`, where `b` is the previous join's
/// `match_start_in_right`, so the cut for the next join lies
/// `chars(rewrites[i]) - match_start_in_left` chars before its end. A cut
/// point before `b` is clamped to `b`.
fn splice(rewrites: &[RewrittenWindow], joins: &[Join]) -> String {
    let Some(first) = rewrites.first() else {
        return String::new();
    };

    let mut merged = first.rewritten_text.clone();
    let mut merged_chars = merged.chars().count();
    let mut consumed = 0usize;

    for (join, pair) in joins.iter().zip(rewrites.windows(2)) {
        let (left, right) = (&pair[0], &pair[1]);
        let left_chars = left.rewritten_text.chars().count();
        let keep_until = join.match_start_in_left.max(consumed);
        let tail = left_chars.saturating_sub(keep_until);
        let cut = merged_chars.saturating_sub(tail);

        merged.truncate(char_prefix(&merged, cut).len());
        merged.push_str(&join.bridge);
        let rest = right
            .rewritten_text
            .chars()
            .skip(join.match_start_in_right);
        merged.extend(rest);

        merged_chars = cut
            + join.bridge.chars().count()
            + right
                .rewritten_text
                .chars()
                .count()
                .saturating_sub(join.match_start_in_right);
        consumed = join.match_start_in_right;
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rw(index: usize, text: &str) -> RewrittenWindow {
        RewrittenWindow {
            source_window: Window {
                index,
                start_offset: 0,
                end_offset: text.chars().count(),
                text: text.to_string(),
            },
            rewritten_text: text.to_string(),
        }
    }

    fn auto(left_index: usize, a: usize, b: usize, len: usize) -> Join {
        Join {
            left_index,
            right_index: left_index + 1,
            match_start_in_left: a,
            match_start_in_right: b,
            match_len: len,
            bridge: String::new(),
            strategy: JoinStrategy::Auto,
        }
    }

    #[test]
    fn splice_two_windows() {
        let rewrites = [rw(0, "hello shared"), rw(1, "shared world")];
        let joins = [auto(0, 6, 0, 6)];
        assert_eq!(splice(&rewrites, &joins), "hello shared world");
    }

    #[test]
    fn splice_three_windows_tracks_prefix_end() {
        // w1's match into w2 starts after the part w1 contributed.
        let rewrites = [rw(0, "AAAxyz"), rw(1, "xyzBBBpq"), rw(2, "pqCC")];
        let joins = [auto(0, 3, 0, 3), auto(1, 6, 0, 2)];
        assert_eq!(splice(&rewrites, &joins), "AAAxyzBBBpqCC");
    }

    #[test]
    fn splice_forced_keeps_everything() {
        let rewrites = [rw(0, "left"), rw(1, "right")];
        let join = forced_join(&rewrites[0], &rewrites[1], 3);
        let out = splice(&rewrites, &[join]);
        assert!(out.starts_with("left\n<!-- stitch: forced join windows 0-1 -->\n"));
        assert!(out.ends_with("right"));
    }

    #[test]
    fn splice_assisted_replaces_tail_and_head() {
        let rewrites = [rw(0, "keep-TAIL"), rw(1, "HEAD-keep")];
        let join = Join {
            left_index: 0,
            right_index: 1,
            match_start_in_left: 5,
            match_start_in_right: 4,
            match_len: 0,
            bridge: "T+H".into(),
            strategy: JoinStrategy::Assisted,
        };
        assert_eq!(splice(&rewrites, &[join]), "keep-T+H-keep");
    }

    #[test]
    fn splice_never_cuts_before_previous_join() {
        // Join 0 consumed w1[..3]; join 1 claims a cut at 1.
        let rewrites = [rw(0, "AAxyz"), rw(1, "xyzBB"), rw(2, "yzBBCC")];
        let bridged = Join {
            left_index: 0,
            right_index: 1,
            match_start_in_left: 2,
            match_start_in_right: 3,
            match_len: 0,
            bridge: "xyz".into(),
            strategy: JoinStrategy::Assisted,
        };
        let joins = [bridged, auto(1, 1, 0, 4)];
        // The cut is clamped to 3, so w2's copy of "yz" is kept twice
        // rather than dropping the bridge.
        assert_eq!(splice(&rewrites, &joins), "AAxyzyzBBCC");
    }

    #[test]
    fn splice_single_window() {
        assert_eq!(splice(&[rw(0, "only")], &[]), "only");
        assert_eq!(splice(&[], &[]), "");
    }

    #[test]
    fn plan_uses_config_sizes() {
        let config = StitchConfig::builder()
            .window_size(10)
            .overlap_size(4)
            .build()
            .unwrap();
        let windows = plan(&"x".repeat(25), &config).unwrap();
        assert_eq!(windows.first().map(|w| w.end_offset), Some(10));
        assert_eq!(windows.last().map(|w| w.end_offset), Some(25));
    }
}
