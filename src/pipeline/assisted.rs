//! Assisted reconciliation: ask the stitch oracle to merge a boundary the
//! automatic aligner could not.
//!
//! The oracle only sees the searched tail of the left window and the
//! searched head of the right window. Its output replaces exactly those two
//! regions, so the joined text becomes
//! `left[..tail_start] + fragment + right[head_end..]`.
//!
//! A fragment is accepted only if it is non-blank and no longer than the two
//! inputs combined. A longer fragment has necessarily invented text.

use crate::error::OracleError;
use crate::pipeline::oracle::StitchOracle;
use thiserror::Error;
use tracing::{debug, warn};

/// Why an assisted stitch was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssistedError {
    #[error("stitch oracle failed: {0}")]
    Oracle(#[from] OracleError),

    #[error("stitch oracle returned an empty fragment")]
    Empty,

    #[error("stitch oracle returned {fragment_len} chars, more than the {limit} it was given")]
    Oversized { fragment_len: usize, limit: usize },
}

/// Merge `left_tail` and `right_head` through `stitcher` and validate the result.
pub async fn reconcile_assisted(
    stitcher: &dyn StitchOracle,
    left_tail: &str,
    right_head: &str,
) -> Result<String, AssistedError> {
    let fragment = stitcher.stitch(left_tail, right_head).await?;

    if fragment.trim().is_empty() {
        warn!("assisted stitch: empty fragment");
        return Err(AssistedError::Empty);
    }

    let limit = left_tail.chars().count() + right_head.chars().count();
    let fragment_len = fragment.chars().count();
    if fragment_len > limit {
        warn!(
            "assisted stitch: fragment of {} chars exceeds input of {}",
            fragment_len, limit
        );
        return Err(AssistedError::Oversized {
            fragment_len,
            limit,
        });
    }

    debug!(
        "assisted stitch: {} + {} chars -> {} chars",
        left_tail.chars().count(),
        right_head.chars().count(),
        fragment_len
    );
    Ok(fragment)
}
