//! Boundary reconciliation: find where two rewritten windows overlap and
//! join them without repeating the shared text.
//!
//! Overlap bookkeeping done in source coordinates cannot be reused here.
//! The oracle changes lengths, whitespace and punctuation, so the region
//! both windows were asked to rewrite has to be rediscovered by content:
//!
//! ```text
//! left.rewritten_text   ...........[ shared block ]~~~
//!                                  ^ a
//! right.rewritten_text        ~~~[ shared block ]..........
//!                                ^ b
//! joined                ...........[ shared block ]..........
//!                       left[..a]  right[b..]
//! ```
//!
//! Only the last `span` chars of left and the first `span` chars of right
//! are compared, where `span = min(len(left), len(right), search_span)`.
//! Within those, the longest common contiguous block wins. Ties go to the
//! earliest start in left, then the earliest start in right.

use crate::config::StitchConfig;
use crate::pipeline::oracle::RewrittenWindow;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How a boundary was joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinStrategy {
    /// Shared block of at least `min_match_len` chars found by alignment.
    Auto,
    /// Alignment failed; the stitch oracle produced the bridging fragment.
    Assisted,
    /// Last resort: both windows kept whole, separated by an audit marker.
    Forced,
}

/// Lifecycle of one boundary during assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryState {
    Pending,
    AutoMatched,
    AssistedMatched,
    Failed,
    /// Failed, then joined under `force_unresolved`.
    Forced,
}

impl From<JoinStrategy> for BoundaryState {
    fn from(s: JoinStrategy) -> Self {
        match s {
            JoinStrategy::Auto => BoundaryState::AutoMatched,
            JoinStrategy::Assisted => BoundaryState::AssistedMatched,
            JoinStrategy::Forced => BoundaryState::Forced,
        }
    }
}

/// How two adjacent rewritten windows are joined.
///
/// The joined text is
/// `left[..match_start_in_left] + bridge + right[match_start_in_right..]`,
/// with offsets in chars of each window's own rewritten text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Join {
    pub left_index: usize,
    pub right_index: usize,
    pub match_start_in_left: usize,
    pub match_start_in_right: usize,
    /// Length of the shared block (`Auto`), or of the best block found
    /// before escalating (`Assisted`, `Forced`).
    pub match_len: usize,
    /// Text inserted between the two halves; empty for `Auto`.
    pub bridge: String,
    pub strategy: JoinStrategy,
}

impl Join {
    pub fn state(&self) -> BoundaryState {
        self.strategy.into()
    }

    /// Apply this join to the two texts it was computed for.
    pub fn apply(&self, left: &str, right: &str) -> String {
        let mut out = String::with_capacity(left.len() + self.bridge.len() + right.len());
        out.push_str(char_prefix(left, self.match_start_in_left));
        out.push_str(&self.bridge);
        out.push_str(char_suffix(right, self.match_start_in_right));
        out
    }
}

/// A common block: `left[left_start..left_start+len] == right[right_start..right_start+len]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Overlap {
    pub left_start: usize,
    pub right_start: usize,
    pub len: usize,
}

/// Alignment below threshold; carries what escalation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unmatched {
    /// Best block found, in each window's own coordinates.
    pub best: Overlap,
    /// Char offset in left where the searched tail begins.
    pub left_tail_start: usize,
    /// Char offset in right where the searched head ends.
    pub right_head_end: usize,
}

impl Unmatched {
    pub fn left_tail<'a>(&self, left: &'a str) -> &'a str {
        char_suffix(left, self.left_tail_start)
    }

    pub fn right_head<'a>(&self, right: &'a str) -> &'a str {
        char_prefix(right, self.right_head_end)
    }
}

/// Aligns adjacent rewritten windows.
#[derive(Debug, Clone, Copy)]
pub struct BoundaryReconciler {
    min_match_len: usize,
    search_span: usize,
}

impl BoundaryReconciler {
    pub fn new(min_match_len: usize, search_span: usize) -> Self {
        Self {
            min_match_len: min_match_len.max(1),
            search_span,
        }
    }

    /// Threshold from `min_match_len`, search span from `overlap_size`.
    pub fn from_config(config: &StitchConfig) -> Self {
        Self::new(config.min_match_len, config.overlap_size)
    }

    pub fn min_match_len(&self) -> usize {
        self.min_match_len
    }

    /// Align `left` and `right`; `Ok` is always an [`JoinStrategy::Auto`] join.
    pub fn reconcile(
        &self,
        left: &RewrittenWindow,
        right: &RewrittenWindow,
    ) -> Result<Join, Unmatched> {
        self.reconcile_from(left, right, 0)
    }

    /// Like [`reconcile`](Self::reconcile), but never looks at the first
    /// `floor` chars of `left`.
    ///
    /// The assembler passes the part of `left` the previous join already
    /// placed in the output, so the cut point can never fall inside it.
    pub fn reconcile_from(
        &self,
        left: &RewrittenWindow,
        right: &RewrittenWindow,
        floor: usize,
    ) -> Result<Join, Unmatched> {
        let left_chars: Vec<char> = left.rewritten_text.chars().collect();
        let right_chars: Vec<char> = right.rewritten_text.chars().collect();

        let span = left_chars
            .len()
            .min(right_chars.len())
            .min(self.search_span);
        let tail_start = (left_chars.len() - span).max(floor.min(left_chars.len()));
        let block = longest_common_block(&left_chars[tail_start..], &right_chars[..span]);

        let best = Overlap {
            left_start: tail_start + block.left_start,
            right_start: block.right_start,
            len: block.len,
        };

        debug!(
            "boundary {}→{}: best block {} chars (threshold {}, span {})",
            left.index(),
            right.index(),
            best.len,
            self.min_match_len,
            span
        );

        if best.len < self.min_match_len {
            return Err(Unmatched {
                best,
                left_tail_start: tail_start,
                right_head_end: span,
            });
        }

        Ok(Join {
            left_index: left.index(),
            right_index: right.index(),
            match_start_in_left: best.left_start,
            match_start_in_right: best.right_start,
            match_len: best.len,
            bridge: String::new(),
            strategy: JoinStrategy::Auto,
        })
    }
}

/// Longest contiguous run shared by `a` and `b`.
///
/// Dynamic programming over one rolling row: `O(|a|·|b|)` time,
/// `O(|b|)` memory. Returns a zero-length overlap when nothing is shared.
pub fn longest_common_block(a: &[char], b: &[char]) -> Overlap {
    let mut best = Overlap::default();
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb { prev[j] + 1 } else { 0 };
            let k = curr[j + 1];
            // Strictly greater: the first block of a given length wins.
            if k > best.len {
                best = Overlap {
                    left_start: i + 1 - k,
                    right_start: j + 1 - k,
                    len: k,
                };
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    best
}

/// First `n` chars of `s`.
pub(crate) fn char_prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((b, _)) => &s[..b],
        None => s,
    }
}

/// `s` without its first `n` chars.
pub(crate) fn char_suffix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((b, _)) => &s[b..],
        None => "",
    }
}
