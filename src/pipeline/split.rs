//! Window splitting: cut a document into overlapping, char-aligned windows.
//!
//! ```text
//! window_size = 6000, overlap_size = 3000, len = 7000
//!
//! Window 0: [0, 6000)
//! Window 1: [3000, 7000)      <- cursor advanced by 6000 - 3000
//! Window 2: [4000, 7000)      <- naive [6000, 7000) is only 1000 chars,
//!                                shifted back so it is exactly 3000
//! ```
//!
//! Every window except a lone short document is at least `overlap_size`
//! chars long, so the reconciler always has a full overlap to search.
//! Offsets are char indices, not byte indices: a window never starts or ends
//! inside a multi-byte character.

use crate::error::StitchError;
use serde::{Deserialize, Serialize};

/// A slice of the source document sent to the rewrite oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    /// Position in the split (0-based).
    pub index: usize,
    /// Start offset in chars, inclusive.
    pub start_offset: usize,
    /// End offset in chars, exclusive.
    pub end_offset: usize,
    /// Source text `[start_offset, end_offset)`.
    pub text: String,
}

impl Window {
    /// Length in chars.
    pub fn len(&self) -> usize {
        self.end_offset - self.start_offset
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Check that `window_size > overlap_size > 0`.
pub fn validate_sizes(window_size: usize, overlap_size: usize) -> Result<(), StitchError> {
    let reason = if overlap_size == 0 {
        "overlap_size must be greater than 0"
    } else if window_size <= overlap_size {
        "overlap_size must be smaller than window_size"
    } else {
        return Ok(());
    };
    Err(StitchError::SplitConfiguration {
        window_size,
        overlap_size,
        reason: reason.to_string(),
    })
}

/// Split `text` into overlapping windows.
///
/// The cursor advances by `window_size - overlap_size` while it is inside the
/// document. A clipped window shorter than `overlap_size` is shifted back to
/// start at `len - overlap_size`; it is always the last window emitted.
/// Splitting stops at a full-size window ending exactly at the document end.
///
/// # Errors
/// [`StitchError::SplitConfiguration`] unless `window_size > overlap_size > 0`.
pub fn split(
    text: &str,
    window_size: usize,
    overlap_size: usize,
) -> Result<Vec<Window>, StitchError> {
    validate_sizes(window_size, overlap_size)?;

    let bounds = char_boundaries(text);
    let len = bounds.len() - 1;
    let slice = |start: usize, end: usize| text[bounds[start]..bounds[end]].to_string();

    if len == 0 {
        return Ok(Vec::new());
    }
    if len <= window_size {
        return Ok(vec![Window {
            index: 0,
            start_offset: 0,
            end_offset: len,
            text: text.to_string(),
        }]);
    }

    let step = window_size - overlap_size;
    let mut windows: Vec<Window> = Vec::with_capacity(len.div_ceil(step));
    let mut cursor = 0;

    while cursor < len {
        let end = (cursor + window_size).min(len);
        let start = if end - cursor < overlap_size {
            len - overlap_size
        } else {
            cursor
        };

        // A shifted start that does not move past the previous window would
        // only re-emit text that window already ends with.
        if windows.last().is_some_and(|w| w.start_offset >= start) {
            break;
        }

        windows.push(Window {
            index: windows.len(),
            start_offset: start,
            end_offset: end,
            text: slice(start, end),
        });

        // Shifted tail, or a window that ends exactly at `len`: the next
        // cursor would only yield a window already inside this one.
        if start != cursor || cursor + window_size == len {
            break;
        }
        cursor += step;
    }

    Ok(windows)
}

/// Byte offset of every char start, plus `text.len()` as a sentinel.
pub(crate) fn char_boundaries(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(b, _)| b)
        .chain(std::iter::once(text.len()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(windows: &[Window]) -> Vec<(usize, usize)> {
        windows
            .iter()
            .map(|w| (w.start_offset, w.end_offset))
            .collect()
    }

    #[test]
    fn empty_text_yields_no_windows() {
        assert!(split("", 10, 3).unwrap().is_empty());
    }

    #[test]
    fn short_text_yields_one_window() {
        let w = split("hello", 10, 3).unwrap();
        assert_eq!(ranges(&w), vec![(0, 5)]);
        assert_eq!(w[0].text, "hello");
    }

    #[test]
    fn text_exactly_window_size_is_one_window() {
        let text = "a".repeat(10);
        assert_eq!(ranges(&split(&text, 10, 3).unwrap()), vec![(0, 10)]);
    }

    #[test]
    fn invalid_sizes_rejected() {
        assert!(matches!(
            split("abc", 10, 0),
            Err(StitchError::SplitConfiguration { .. })
        ));
        assert!(matches!(
            split("abc", 10, 10),
            Err(StitchError::SplitConfiguration { .. })
        ));
        assert!(matches!(
            split("abc", 5, 8),
            Err(StitchError::SplitConfiguration { .. })
        ));
    }

    #[test]
    fn ten_thousand_chars_final_window_not_shifted() {
        let text = "x".repeat(10_000);
        let w = split(&text, 6000, 3000).unwrap();
        assert_eq!(w[0].start_offset, 0);
        assert_eq!(w[0].end_offset, 6000);
        // The naive [6000, 10000) window is 4000 chars, already >= overlap.
        assert!(ranges(&w).contains(&(6000, 10_000)));
        assert_eq!(ranges(&w)[..3], [(0, 6000), (3000, 9000), (6000, 10_000)]);
    }

    #[test]
    fn window_ending_exactly_at_len_is_last() {
        let text = "x".repeat(9_000);
        let w = split(&text, 6000, 3000).unwrap();
        assert_eq!(ranges(&w), vec![(0, 6000), (3000, 9000)]);

        let text = "x".repeat(24);
        assert_eq!(
            ranges(&split(&text, 10, 4).unwrap()),
            vec![(0, 10), (6, 16), (12, 22), (18, 24)]
        );
        let text = "x".repeat(22);
        assert_eq!(
            ranges(&split(&text, 10, 4).unwrap()),
            vec![(0, 10), (6, 16), (12, 22)]
        );
    }

    #[test]
    fn seven_thousand_chars_final_window_shifted_back() {
        let text = "x".repeat(7000);
        let w = split(&text, 6000, 3000).unwrap();
        assert_eq!(ranges(&w), vec![(0, 6000), (3000, 7000), (4000, 7000)]);
        let last = w.last().unwrap();
        assert_eq!(last.len(), 3000);
    }

    #[test]
    fn indices_are_sequential() {
        let text = "y".repeat(95);
        let w = split(&text, 20, 5).unwrap();
        for (i, win) in w.iter().enumerate() {
            assert_eq!(win.index, i);
        }
    }

    #[test]
    fn shift_never_repeats_previous_start() {
        // step 2 with a large overlap: the shift target can land on an
        // existing start; it must not produce a duplicate window.
        let text = "z".repeat(15);
        let w = split(&text, 10, 8).unwrap();
        for pair in w.windows(2) {
            assert!(pair[0].start_offset < pair[1].start_offset);
        }
        assert_eq!(w.last().unwrap().end_offset, 15);
    }

    #[test]
    fn multibyte_text_is_char_aligned() {
        let text = "é".repeat(25);
        let w = split(&text, 10, 4).unwrap();
        for win in &w {
            assert_eq!(win.text.chars().count(), win.len());
            assert!(win.text.chars().all(|c| c == 'é'));
        }
        assert_eq!(w.last().unwrap().end_offset, 25);
    }

    #[test]
    fn window_text_matches_offsets() {
        let text: String = ('a'..='z').cycle().take(200).collect();
        let chars: Vec<char> = text.chars().collect();
        for win in split(&text, 50, 20).unwrap() {
            let expected: String = chars[win.start_offset..win.end_offset].iter().collect();
            assert_eq!(win.text, expected);
        }
    }
}
