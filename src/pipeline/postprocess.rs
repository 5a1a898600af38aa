//! Post-processing: deterministic cleanup of raw oracle output.
//!
//! Even with explicit instructions, chat models wrap their answer in
//! ` ```markdown ` fences, echo the `"""` delimiters the prompt used around
//! the input, or emit CRLF line endings and zero-width characters copied
//! from the extracted text. Any of these would show up as spurious
//! differences at window edges and shorten the overlap the reconciler can
//! find, so they are removed before a rewrite leaves the oracle.
//!
//! Rules run in a fixed order: fences and delimiters are stripped from the
//! trimmed whole first, then line-level normalisation runs on what is left.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to a raw oracle response.
///
/// 1. Strip an outer markdown/text code fence
/// 2. Strip echoed `"""` input delimiters
/// 3. Normalise line endings (CRLF → LF)
/// 4. Trim trailing whitespace per line
/// 5. Collapse 4+ consecutive newlines down to 3
/// 6. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
pub fn clean_output(input: &str) -> String {
    let s = strip_markdown_fences(input);
    let s = strip_quote_delimiters(&s);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    remove_invisible_chars(&s)
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:markdown|md|text)?[ \t]*\r?\n(.*?)\r?\n```\s*$").unwrap()
});

fn strip_markdown_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Strip echoed delimiters ──────────────────────────────────────────

static RE_QUOTE_DELIMITERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)^"""[ \t]*\r?\n?(.*?)\r?\n?[ \t]*"""$"#).unwrap());

fn strip_quote_delimiters(input: &str) -> String {
    match RE_QUOTE_DELIMITERS.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 3: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 4: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Rule 6: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}
