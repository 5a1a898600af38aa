//! Prompts for the rewrite and stitch oracles.
//!
//! Callers can override the rewrite prompt via
//! [`crate::config::StitchConfig::system_prompt`]; the stitch prompt is fixed
//! because the assisted reconciler validates its output shape.

/// Default system prompt for rewriting one window of extracted text.
pub const DEFAULT_REWRITE_PROMPT: &str = r#"You are a text-cleaning assistant. The user sends one chunk of text that was extracted from a PDF. It contains extraction noise: running headers and footers, page numbers, and line breaks that cut sentences in half.

Follow these rules precisely:

1. NOISE
   - Remove running headers, footers, page numbers, and publication titles
   - Keep a chapter title only where the chapter actually begins

2. FLOW
   - Join sentences that were split across lines
   - Keep paragraphs separated by a single blank line

3. HEADINGS
   - Mark chapters and sections with markdown headings: `# Chapter 5`, `## 8.1 Attention`, `### 13.2.1 RNNs in production`
   - The chunk may start or end mid-section; only add a heading where one is clearly present in the text

4. LITERAL HASHES
   - If a line of data or code starts with a literal `#`, escape it as `\#` so it is not read as a heading

5. FIDELITY
   - Do NOT change the wording, summarise, or reorder content
   - The chunk will be merged with its neighbours later; do not try to complete a sentence cut off at either edge

6. OUTPUT FORMAT
   - Output ONLY the cleaned text
   - Do NOT wrap it in code fences or quotes
   - Do NOT add commentary"#;

/// System prompt for the assisted stitch of two overlapping fragments.
pub const STITCH_SYSTEM_PROMPT: &str = r#"You merge two fragments of the same document. The LEFT fragment ends with text that the RIGHT fragment begins with; the shared region may differ slightly in whitespace, punctuation, casing, or wording because each fragment was cleaned separately.

Produce one fragment that contains the LEFT text followed by the continuation from the RIGHT text, with the shared region appearing exactly once.

Rules:
- Do not add, summarise, or reorder content
- Where the two versions of the shared region disagree, prefer the LEFT wording
- Output ONLY the merged fragment, with no code fences, quotes, or commentary"#;

/// Human-readable name for a document label such as `chapter_8`.
///
/// `chapter_N` → `Chapter N`, `appendix_X` → `Appendix X`; anything else is
/// used as-is.
pub fn display_label(label: &str) -> String {
    if let Some(rest) = label.strip_prefix("chapter_") {
        format!("Chapter {rest}")
    } else if let Some(rest) = label.strip_prefix("appendix_") {
        format!("Appendix {rest}")
    } else {
        label.to_string()
    }
}

/// Build the user message for rewriting one window.
pub fn rewrite_request(window_text: &str, label: Option<&str>) -> String {
    let source = match label {
        Some(l) if !l.is_empty() => format!("a chunk of {}", display_label(l)),
        _ => "a chunk of a longer document".to_string(),
    };
    format!("The following text is {source}.\n\n\"\"\"\n{window_text}\n\"\"\"")
}

/// Build the user message for stitching two overlapping fragments.
pub fn stitch_request(left_tail: &str, right_head: &str) -> String {
    format!(
        "LEFT fragment:\n\"\"\"\n{left_tail}\n\"\"\"\n\nRIGHT fragment:\n\"\"\"\n{right_head}\n\"\"\""
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_label_chapter_and_appendix() {
        assert_eq!(display_label("chapter_8"), "Chapter 8");
        assert_eq!(display_label("appendix_B"), "Appendix B");
        assert_eq!(display_label("preface"), "preface");
    }

    #[test]
    fn rewrite_request_embeds_label_and_text() {
        let msg = rewrite_request("some text", Some("chapter_3"));
        assert!(msg.contains("Chapter 3"));
        assert!(msg.contains("\"\"\"\nsome text\n\"\"\""));
    }

    #[test]
    fn rewrite_request_without_label() {
        let msg = rewrite_request("body", None);
        assert!(msg.contains("a longer document"));
    }

    #[test]
    fn stitch_request_orders_fragments() {
        let msg = stitch_request("LEFTTAIL", "RIGHTHEAD");
        let l = msg.find("LEFTTAIL").unwrap();
        let r = msg.find("RIGHTHEAD").unwrap();
        assert!(l < r);
    }

    #[test]
    fn prompts_forbid_fences() {
        assert!(DEFAULT_REWRITE_PROMPT.contains("code fences"));
        assert!(STITCH_SYSTEM_PROMPT.contains("exactly once"));
    }
}
