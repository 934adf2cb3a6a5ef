//! Post-processing: deterministic cleanup of model-generated summary text.
//!
//! Even with explicit instructions, models sometimes wrap their answer in a
//! code fence, mix line endings, or leak zero-width characters copied from
//! the source PDF. These rules fix such artefacts without touching content.
//!
//! ## Rule Order
//!
//! Fences are stripped before line endings are normalised so the fence
//! regex sees the raw answer; invisible characters go before blank-line
//! collapsing so a line holding only a ZWSP counts as blank.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all post-processing rules to raw model output.
///
/// Rules (applied in order):
/// 1. Strip an outer code fence (```` ```text ````, ```` ```markdown ````, …)
/// 2. Normalise line endings (CRLF → LF)
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Trim trailing whitespace per line, and leading blank lines and
///    spaces before the first word
/// 5. Collapse 3+ consecutive blank lines down to 2
/// 6. Ensure heading lines have a blank line before them
/// 7. Ensure the text ends with exactly one newline
///
/// Whitespace-only input yields an empty string; callers treat that as an
/// empty response.
pub fn clean_summary(input: &str) -> String {
    let s = strip_outer_fence(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = s.trim_start();
    if s.is_empty() {
        return String::new();
    }
    let s = collapse_blank_lines(s);
    let s = normalise_heading_spacing(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Strip outer code fence ───────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)\r?\n```\s*$").unwrap());

fn strip_outer_fence(input: &str) -> String {
    match RE_OUTER_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 4: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Rule 6: Normalise heading spacing ────────────────────────────────────────

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6} \S").unwrap());

fn normalise_heading_spacing(input: &str) -> String {
    let mut result = String::with_capacity(input.len() + 64);
    for (i, line) in input.lines().enumerate() {
        if i > 0 && RE_HEADING.is_match(line) {
            let trimmed = result.trim_end_matches('\n').len();
            result.truncate(trimmed);
            result.push_str("\n\n");
        }
        result.push_str(line);
        result.push('\n');
    }
    result
}

// ── Rule 7: Ensure text ends with single newline ─────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    format!("{}\n", input.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fence_with_language() {
        assert_eq!(strip_outer_fence("```text\nHello\nWorld\n```"), "Hello\nWorld");
        assert_eq!(strip_outer_fence("```markdown\n# A\n```"), "# A");
        assert_eq!(strip_outer_fence("```\nplain\n```\n"), "plain");
    }

    #[test]
    fn test_inner_fence_untouched() {
        let input = "Intro\n```\ncode\n```\nOutro";
        assert_eq!(strip_outer_fence(input), input);
    }

    #[test]
    fn test_leading_blank_lines_and_indent_removed() {
        assert_eq!(clean_summary("\n\n  text"), "text\n");
        assert_eq!(
            clean_summary("\r\n\u{200B}\n   First line\n  - item"),
            "First line\n  - item\n"
        );
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "hello\u{200B}world\u{FEFF}foo\u{00AD}bar";
        assert_eq!(remove_invisible_chars(input), "helloworldfoobar");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\n\nb");
    }

    #[test]
    fn test_heading_spacing() {
        let result = normalise_heading_spacing("some text\n## Heading\nmore");
        assert_eq!(result, "some text\n\n## Heading\nmore\n");
    }

    #[test]
    fn test_hashtag_is_not_heading() {
        let result = normalise_heading_spacing("line\n#hashtag");
        assert_eq!(result, "line\n#hashtag\n");
    }

    #[test]
    fn test_whitespace_only_becomes_empty() {
        assert_eq!(clean_summary("  \r\n\u{200B}\n "), "");
        assert_eq!(clean_summary("```\n\n```"), "");
    }

    #[test]
    fn test_clean_summary_full_pipeline() {
        let input = "```text\nKey points   \r\n\r\n\r\n\r\n\r\n- one\u{200B}\n# Next\ntwo\n```";
        let result = clean_summary(input);
        assert_eq!(result, "Key points\n\n\n- one\n\n# Next\ntwo\n");
    }
}
