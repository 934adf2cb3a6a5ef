//! Prompts for summarization requests.
//!
//! Every instruction sent to the model lives here, so changing the tone or
//! structure of the summaries means editing one file. Callers can replace
//! the per-chunk instruction via [`crate::config::SummaryConfig::instruction`];
//! the condensing prompt is always the built-in one.

use crate::config::Strategy;
use crate::pipeline::chunk::Chunk;
use crate::terms::{self, Term};

/// Shared output rules appended to every per-chunk instruction.
const OUTPUT_RULES: &str = r#"Output rules:
- Write plain text. Bullet points with "-" and numbered lists are fine.
- Keep every definition, figure, date, name and legal or technical reference
  that appears in the passage, stated exactly.
- Do NOT add facts that are not in the passage.
- Do NOT wrap the answer in code fences or add commentary about the task."#;

/// Smart strategy: one detected section per request.
pub const SECTION_PROMPT: &str = r#"You are preparing complete study notes from a long document.
You receive one section of it. Write a thorough, well-structured summary of
that section so a reader can study it without the original.

Structure the summary as:
Main concepts: each concept with a short explanation.
Definitions: each term defined in the section.
References: laws, articles, standards or works cited, and what they establish.
Key points: the facts worth remembering.

Leave out any heading that has no content in this section."#;

/// Refine strategy, first chunk.
pub const INITIAL_PROMPT: &str = r#"You are preparing complete study notes from a long document that
arrives in consecutive passages. This is the first passage. Write a detailed,
well-structured summary of it, keeping the document's own order and
terminology."#;

/// Refine strategy, every chunk after the first.
pub const REFINE_PROMPT: &str = r#"You are preparing complete study notes from a long document that
arrives in consecutive passages. The notes written so far are provided as
context. Summarize ONLY the new passage, continuing the existing notes:
reuse their terminology and numbering, do not repeat what they already
cover, and say explicitly when the passage completes or corrects an earlier
point. The start of the passage may repeat the end of the previous one."#;

/// Advanced strategy: a window of consecutive pages.
pub const PAGE_WINDOW_PROMPT: &str = r#"You are preparing complete study notes from a long document.
You receive a window of consecutive pages. Write a detailed summary of these
pages in reading order, grouping related material under short plain-text
headings. The first lines may repeat the end of the previous window; do not
summarize them twice."#;

/// Corrective pass over a report that came out too long.
pub const CONDENSE_PROMPT: &str = r#"You receive study notes assembled from consecutive summaries of one
document. Rewrite them as a single coherent summary that is noticeably
shorter: merge duplicated points, keep all definitions, figures and
references, and keep the existing section headings where they help.
Write plain text without code fences or commentary."#;

/// The built-in instruction for a chunk.
pub fn instruction_for(strategy: Strategy, first_chunk: bool) -> String {
    let base = match strategy {
        Strategy::Smart => SECTION_PROMPT,
        Strategy::Refine if first_chunk => INITIAL_PROMPT,
        Strategy::Refine => REFINE_PROMPT,
        Strategy::Advanced => PAGE_WINDOW_PROMPT,
    };
    format!("{base}\n\n{OUTPUT_RULES}")
}

/// The user message for a chunk: a short locator line, the key terms found
/// in the passage if any, then the text.
pub fn chunk_content(chunk: &Chunk, total_chunks: usize, key_terms: &[Term]) -> String {
    let pages = if chunk.first_page == chunk.last_page {
        format!("page {}", chunk.first_page)
    } else {
        format!("pages {}-{}", chunk.first_page, chunk.last_page)
    };
    let header = match chunk.section {
        Some(ref s) => format!(
            "PASSAGE {}/{} from section \"{}\" ({}):",
            chunk.index, total_chunks, s, pages
        ),
        None => format!("PASSAGE {}/{} ({}):", chunk.index, total_chunks, pages),
    };
    if key_terms.is_empty() {
        format!("{header}\n\n{}", chunk.text)
    } else {
        format!(
            "{header}\n\nKEY REFERENCES IN THIS PASSAGE (keep each one in your notes):\n{}\n\n{}",
            terms::format_term_list(key_terms),
            chunk.text
        )
    }
}

/// The user message for the condensing pass.
pub fn condense_content(report: &str, max_chars: usize) -> String {
    format!(
        "Keep the result under {max_chars} characters.\n\nNOTES:\n\n{report}"
    )
}

/// The context message carrying earlier notes.
pub fn context_message(notes: &str) -> String {
    format!("Notes written so far for earlier passages:\n\n\"\"\"{notes}\"\"\"")
}
