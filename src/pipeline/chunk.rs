//! Chunking: split document text into bounded pieces for the LLM.
//!
//! ## Guarantees
//!
//! * Every chunk holds at most `max_chars` characters, overlap included.
//! * Chunks are ordered, and dropping each chunk's leading `overlap`
//!   characters and concatenating the rest yields the document text exactly.
//! * Cuts always fall on char boundaries, never inside a code point.
//!
//! ## Where to cut
//!
//! Within the window a chunk may cover, the cut goes at the latest break of
//! the highest-ranked kind found in the second half of the window:
//!
//! 1. page start ([`ChunkMode::Pages`] only)
//! 2. paragraph break (`\n\n`)
//! 3. line break
//! 4. sentence end (`.`, `?` or `!` followed by whitespace)
//! 5. whitespace
//! 6. the window end itself
//!
//! In [`ChunkMode::Sections`] every detected section start is a hard cut:
//! a chunk never spans two sections and the chunk after a hard cut carries
//! no overlap.

use crate::document::Document;
use crate::error::SummarizeError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How the chunker aligns cuts to document structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkMode {
    /// Hard cuts at detected section starts.
    Sections,
    /// Natural breaks only.
    Recursive,
    /// Prefer page boundaries.
    Pages,
}

/// A contiguous slice of the document text sent to the LLM in one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// 1-based position in the chunk sequence.
    pub index: usize,
    /// Char offset of the first char in `text` (overlap included).
    pub start: usize,
    /// Char offset one past the last char in `text`.
    pub end: usize,
    /// Leading chars repeated from the previous chunk.
    pub overlap: usize,
    /// Title of the section containing the chunk's first new char.
    pub section: Option<String>,
    /// 1-based page of the first new char.
    pub first_page: usize,
    /// 1-based page of the last char.
    pub last_page: usize,
    pub text: String,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }

    /// The part of `text` not shared with the previous chunk.
    pub fn new_text(&self) -> &str {
        match self.text.char_indices().nth(self.overlap) {
            Some((byte, _)) => &self.text[byte..],
            None => "",
        }
    }

    /// Rough token count (4 chars per token).
    pub fn estimated_tokens(&self) -> usize {
        self.char_len().div_ceil(4)
    }
}

/// Splits documents into [`Chunk`]s.
#[derive(Debug, Clone)]
pub struct Chunker {
    max_chars: usize,
    overlap: usize,
    mode: ChunkMode,
}

impl Chunker {
    /// `max_chars` is raised to 1 and `overlap` clamped below it.
    pub fn new(max_chars: usize, overlap: usize, mode: ChunkMode) -> Self {
        let max_chars = max_chars.max(1);
        Self {
            max_chars,
            overlap: overlap.min(max_chars - 1),
            mode,
        }
    }

    /// Chunk plain text with no page or section structure.
    pub fn split_text(&self, text: &str) -> Result<Vec<Chunk>, SummarizeError> {
        self.chunk(&Document::from_text(text))
    }

    /// Chunk a document's text.
    pub fn chunk(&self, doc: &Document) -> Result<Vec<Chunk>, SummarizeError> {
        self.split_with(doc, doc.text.chars().collect())
    }

    fn split_with(&self, doc: &Document, chars: Vec<char>) -> Result<Vec<Chunk>, SummarizeError> {
        if chars.iter().all(|c| c.is_whitespace()) {
            return Err(SummarizeError::EmptyDocument);
        }
        let n = chars.len();

        let mut hard: Vec<usize> = match self.mode {
            ChunkMode::Sections => doc
                .sections
                .iter()
                .map(|s| s.offset)
                .filter(|&o| o > 0 && o < n)
                .collect(),
            _ => Vec::new(),
        };
        hard.push(n);
        hard.dedup();

        let page_breaks: &[usize] = match self.mode {
            ChunkMode::Pages => &doc.page_starts,
            _ => &[],
        };

        let mut chunks = Vec::new();
        let mut seg_start = 0usize;
        for seg_end in hard {
            let mut pos = seg_start;
            let mut ov = 0usize;
            while pos < seg_end {
                let budget = self.max_chars - ov;
                let limit = (pos + budget).min(seg_end);
                let cut = if limit == seg_end {
                    seg_end
                } else {
                    find_cut(&chars, pos, limit, budget, page_breaks)
                };

                let start = pos - ov;
                chunks.push(Chunk {
                    index: chunks.len() + 1,
                    start,
                    end: cut,
                    overlap: ov,
                    section: doc.section_at(pos).map(|s| s.title.clone()),
                    first_page: doc.page_at(pos),
                    last_page: doc.page_at(cut - 1),
                    text: chars[start..cut].iter().collect(),
                });

                ov = if cut < seg_end {
                    self.overlap.min(cut - seg_start)
                } else {
                    0
                };
                pos = cut;
            }
            seg_start = seg_end;
        }

        debug!(
            "Chunked {} chars into {} chunks (max {}, overlap {}, {:?})",
            n,
            chunks.len(),
            self.max_chars,
            self.overlap,
            self.mode
        );
        Ok(chunks)
    }
}

/// Pick the cut position in `(pos, limit]`, preferring the best break kind
/// in the back half of the window.
fn find_cut(chars: &[char], pos: usize, limit: usize, budget: usize, pages: &[usize]) -> usize {
    let lo = pos + (budget / 2).max(1);

    if let Some(&p) = pages.iter().rev().find(|&&p| p >= lo && p <= limit) {
        return p;
    }

    let rules: [fn(&[char], usize) -> bool; 4] = [
        |c, i| i >= 2 && c[i - 1] == '\n' && c[i - 2] == '\n',
        |c, i| c[i - 1] == '\n',
        |c, i| i >= 2 && c[i - 1].is_whitespace() && matches!(c[i - 2], '.' | '?' | '!'),
        |c, i| c[i - 1].is_whitespace(),
    ];
    for rule in rules {
        if let Some(cut) = (lo..=limit).rev().find(|&i| rule(chars, i)) {
            return cut;
        }
    }
    limit
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(chunks: &[Chunk]) -> String {
        chunks.iter().map(|c| c.new_text()).collect()
    }

    fn paragraphs(n: usize) -> String {
        (0..n)
            .map(|i| format!("Paragraph {i} talks about things. It has two sentences."))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[test]
    fn empty_text_is_an_error() {
        let c = Chunker::new(100, 10, ChunkMode::Recursive);
        assert!(matches!(c.split_text(""), Err(SummarizeError::EmptyDocument)));
        assert!(matches!(
            c.split_text(" \n\t "),
            Err(SummarizeError::EmptyDocument)
        ));
    }

    #[test]
    fn split_text_chunks_sit_on_page_one() {
        let c = Chunker::new(20, 5, ChunkMode::Pages);
        let text = "First sentence here. Second sentence here. Third one.";
        let chunks = c.split_text(text).unwrap();
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|ch| ch.first_page == 1 && ch.last_page == 1));
        assert_eq!(chunks.last().unwrap().end, text.chars().count());
    }

    #[test]
    fn short_text_is_one_chunk() {
        let c = Chunker::new(100, 10, ChunkMode::Recursive);
        let chunks = c.split_text("Hello world.").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 1);
        assert_eq!(chunks[0].overlap, 0);
        assert_eq!(chunks[0].text, "Hello world.");
    }

    #[test]
    fn chunks_respect_size_and_reconstruct() {
        let text = paragraphs(40);
        for (max, ov) in [(120, 0), (120, 30), (200, 50), (57, 20)] {
            let chunks = Chunker::new(max, ov, ChunkMode::Recursive)
                .split_text(&text)
                .unwrap();
            assert!(chunks.len() > 1);
            for c in &chunks {
                assert!(c.text.chars().count() <= max, "chunk {} too long", c.index);
                assert_eq!(c.text.chars().count(), c.char_len());
            }
            assert_eq!(reconstruct(&chunks), text, "max={max} ov={ov}");
        }
    }

    #[test]
    fn prefers_paragraph_breaks() {
        let text = paragraphs(10);
        let chunks = Chunker::new(150, 0, ChunkMode::Recursive)
            .split_text(&text)
            .unwrap();
        for c in &chunks[..chunks.len() - 1] {
            assert!(c.text.ends_with("\n\n"), "chunk {:?}", c.text);
        }
    }

    #[test]
    fn overlap_repeats_previous_tail() {
        let text = paragraphs(10);
        let chunks = Chunker::new(150, 25, ChunkMode::Recursive)
            .split_text(&text)
            .unwrap();
        assert_eq!(chunks[0].overlap, 0);
        for pair in chunks.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            assert_eq!(next.overlap, 25);
            assert_eq!(next.start, prev.end - 25);
            let tail: String = prev.text.chars().skip(prev.char_len() - 25).collect();
            assert!(next.text.starts_with(&tail));
        }
    }

    #[test]
    fn unbroken_text_cut_at_window_end() {
        let text = "x".repeat(250);
        let chunks = Chunker::new(100, 0, ChunkMode::Recursive)
            .split_text(&text)
            .unwrap();
        let lens: Vec<usize> = chunks.iter().map(|c| c.char_len()).collect();
        assert_eq!(lens, vec![100, 100, 50]);
    }

    #[test]
    fn multibyte_text_never_splits_code_points() {
        let text = "città è già qui ✓ 日本語のテキスト ".repeat(30);
        let chunks = Chunker::new(37, 5, ChunkMode::Recursive)
            .split_text(&text)
            .unwrap();
        for c in &chunks {
            assert!(c.text.chars().count() <= 37);
        }
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn max_one_char() {
        let chunks = Chunker::new(1, 5, ChunkMode::Recursive)
            .split_text("abc")
            .unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.overlap == 0 && c.char_len() == 1));
    }

    #[test]
    fn sections_are_hard_cuts() {
        let doc = Document::from_pages([
            "INTRODUCTION\nShort intro text.",
            "2 Methods\nWe did things carefully.",
            "3 Results\nThey worked.",
        ]);
        assert_eq!(doc.sections.len(), 3);
        let chunks = Chunker::new(1000, 100, ChunkMode::Sections)
            .chunk(&doc)
            .unwrap();
        assert_eq!(chunks.len(), 3);
        let labels: Vec<_> = chunks.iter().map(|c| c.section.as_deref()).collect();
        assert_eq!(
            labels,
            vec![Some("INTRODUCTION"), Some("2 Methods"), Some("3 Results")]
        );
        assert!(chunks.iter().all(|c| c.overlap == 0));
        assert_eq!(chunks[1].first_page, 2);
        assert_eq!(reconstruct(&chunks), doc.text);
    }

    #[test]
    fn recursive_mode_ignores_sections() {
        let doc = Document::from_pages(["INTRODUCTION\nShort.", "2 Methods\nAlso short."]);
        let chunks = Chunker::new(1000, 0, ChunkMode::Recursive)
            .chunk(&doc)
            .unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn page_mode_cuts_at_page_starts() {
        let page = "Sentence one is here. Sentence two is here too.";
        let doc = Document::from_pages([page, page, page, page]);
        // Two pages plus joiner fit in one window, three do not.
        let chunks = Chunker::new(100, 0, ChunkMode::Pages).chunk(&doc).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].start, doc.page_starts[2]);
        assert_eq!((chunks[0].first_page, chunks[0].last_page), (1, 2));
        assert_eq!(chunks[1].first_page, 3);
        assert_eq!(reconstruct(&chunks), doc.text);
    }

    #[test]
    fn estimated_tokens_rounds_up() {
        let chunks = Chunker::new(100, 0, ChunkMode::Recursive)
            .split_text("abcde")
            .unwrap();
        assert_eq!(chunks[0].estimated_tokens(), 2);
    }
}
