//! The extracted document: page texts joined into one string, plus the
//! structure the chunker needs (page starts and detected sections).
//!
//! All offsets are **character** offsets (Unicode scalar values) into
//! [`Document::text`], never byte offsets, so chunk boundaries can't land
//! inside a multi-byte code point.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Separator placed between consecutive non-empty pages.
pub const PAGE_JOINER: &str = "\n\n";

/// Metadata extracted from the PDF document information dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// A detected heading and where it starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    /// Char offset of the heading line in [`Document::text`].
    pub offset: usize,
    /// 1-based page the heading appears on.
    pub page: usize,
}

/// Text of a PDF ready for chunking.
#[derive(Debug, Clone, Default)]
pub struct Document {
    /// Path the document was read from, if any.
    pub source: Option<PathBuf>,
    pub metadata: DocumentMetadata,
    /// Raw per-page text as extracted.
    pub pages: Vec<String>,
    /// Non-empty pages joined with [`PAGE_JOINER`].
    pub text: String,
    /// Char offset where each page's text begins. Blank pages share the
    /// offset of the position they would have occupied.
    pub page_starts: Vec<usize>,
    pub sections: Vec<Section>,
    char_len: usize,
}

impl Document {
    /// Build a document from per-page text, detecting sections.
    pub fn from_pages<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pages: Vec<String> = pages.into_iter().map(Into::into).collect();
        let mut text = String::new();
        let mut char_len = 0usize;
        let mut page_starts = Vec::with_capacity(pages.len());
        let joiner_len = PAGE_JOINER.chars().count();

        for page in &pages {
            let body = page.trim();
            if body.is_empty() {
                page_starts.push(char_len);
                continue;
            }
            if !text.is_empty() {
                text.push_str(PAGE_JOINER);
                char_len += joiner_len;
            }
            page_starts.push(char_len);
            text.push_str(body);
            char_len += body.chars().count();
        }

        let mut doc = Self {
            source: None,
            metadata: DocumentMetadata {
                page_count: pages.len(),
                ..Default::default()
            },
            pages,
            text,
            page_starts,
            sections: Vec::new(),
            char_len,
        };
        doc.sections = doc.detect_sections();
        doc
    }

    /// A single-page document holding `text` verbatim, with no sections.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            char_len: text.chars().count(),
            pages: vec![text.clone()],
            page_starts: vec![0],
            metadata: DocumentMetadata {
                page_count: 1,
                ..Default::default()
            },
            text,
            ..Default::default()
        }
    }

    /// Attach metadata read from the PDF. The page count always reflects the
    /// pages actually extracted.
    pub fn with_metadata(mut self, metadata: DocumentMetadata) -> Self {
        let page_count = self.pages.len();
        self.metadata = DocumentMetadata {
            page_count,
            ..metadata
        };
        self
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    /// Length of [`Self::text`] in characters.
    pub fn char_len(&self) -> usize {
        self.char_len
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// True when no page carries any non-whitespace text.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// 1-based page containing the char at `offset`.
    pub fn page_at(&self, offset: usize) -> usize {
        // Last page whose start is <= offset; blank pages never own text, so
        // prefer the last non-blank page among equal starts.
        let idx = self.page_starts.partition_point(|&s| s <= offset);
        let mut i = idx.saturating_sub(1);
        while i > 0 && self.pages[i].trim().is_empty() {
            i -= 1;
        }
        i + 1
    }

    /// The section containing the char at `offset`.
    pub fn section_at(&self, offset: usize) -> Option<&Section> {
        let idx = self.sections.partition_point(|s| s.offset <= offset);
        idx.checked_sub(1).map(|i| &self.sections[i])
    }

    /// Document title: metadata title, else the first significant line.
    pub fn title(&self) -> String {
        if let Some(t) = self.metadata.title.as_deref().map(str::trim) {
            if !t.is_empty() {
                return t.to_string();
            }
        }
        self.text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .take(10)
            .find(|l| l.chars().count() > 10 && !l.chars().all(|c| c.is_ascii_digit()))
            .map(|l| l.chars().take(100).collect())
            .unwrap_or_else(|| "Untitled document".to_string())
    }

    fn detect_sections(&self) -> Vec<Section> {
        let mut sections = Vec::new();
        let mut offset = 0usize;
        for line in self.text.split('\n') {
            let trimmed = line.trim();
            if is_heading(trimmed) {
                sections.push(Section {
                    title: trimmed.chars().take(100).collect(),
                    offset,
                    page: self.page_at(offset),
                });
            }
            offset += line.chars().count() + 1;
        }
        sections
    }
}

// ── Heading heuristics ───────────────────────────────────────────────────

static RE_KEYWORD_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:CHAPTER|PART|SECTION|ARTICLE|APPENDIX|CAPITOLO|CAPO|TITOLO|PARTE|SEZIONE)\s+[IVXLCDM\d]+\b",
    )
    .unwrap()
});

static RE_ABBREV_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:Chapter|Section|Cap(?:itolo)?\.?|Sez(?:ione)?\.?)\s*\d+\b").unwrap()
});

static RE_NUMBERED_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(?:\.\d+)*\.?\s+\p{Lu}[\p{L}\s,'-]*$").unwrap());

/// Whether a trimmed line looks like a section heading.
///
/// Matches keyword headings ("CHAPTER IV", "Sez. 2"), short numbered
/// headings ("2.1 Scope of Work") and short all-caps lines.
pub fn is_heading(line: &str) -> bool {
    if line.is_empty() {
        return false;
    }
    if RE_KEYWORD_HEADING.is_match(line) {
        return true;
    }
    let len = line.chars().count();
    if len >= 80 {
        return false;
    }
    if RE_ABBREV_HEADING.is_match(line) || RE_NUMBERED_HEADING.is_match(line) {
        return true;
    }
    let letters = line.chars().filter(|c| c.is_alphabetic()).count();
    len > 5 && letters >= 4 && line.chars().filter(|c| c.is_alphabetic()).all(char::is_uppercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_joined_with_blank_line() {
        let doc = Document::from_pages(["alpha", "beta"]);
        assert_eq!(doc.text, "alpha\n\nbeta");
        assert_eq!(doc.page_starts, vec![0, 7]);
        assert_eq!(doc.char_len(), 11);
    }

    #[test]
    fn blank_pages_count_but_add_no_text() {
        let doc = Document::from_pages(["one", "   \n ", "three"]);
        assert_eq!(doc.text, "one\n\nthree");
        assert_eq!(doc.page_count(), 3);
        assert_eq!(doc.metadata.page_count, 3);
        assert_eq!(doc.page_at(0), 1);
        assert_eq!(doc.page_at(5), 3);
    }

    #[test]
    fn all_blank_document_is_blank() {
        let doc = Document::from_pages(["", "  "]);
        assert!(doc.is_blank());
        assert_eq!(doc.char_len(), 0);
    }

    #[test]
    fn from_text_keeps_text_verbatim() {
        let doc = Document::from_text("  INTRODUCTION\nperché sì  ");
        assert_eq!(doc.text, "  INTRODUCTION\nperché sì  ");
        assert_eq!(doc.char_len(), doc.text.chars().count());
        assert_eq!(doc.page_count(), 1);
        assert_eq!(doc.metadata.page_count, 1);
        assert!(doc.sections.is_empty());
        assert_eq!(doc.page_at(doc.char_len() - 1), 1);
    }

    #[test]
    fn char_offsets_with_multibyte_text() {
        let doc = Document::from_pages(["città è", "ok"]);
        assert_eq!(doc.page_starts[1], "città è".chars().count() + 2);
        assert_eq!(doc.page_at(doc.page_starts[1]), 2);
    }

    #[test]
    fn detects_headings() {
        assert!(is_heading("CHAPTER IV"));
        assert!(is_heading("CAPITOLO 3 - Le fonti"));
        assert!(is_heading("Sez. 2"));
        assert!(is_heading("2.1 Scope of Work"));
        assert!(is_heading("INTRODUCTION"));
        assert!(!is_heading("This is an ordinary sentence in a paragraph."));
        assert!(!is_heading("2024"));
        assert!(!is_heading("NASA"));
        assert!(!is_heading(""));
    }

    #[test]
    fn sections_carry_offset_and_page() {
        let doc = Document::from_pages([
            "INTRODUCTION\nSome words here.",
            "2 Methods\nMore words.",
        ]);
        assert_eq!(doc.sections.len(), 2);
        assert_eq!(doc.sections[0].title, "INTRODUCTION");
        assert_eq!(doc.sections[0].offset, 0);
        assert_eq!(doc.sections[0].page, 1);
        assert_eq!(doc.sections[1].title, "2 Methods");
        assert_eq!(doc.sections[1].offset, doc.page_starts[1]);
        assert_eq!(doc.sections[1].page, 2);
        assert_eq!(
            doc.section_at(doc.page_starts[1] + 3).map(|s| s.title.as_str()),
            Some("2 Methods")
        );
    }

    #[test]
    fn title_prefers_metadata() {
        let doc = Document::from_pages(["A long enough first line\nbody"]).with_metadata(
            DocumentMetadata {
                title: Some("Annual Report".into()),
                ..Default::default()
            },
        );
        assert_eq!(doc.title(), "Annual Report");
        assert_eq!(doc.metadata.page_count, 1);
    }

    #[test]
    fn title_falls_back_to_first_significant_line() {
        let doc = Document::from_pages(["12\nshort\nA long enough first line\nbody"]);
        assert_eq!(doc.title(), "A long enough first line");
    }
}
