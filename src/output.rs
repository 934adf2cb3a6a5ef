//! Result types returned by the summarization entry points.

use crate::config::Strategy;
use crate::document::{Document, DocumentMetadata, Section};
use crate::terms::Coverage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Summary text produced for one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryFragment {
    /// 1-based index of the source chunk.
    pub chunk: usize,
    /// Section label of the source chunk, if any.
    pub section: Option<String>,
    /// Post-processed model output.
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Retries spent before the successful attempt.
    pub retries: u32,
}

impl SummaryFragment {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Aggregate statistics for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub strategy: Strategy,
    pub total_pages: usize,
    pub total_chunks: usize,
    /// Every API call issued, retries and the condensing pass included.
    pub api_calls: usize,
    pub input_chars: usize,
    pub output_chars: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    /// Whether the joined report was condensed by an extra call.
    pub condensed: bool,
    /// Extracted key terms found in the final report.
    pub coverage: Coverage,
    pub extract_duration_ms: u64,
    pub summarize_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl RunStats {
    /// Output size as a share of input size, in percent.
    pub fn compression_pct(&self) -> f64 {
        if self.input_chars == 0 {
            0.0
        } else {
            self.output_chars as f64 * 100.0 / self.input_chars as f64
        }
    }
}

/// Everything a completed run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryOutput {
    /// The final report text.
    pub report: String,
    pub title: String,
    pub metadata: DocumentMetadata,
    pub fragments: Vec<SummaryFragment>,
    pub stats: RunStats,
    /// Where the report was written, for the `*_to_file` entry points.
    pub output_path: Option<PathBuf>,
}

/// What [`crate::inspect`] reports about a PDF without calling any LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inspection {
    pub title: String,
    pub metadata: DocumentMetadata,
    /// Pages carrying any text.
    pub pages_with_text: usize,
    pub total_chars: usize,
    pub sections: Vec<Section>,
}

impl From<&Document> for Inspection {
    fn from(doc: &Document) -> Self {
        Self {
            title: doc.title(),
            metadata: doc.metadata.clone(),
            pages_with_text: doc.pages.iter().filter(|p| !p.trim().is_empty()).count(),
            total_chars: doc.char_len(),
            sections: doc.sections.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_handles_empty_input() {
        assert_eq!(RunStats::default().compression_pct(), 0.0);
        let s = RunStats {
            input_chars: 1000,
            output_chars: 250,
            ..Default::default()
        };
        assert!((s.compression_pct() - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stats_serialize_strategy_lowercase() {
        let s = RunStats {
            strategy: Strategy::Refine,
            ..Default::default()
        };
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"strategy\":\"refine\""), "got: {json}");
    }

    #[test]
    fn stats_serialize_term_coverage() {
        let s = RunStats {
            coverage: Coverage {
                total_terms: 4,
                terms_in_output: 3,
                missing_terms: vec!["GDPR".into()],
            },
            ..Default::default()
        };
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["coverage"]["total_terms"], 4);
        assert_eq!(json["coverage"]["terms_in_output"], 3);
        assert_eq!(json["coverage"]["missing_terms"][0], "GDPR");
        assert!((s.coverage.percentage() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn inspection_counts_text_pages() {
        let doc = Document::from_pages(["INTRODUCTION\nText.", "", "More text."]);
        let info = Inspection::from(&doc);
        assert_eq!(info.pages_with_text, 2);
        assert_eq!(info.metadata.page_count, 3);
        assert_eq!(info.sections.len(), 1);
        assert_eq!(info.total_chars, doc.text.chars().count());
    }
}
