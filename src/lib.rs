//! # edgequake-pdfsum
//!
//! Summarize PDF documents with Large Language Models.
//!
//! Page text is pulled out of the PDF with pdfium, split into chunks that fit
//! comfortably in a model's context window, summarized chunk by chunk, and
//! joined into one plain-text report.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Prepare    resolve the LLM provider
//!  ├─ 2. Extract    page text + metadata via pdfium (spawn_blocking)
//!  ├─ 3. Chunk      bounded chunks on natural breaks
//!  ├─ 4. Summarize  one LLM call per chunk, with timeout + retry
//!  ├─ 5. Aggregate  ordered join, section headers, optional condensing pass
//!  └─ 6. Write      atomic write of the report (+ optional stats JSON)
//! ```
//!
//! ## Strategies
//!
//! | Strategy | Chunks | Requests |
//! |----------|--------|----------|
//! | [`Strategy::Smart`] (default) | one per detected section | independent |
//! | [`Strategy::Refine`] | natural breaks, with overlap | sequential, each sees the notes so far |
//! | [`Strategy::Advanced`] | page windows | independent |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfsum::{summarize_to_file, Strategy, SummaryConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let config = SummaryConfig::builder()
//!         .strategy(Strategy::Refine)
//!         .build()?;
//!     let output = summarize_to_file("lecture.pdf", "lecture_summary.txt", &config).await?;
//!     eprintln!(
//!         "{} chunks, {} API calls, {:.1}% of the original length",
//!         output.stats.total_chunks,
//!         output.stats.api_calls,
//!         output.stats.compression_pct()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfsum` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdfsum = { version = "0.1", default-features = false }
//! ```
//!
//! ## pdfium
//!
//! Text extraction needs the pdfium shared library at runtime. It is looked
//! up via `PDFIUM_LIB_PATH`, then the current directory, then the system
//! library path.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod stream;
pub mod summarize;
pub mod terms;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{RetryPolicy, Strategy, SummaryConfig, SummaryConfigBuilder};
pub use document::{Document, DocumentMetadata, Section};
pub use error::{ApiFailure, SummarizeError};
pub use output::{Inspection, RunStats, SummaryFragment, SummaryOutput};
pub use pipeline::chunk::{Chunk, ChunkMode, Chunker};
pub use pipeline::llm::{Generation, GenerationRequest, TextGenerator};
pub use progress::{
    NoopProgressCallback, ProgressCallback, ProgressEvent, RunStatus, Step,
    SummaryProgressCallback,
};
pub use stream::summarize_with_events;
pub use summarize::{
    inspect, summarize, summarize_bytes, summarize_document, summarize_document_to_file,
    summarize_into_dir, summarize_sync, summarize_to_file,
};
pub use terms::{Coverage, Term, TermKind};
pub use tokio_util::sync::CancellationToken;
