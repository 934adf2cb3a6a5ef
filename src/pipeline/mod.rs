//! Pipeline stages for PDF summarization.
//!
//! Each submodule implements one transformation step and is testable on
//! its own; [`crate::summarize`] sequences them.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ chunk ──▶ llm ──▶ aggregate
//! (path)    (pdfium)    (split)   (API)   (join/condense)
//! ```
//!
//! 1. [`input`]     validate the path: exists, readable, non-empty, `%PDF`
//! 2. [`extract`]   page text + metadata; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 3. [`chunk`]     bounded chunks preferring section, page and paragraph
//!    boundaries
//! 4. [`llm`]       the generator seam plus the retrying client; the only
//!    stage with network I/O. [`context`] carries notes between Refine calls
//!    and [`postprocess`] cleans every answer
//! 5. [`aggregate`] ordered join with optional condensing pass

pub mod aggregate;
pub mod chunk;
pub mod context;
pub mod extract;
pub mod input;
pub mod llm;
pub mod postprocess;
