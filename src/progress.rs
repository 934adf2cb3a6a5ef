//! Progress events for a summarization run.
//!
//! Inject an [`Arc<dyn SummaryProgressCallback>`] via
//! [`crate::config::SummaryConfigBuilder::progress_callback`] to receive a
//! [`ProgressEvent`] after every pipeline step and every chunk.
//!
//! # Event contract
//!
//! Every run delivers an ordered sequence of events that ends with exactly
//! one *terminal* event (`event.status.is_some()`): success, failure or
//! cancellation. Counters in each event are cumulative snapshots, so a
//! consumer that only renders the latest event never needs its own state.
//!
//! The callback is the delivery mechanism; [`crate::stream`] wraps it into
//! a channel-backed `Stream` for consumers that prefer polling.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdfsum::{ProgressEvent, SummaryConfig, SummaryProgressCallback};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl SummaryProgressCallback for Printer {
//!     fn on_event(&self, event: &ProgressEvent) {
//!         eprintln!("[{}] {}/{} chunks", event.step, event.chunks_processed, event.total_chunks);
//!     }
//! }
//!
//! let config = SummaryConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// A named step of the summarization pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    /// Resolve the LLM provider and validate configuration.
    Prepare,
    /// Validate the input file and pull text out of the PDF.
    Extract,
    /// Split the document text into chunks.
    Chunk,
    /// Send chunks to the LLM.
    Summarize,
    /// Join fragments, optionally condense.
    Aggregate,
    /// Persist the report.
    Write,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Prepare => "prepare",
            Step::Extract => "extract",
            Step::Chunk => "chunk",
            Step::Summarize => "summarize",
            Step::Aggregate => "aggregate",
            Step::Write => "write",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal status of a run. Carried only by the last event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RunStatus {
    /// The report was produced (and written, when a destination was given).
    Succeeded { output: Option<PathBuf> },
    /// A fatal error halted the run; nothing was written.
    Failed {
        step: Step,
        chunk: Option<usize>,
        error: String,
    },
    /// The caller cancelled the run at a checkpoint; nothing was written.
    Cancelled { step: Step },
}

/// One progress snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Step that emitted this event.
    pub step: Step,
    /// Pages extracted so far.
    pub pages_processed: usize,
    /// Chunks whose summary fragment is complete.
    pub chunks_processed: usize,
    /// Total chunks planned (0 until chunking finished).
    pub total_chunks: usize,
    /// LLM API calls issued so far, retries and the condensing pass included.
    pub api_calls: usize,
    /// 1-based chunk the event refers to, when chunk-specific.
    pub current_chunk: Option<usize>,
    /// `Some` only on the terminal event.
    pub status: Option<RunStatus>,
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        self.status.is_some()
    }
}

/// Receives progress events from the pipeline.
///
/// Implementations must be `Send + Sync`: in Smart and Advanced strategies
/// chunk events can arrive from concurrently running calls.
pub trait SummaryProgressCallback: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl SummaryProgressCallback for NoopProgressCallback {
    fn on_event(&self, _event: &ProgressEvent) {}
}

/// Forward events into a Tokio channel. A closed receiver is ignored.
impl SummaryProgressCallback for UnboundedSender<ProgressEvent> {
    fn on_event(&self, event: &ProgressEvent) {
        let _ = self.send(event.clone());
    }
}

/// Convenience alias matching the type stored in [`crate::config::SummaryConfig`].
pub type ProgressCallback = Arc<dyn SummaryProgressCallback>;

/// Run-scoped counters plus the callback they are reported to.
///
/// The API-call counter is shared with the summarization client so retries
/// show up in the very next event.
pub(crate) struct ProgressTracker {
    callback: Option<ProgressCallback>,
    pages: AtomicUsize,
    chunks_done: AtomicUsize,
    chunks_total: AtomicUsize,
    api_calls: Arc<AtomicUsize>,
    finished: AtomicBool,
}

impl ProgressTracker {
    pub(crate) fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            pages: AtomicUsize::new(0),
            chunks_done: AtomicUsize::new(0),
            chunks_total: AtomicUsize::new(0),
            api_calls: Arc::new(AtomicUsize::new(0)),
            finished: AtomicBool::new(false),
        }
    }

    pub(crate) fn api_call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.api_calls)
    }

    pub(crate) fn api_calls(&self) -> usize {
        self.api_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn set_pages(&self, pages: usize) {
        self.pages.store(pages, Ordering::SeqCst);
    }

    pub(crate) fn set_total_chunks(&self, total: usize) {
        self.chunks_total.store(total, Ordering::SeqCst);
    }

    pub(crate) fn chunk_done(&self) {
        self.chunks_done.fetch_add(1, Ordering::SeqCst);
    }

    /// Emit a non-terminal snapshot. Ignored once the run has finished.
    pub(crate) fn emit(&self, step: Step, current_chunk: Option<usize>) {
        if self.finished.load(Ordering::SeqCst) {
            return;
        }
        self.send(step, current_chunk, None);
    }

    /// Emit the terminal event. Only the first call has any effect.
    pub(crate) fn finish(&self, step: Step, current_chunk: Option<usize>, status: RunStatus) {
        if self.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        self.send(step, current_chunk, Some(status));
    }

    fn send(&self, step: Step, current_chunk: Option<usize>, status: Option<RunStatus>) {
        if let Some(ref cb) = self.callback {
            cb.on_event(&ProgressEvent {
                step,
                pages_processed: self.pages.load(Ordering::SeqCst),
                chunks_processed: self.chunks_done.load(Ordering::SeqCst),
                total_chunks: self.chunks_total.load(Ordering::SeqCst),
                api_calls: self.api_calls.load(Ordering::SeqCst),
                current_chunk,
                status,
            });
        }
    }
}
