//! Event-stream API: watch a run's progress as a `Stream`.
//!
//! Long documents take minutes. [`summarize_with_events`] spawns the run on
//! the Tokio runtime and hands back a stream of [`ProgressEvent`]s plus the
//! task's `JoinHandle`. The stream ends after the terminal event, once the
//! run has finished and dropped its sender.

use crate::config::SummaryConfig;
use crate::error::SummarizeError;
use crate::output::SummaryOutput;
use crate::progress::{ProgressCallback, ProgressEvent, SummaryProgressCallback};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;

/// A boxed stream of progress events.
pub type EventStream = Pin<Box<dyn Stream<Item = ProgressEvent> + Send>>;

/// Forwards every event to the channel and to the caller's own callback.
struct Tee {
    tx: UnboundedSender<ProgressEvent>,
    inner: Option<ProgressCallback>,
}

impl SummaryProgressCallback for Tee {
    fn on_event(&self, event: &ProgressEvent) {
        self.tx.on_event(event);
        if let Some(ref cb) = self.inner {
            cb.on_event(event);
        }
    }
}

/// Summarize a PDF in a background task, streaming progress events.
///
/// When `output_path` is given the report is written there, as with
/// [`crate::summarize_to_file`]. A callback already set on `config` keeps
/// receiving events too.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdfsum::{summarize_with_events, SummaryConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let (mut events, handle) =
///     summarize_with_events("document.pdf", None, &SummaryConfig::default());
/// while let Some(e) = events.next().await {
///     eprintln!("{}: {}/{} chunks", e.step, e.chunks_processed, e.total_chunks);
/// }
/// let output = handle.await??;
/// println!("{}", output.report);
/// # Ok(())
/// # }
/// ```
pub fn summarize_with_events(
    pdf_path: impl Into<PathBuf>,
    output_path: Option<PathBuf>,
    config: &SummaryConfig,
) -> (
    EventStream,
    JoinHandle<Result<SummaryOutput, SummarizeError>>,
) {
    let (tx, rx) = unbounded_channel();
    let mut config = config.clone();
    config.progress_callback = Some(Arc::new(Tee {
        tx,
        inner: config.progress_callback.take(),
    }));

    let pdf_path = pdf_path.into();
    let handle = tokio::spawn(async move {
        match output_path {
            Some(out) => crate::summarize::summarize_to_file(&pdf_path, &out, &config).await,
            None => crate::summarize::summarize(&pdf_path, &config).await,
        }
        // `config` (and with it the sender) is dropped here, closing the stream.
    });

    (Box::pin(UnboundedReceiverStream::new(rx)), handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{RunStatus, Step};
    use futures::StreamExt;

    #[tokio::test]
    async fn missing_file_streams_single_failure_event() {
        struct Never;
        #[async_trait::async_trait]
        impl crate::pipeline::llm::TextGenerator for Never {
            async fn generate(
                &self,
                _r: &crate::pipeline::llm::GenerationRequest,
            ) -> Result<crate::pipeline::llm::Generation, crate::error::ApiFailure> {
                Err(crate::error::ApiFailure::EmptyResponse)
            }
        }

        let config = SummaryConfig::builder()
            .generator(Arc::new(Never))
            .build()
            .unwrap();
        let (events, handle) = summarize_with_events("/no/such/file.pdf", None, &config);
        let events: Vec<ProgressEvent> = events.collect().await;

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, SummarizeError::FileNotFound { .. }));

        let terminal: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
        assert_eq!(terminal.len(), 1);
        assert!(matches!(
            terminal[0].status,
            Some(RunStatus::Failed {
                step: Step::Extract,
                ..
            })
        ));
        assert!(events.last().is_some_and(|e| e.is_terminal()));
    }
}
