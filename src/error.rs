//! Error types for the edgequake-pdfsum library.
//!
//! Two distinct error types reflect two distinct layers:
//!
//! * [`SummarizeError`]: **Fatal**: the run cannot produce a report
//!   (bad input file, chunk permanently failed, destination not writable).
//!   Returned as `Err(SummarizeError)` from every `summarize*` entry point,
//!   and reported once through the terminal progress event.
//!
//! * [`ApiFailure`]: **Per-call**: one attempt against the LLM API failed.
//!   Transient failures are absorbed by the retry loop in
//!   [`crate::pipeline::llm::SummaryClient`]; only the last one surfaces,
//!   wrapped in [`SummarizeError::ChunkFailed`] or
//!   [`SummarizeError::CondenseFailed`].

use crate::progress::Step;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdfsum library.
#[derive(Debug, Error)]
pub enum SummarizeError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but contains no bytes at all.
    #[error("File is empty: '{path}'")]
    EmptyFile { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The PDF opened fine but no page carries extractable text
    /// (typically a scanned document without a text layer).
    #[error("No extractable text in '{path}' ({pages} pages)\nScanned PDFs need OCR before summarization.")]
    NoExtractableText { path: PathBuf, pages: usize },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n\
  • Place libpdfium next to the binary or in the current directory.\n\
  • Install pdfium system-wide so the dynamic loader can find it.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Chunking errors ───────────────────────────────────────────────────
    /// The document text is empty or whitespace-only; nothing to chunk.
    #[error("Document has no text to summarize")]
    EmptyDocument,

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// A chunk could not be summarized: non-retryable failure, or retry
    /// budget exhausted. Fatal to the whole run.
    #[error("Chunk {chunk} failed after {attempts} attempt(s): {source}")]
    ChunkFailed {
        chunk: usize,
        attempts: u32,
        #[source]
        source: ApiFailure,
    },

    /// The corrective condensing pass over the joined report failed.
    #[error("Condensing pass failed after {attempts} attempt(s): {source}")]
    CondenseFailed {
        attempts: u32,
        #[source]
        source: ApiFailure,
    },

    // ── Control ───────────────────────────────────────────────────────────
    /// The caller cancelled the run; nothing was written.
    #[error("Run cancelled before step '{step}'")]
    Cancelled { step: Step },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output report file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SummarizeError {
    /// The pipeline step this error belongs to.
    pub fn step(&self) -> Step {
        match self {
            SummarizeError::FileNotFound { .. }
            | SummarizeError::PermissionDenied { .. }
            | SummarizeError::EmptyFile { .. }
            | SummarizeError::NotAPdf { .. }
            | SummarizeError::CorruptPdf { .. }
            | SummarizeError::PasswordRequired { .. }
            | SummarizeError::WrongPassword { .. }
            | SummarizeError::NoExtractableText { .. }
            | SummarizeError::PdfiumBindingFailed(_) => Step::Extract,
            SummarizeError::EmptyDocument => Step::Chunk,
            SummarizeError::ChunkFailed { .. } => Step::Summarize,
            SummarizeError::CondenseFailed { .. } => Step::Aggregate,
            SummarizeError::Cancelled { step } => *step,
            SummarizeError::OutputWriteFailed { .. } => Step::Write,
            SummarizeError::ProviderNotConfigured { .. }
            | SummarizeError::InvalidConfig(_)
            | SummarizeError::Internal(_) => Step::Prepare,
        }
    }

    /// The 1-based chunk index that failed, when the error is chunk-specific.
    pub fn chunk_index(&self) -> Option<usize> {
        match self {
            SummarizeError::ChunkFailed { chunk, .. } => Some(*chunk),
            _ => None,
        }
    }
}

/// A typed failure of one LLM API attempt.
///
/// Transient variants are retried by the summarization client; the rest
/// fail immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ApiFailure {
    /// HTTP 429 / quota exhausted. `retry_after_secs` carries a
    /// server-specified delay when one was given.
    #[error("rate limited: {detail}")]
    RateLimited {
        retry_after_secs: Option<u64>,
        detail: String,
    },

    /// The call did not complete within the configured timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// 4xx other than 429: bad request, auth failure, content filter.
    #[error("invalid request: {detail}")]
    InvalidRequest { detail: String },

    /// 5xx or connection-level failure.
    #[error("server error{}: {detail}", .status.map(|s| format!(" {s}")).unwrap_or_default())]
    ServerError { status: Option<u16>, detail: String },

    /// The API answered but produced no text.
    #[error("empty response")]
    EmptyResponse,
}

impl ApiFailure {
    /// Whether retrying the same request can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, ApiFailure::InvalidRequest { .. })
    }

    /// Classify a provider error from its rendered message.
    ///
    /// Provider crates surface HTTP failures as opaque strings, so the
    /// status code and a few well-known phrases are matched textually.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        let detail = message.to_string();

        if lower.contains("429")
            || lower.contains("rate limit")
            || lower.contains("ratelimit")
            || lower.contains("quota")
            || lower.contains("resource_exhausted")
            || lower.contains("too many requests")
        {
            return ApiFailure::RateLimited {
                retry_after_secs: parse_retry_after(&lower),
                detail,
            };
        }

        if lower.contains("timed out") || lower.contains("timeout") {
            return ApiFailure::Timeout { secs: 0 };
        }

        for status in [500u16, 502, 503, 504, 529] {
            if lower.contains(&status.to_string()) {
                return ApiFailure::ServerError {
                    status: Some(status),
                    detail,
                };
            }
        }

        if ["400", "401", "403", "404", "422"]
            .iter()
            .any(|code| lower.contains(code))
            || lower.contains("invalid")
            || lower.contains("unauthorized")
            || lower.contains("permission")
            || lower.contains("content_filter")
            || lower.contains("api key")
        {
            return ApiFailure::InvalidRequest { detail };
        }

        ApiFailure::ServerError {
            status: None,
            detail,
        }
    }
}

/// Pull a "retry after N" hint out of a lower-cased error message.
fn parse_retry_after(lower: &str) -> Option<u64> {
    let idx = lower.find("retry after").or_else(|| lower.find("retry-after"))?;
    lower[idx + "retry after".len()..]
        .trim_start_matches([':', ' '])
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .and_then(|n| n.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_failed_display_names_chunk() {
        let e = SummarizeError::ChunkFailed {
            chunk: 3,
            attempts: 4,
            source: ApiFailure::Timeout { secs: 60 },
        };
        let msg = e.to_string();
        assert!(msg.contains("Chunk 3"), "got: {msg}");
        assert!(msg.contains("4 attempt"), "got: {msg}");
        assert_eq!(e.step(), Step::Summarize);
        assert_eq!(e.chunk_index(), Some(3));
    }

    #[test]
    fn extraction_errors_map_to_extract_step() {
        let e = SummarizeError::NotAPdf {
            path: "x.txt".into(),
            magic: *b"hell",
        };
        assert_eq!(e.step(), Step::Extract);
        assert_eq!(e.chunk_index(), None);
    }

    #[test]
    fn write_failure_maps_to_write_step() {
        let e = SummarizeError::OutputWriteFailed {
            path: "/nope/out.txt".into(),
            source: std::io::Error::other("read-only"),
        };
        assert_eq!(e.step(), Step::Write);
    }

    #[test]
    fn classify_rate_limit_with_retry_after() {
        let f = ApiFailure::classify("HTTP 429 Too Many Requests, retry after 12 seconds");
        assert_eq!(
            f,
            ApiFailure::RateLimited {
                retry_after_secs: Some(12),
                detail: "HTTP 429 Too Many Requests, retry after 12 seconds".into(),
            }
        );
        assert!(f.is_transient());
    }

    #[test]
    fn classify_quota_is_rate_limit() {
        assert!(matches!(
            ApiFailure::classify("RESOURCE_EXHAUSTED: quota exceeded"),
            ApiFailure::RateLimited {
                retry_after_secs: None,
                ..
            }
        ));
    }

    #[test]
    fn classify_server_error() {
        assert!(matches!(
            ApiFailure::classify("upstream returned 503 Service Unavailable"),
            ApiFailure::ServerError {
                status: Some(503),
                ..
            }
        ));
    }

    #[test]
    fn classify_bad_request_is_permanent() {
        let f = ApiFailure::classify("400 Bad Request: unknown field");
        assert!(matches!(f, ApiFailure::InvalidRequest { .. }));
        assert!(!f.is_transient());
    }

    #[test]
    fn classify_unknown_is_transient_server_error() {
        let f = ApiFailure::classify("connection reset by peer");
        assert!(matches!(f, ApiFailure::ServerError { status: None, .. }));
        assert!(f.is_transient());
    }

    #[test]
    fn server_error_display_includes_status() {
        let f = ApiFailure::ServerError {
            status: Some(502),
            detail: "bad gateway".into(),
        };
        assert_eq!(f.to_string(), "server error 502: bad gateway");
    }
}
