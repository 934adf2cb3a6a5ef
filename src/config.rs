//! Configuration types for PDF summarization.
//!
//! All run behaviour is controlled through [`SummaryConfig`], built via its
//! [`SummaryConfigBuilder`]. The config is an immutable value handed to the
//! orchestrator's entry points; nothing is read from ambient global state
//! during a run, so several pipelines with different configs can run side by
//! side in one process.

use crate::error::SummarizeError;
use crate::pipeline::chunk::ChunkMode;
use crate::pipeline::llm::TextGenerator;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Configuration for a PDF summarization run.
///
/// Built via [`SummaryConfig::builder()`] or using
/// [`SummaryConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdfsum::{Strategy, SummaryConfig};
///
/// let config = SummaryConfig::builder()
///     .strategy(Strategy::Refine)
///     .max_chunk_chars(6_000)
///     .chunk_overlap(300)
///     .model("gemini-2.5-flash")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct SummaryConfig {
    /// Pipeline variant. Default: [`Strategy::Smart`].
    pub strategy: Strategy,

    /// LLM model identifier, e.g. "gemini-2.5-flash", "gpt-4.1-mini".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed text generator. Takes precedence over everything else;
    /// mostly useful for tests and custom middleware.
    pub generator: Option<Arc<dyn TextGenerator>>,

    /// Directory for [`crate::summarize_into_dir`]. Default: `output`.
    pub output_dir: PathBuf,

    /// Maximum chunk size in characters, overlap included. Default: 8000.
    ///
    /// Around 2 000 tokens per chunk keeps every request far below any
    /// current model's input limit while leaving the model enough material
    /// to write a meaningful section summary.
    pub max_chunk_chars: usize,

    /// Characters repeated from the end of one chunk at the start of the
    /// next after a soft cut. Must be smaller than `max_chunk_chars`.
    /// Default: 500.
    pub chunk_overlap: usize,

    /// Upper bound for the running context carried between chunks in the
    /// Refine strategy. Default: 12000.
    pub max_context_chars: usize,

    /// When set and the joined report is longer, one extra condensing call
    /// is made. Default: None (never condense).
    pub max_report_chars: Option<usize>,

    /// Concurrent LLM calls for Smart and Advanced. Refine is always
    /// sequential. Default: 1 (one call at a time, kinder to rate limits).
    pub concurrency: usize,

    /// Retry behaviour for transient API failures.
    pub retry: RetryPolicy,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens generated per call. Default: 8192.
    pub max_tokens: usize,

    /// Per-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Pause between consecutive sequential calls in milliseconds. Default: 0.
    pub request_interval_ms: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Custom per-chunk instruction. If None, the strategy's built-in prompt
    /// is used.
    pub instruction: Option<String>,

    /// Insert `## <section>` headers when consecutive fragments change
    /// section. Default: true.
    pub section_headers: bool,

    /// Prepend YAML front matter with document metadata. Default: false.
    pub include_metadata: bool,

    /// List the legal references, definitions and key concepts found in a
    /// chunk in its request. Coverage is reported either way. Default: true.
    pub term_hints: bool,

    /// Write a `<stem>.stats.json` file next to the report. Default: false.
    pub write_stats: bool,

    /// Receives progress events. Default: None.
    pub progress_callback: Option<ProgressCallback>,

    /// Cancels the run at the next checkpoint. Default: None.
    pub cancellation: Option<CancellationToken>,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            model: None,
            provider_name: None,
            provider: None,
            generator: None,
            output_dir: PathBuf::from("output"),
            max_chunk_chars: 8000,
            chunk_overlap: 500,
            max_context_chars: 12_000,
            max_report_chars: None,
            concurrency: 1,
            retry: RetryPolicy::default(),
            temperature: 0.1,
            max_tokens: 8192,
            api_timeout_secs: 120,
            request_interval_ms: 0,
            password: None,
            instruction: None,
            section_headers: true,
            include_metadata: false,
            term_hints: true,
            write_stats: false,
            progress_callback: None,
            cancellation: None,
        }
    }
}

impl fmt::Debug for SummaryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SummaryConfig")
            .field("strategy", &self.strategy)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("generator", &self.generator.as_ref().map(|_| "<dyn TextGenerator>"))
            .field("output_dir", &self.output_dir)
            .field("max_chunk_chars", &self.max_chunk_chars)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("max_context_chars", &self.max_context_chars)
            .field("max_report_chars", &self.max_report_chars)
            .field("concurrency", &self.concurrency)
            .field("retry", &self.retry)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl SummaryConfig {
    /// Create a new builder for `SummaryConfig`.
    pub fn builder() -> SummaryConfigBuilder {
        SummaryConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|t| t.is_cancelled())
    }
}

/// Builder for [`SummaryConfig`].
#[derive(Debug)]
pub struct SummaryConfigBuilder {
    config: SummaryConfig,
}

impl SummaryConfigBuilder {
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.config.generator = Some(generator);
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn max_chunk_chars(mut self, n: usize) -> Self {
        self.config.max_chunk_chars = n;
        self
    }

    pub fn chunk_overlap(mut self, n: usize) -> Self {
        self.config.chunk_overlap = n;
        self
    }

    pub fn max_context_chars(mut self, n: usize) -> Self {
        self.config.max_context_chars = n;
        self
    }

    pub fn max_report_chars(mut self, n: usize) -> Self {
        self.config.max_report_chars = Some(n);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.retry.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry.base_delay = Duration::from_millis(ms);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn request_interval_ms(mut self, ms: u64) -> Self {
        self.config.request_interval_ms = ms;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn instruction(mut self, prompt: impl Into<String>) -> Self {
        self.config.instruction = Some(prompt.into());
        self
    }

    pub fn section_headers(mut self, v: bool) -> Self {
        self.config.section_headers = v;
        self
    }

    pub fn include_metadata(mut self, v: bool) -> Self {
        self.config.include_metadata = v;
        self
    }

    pub fn term_hints(mut self, v: bool) -> Self {
        self.config.term_hints = v;
        self
    }

    pub fn write_stats(mut self, v: bool) -> Self {
        self.config.write_stats = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.config.cancellation = Some(token);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SummaryConfig, SummarizeError> {
        let c = &self.config;
        if c.max_chunk_chars == 0 {
            return Err(SummarizeError::InvalidConfig(
                "max_chunk_chars must be ≥ 1".into(),
            ));
        }
        if c.chunk_overlap >= c.max_chunk_chars {
            return Err(SummarizeError::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than max_chunk_chars ({})",
                c.chunk_overlap, c.max_chunk_chars
            )));
        }
        if c.concurrency == 0 {
            return Err(SummarizeError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(SummarizeError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.max_report_chars == Some(0) {
            return Err(SummarizeError::InvalidConfig(
                "max_report_chars must be ≥ 1".into(),
            ));
        }
        if c.retry.multiplier < 1.0 {
            return Err(SummarizeError::InvalidConfig(format!(
                "Retry multiplier must be ≥ 1.0, got {}",
                c.retry.multiplier
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Summarization strategy.
///
/// All three run the same extract → chunk → summarize → aggregate pipeline;
/// they differ in how text is chunked and how each request is phrased.
///
/// | Strategy | Chunks aligned to | Calls |
/// |----------|-------------------|-------|
/// | Smart    | detected sections | independent, concurrent |
/// | Refine   | paragraphs/sentences, with overlap | sequential, each sees the running summary |
/// | Advanced | page windows | independent, concurrent |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// One call per section-aligned chunk. (default)
    #[default]
    Smart,
    /// Iterative refinement carrying the running summary forward.
    Refine,
    /// Map over page windows.
    Advanced,
}

impl Strategy {
    /// Which chunking mode feeds this strategy.
    pub fn chunk_mode(&self) -> ChunkMode {
        match self {
            Strategy::Smart => ChunkMode::Sections,
            Strategy::Refine => ChunkMode::Recursive,
            Strategy::Advanced => ChunkMode::Pages,
        }
    }

    /// Whether each request depends on the previous chunk's summary.
    pub fn is_iterative(&self) -> bool {
        matches!(self, Strategy::Refine)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Smart => "smart",
            Strategy::Refine => "refine",
            Strategy::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exponential backoff for transient LLM failures.
///
/// A request is attempted at most `1 + max_retries` times. The wait before
/// retry *n* (1-based) is `base_delay * multiplier^(n-1)`, capped at
/// `max_delay`. A server-supplied retry-after hint replaces the computed
/// delay when it is longer, still subject to the cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Default: 3.
    pub max_retries: u32,
    /// Delay before the first retry. Default: 500 ms.
    pub base_delay: Duration,
    /// Growth factor between retries. Default: 2.0.
    pub multiplier: f64,
    /// Upper bound for any single delay. Default: 60 s.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Total attempts allowed for one request.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32, retry_after_secs: Option<u64>) -> Duration {
        let exp = retry.saturating_sub(1).min(32) as i32;
        let computed = self.base_delay.as_secs_f64() * self.multiplier.powi(exp);
        let computed = Duration::from_secs_f64(computed.min(self.max_delay.as_secs_f64()));
        let hinted = retry_after_secs.map(Duration::from_secs).unwrap_or_default();
        computed.max(hinted).min(self.max_delay)
    }
}
