//! LLM interaction: the text-generation seam and the retrying client.
//!
//! [`TextGenerator`] is the one operation the pipeline needs from an LLM:
//! instruction + content (+ optional prior context) in, text out, or a typed
//! [`ApiFailure`]. [`ProviderGenerator`] implements it on top of any
//! `edgequake_llm` provider; tests plug in scripted generators instead.
//!
//! [`SummaryClient`] wraps a generator with a per-attempt timeout and the
//! configured [`RetryPolicy`], and post-processes every answer.
//!
//! ## Retry Strategy
//!
//! Transient failures (rate limits, timeouts, 5xx, empty answers) are
//! retried with exponential backoff; with a 500 ms base, factor 2 and three
//! retries the waits are 500 ms → 1 s → 2 s. A rate-limit response carrying
//! a retry-after hint waits at least that long. Invalid requests fail on the
//! first attempt.

use crate::config::{RetryPolicy, SummaryConfig};
use crate::error::ApiFailure;
use crate::pipeline::postprocess::clean_summary;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// One generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Task description, sent as the system message.
    pub instruction: String,
    /// The text to work on.
    pub content: String,
    /// Summary of earlier material, when the strategy carries one.
    pub context: Option<String>,
}

/// Text returned by a generator, with token usage when the API reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Generation {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Generates text for a request. One call is one API attempt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, ApiFailure>;
}

/// [`TextGenerator`] backed by an `edgequake_llm` chat provider.
///
/// ## Message Layout
///
/// 1. **System message**: the instruction
/// 2. **Context message** *(when present)*: prior summary, as a second
///    system message
/// 3. **User message**: the chunk text
pub struct ProviderGenerator {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl ProviderGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &SummaryConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
        }
    }
}

#[async_trait]
impl TextGenerator for ProviderGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, ApiFailure> {
        let mut messages = vec![ChatMessage::system(request.instruction.as_str())];
        if let Some(ref ctx) = request.context {
            messages.push(ChatMessage::system(crate::prompts::context_message(ctx)));
        }
        messages.push(ChatMessage::user(request.content.as_str()));

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| ApiFailure::classify(&e.to_string()))?;

        Ok(Generation {
            text: response.content,
            input_tokens: response.prompt_tokens as u64,
            output_tokens: response.completion_tokens as u64,
        })
    }
}

/// Build `CompletionOptions` from the summary config.
fn build_options(config: &SummaryConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// A request that failed for good.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFailure {
    /// Attempts made, the failing one included.
    pub attempts: u32,
    /// The last failure seen.
    pub failure: ApiFailure,
}

/// Drives a [`TextGenerator`] with timeout, retry and output cleanup.
#[derive(Clone)]
pub struct SummaryClient {
    generator: Arc<dyn TextGenerator>,
    retry: RetryPolicy,
    timeout: Duration,
    calls: Arc<AtomicUsize>,
}

impl SummaryClient {
    pub fn new(generator: Arc<dyn TextGenerator>, retry: RetryPolicy, timeout: Duration) -> Self {
        Self {
            generator,
            retry,
            timeout,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Count attempts into a shared counter instead of a private one.
    pub fn with_call_counter(mut self, calls: Arc<AtomicUsize>) -> Self {
        self.calls = calls;
        self
    }

    /// Attempts issued so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Run `request` until it succeeds or the retry budget is spent.
    ///
    /// On success returns the cleaned generation and the retries it took.
    pub async fn generate(
        &self,
        label: &str,
        request: &GenerationRequest,
    ) -> Result<(Generation, u32), CallFailure> {
        let max_attempts = self.retry.max_attempts();
        let mut last: Option<ApiFailure> = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let hint = match &last {
                    Some(ApiFailure::RateLimited {
                        retry_after_secs, ..
                    }) => *retry_after_secs,
                    _ => None,
                };
                let delay = self.retry.delay_for(attempt - 1, hint);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    label,
                    attempt - 1,
                    self.retry.max_retries,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            self.calls.fetch_add(1, Ordering::SeqCst);
            let failure = match tokio::time::timeout(self.timeout, self.generator.generate(request))
                .await
            {
                Ok(Ok(mut generation)) => {
                    generation.text = clean_summary(&generation.text);
                    if generation.text.is_empty() {
                        ApiFailure::EmptyResponse
                    } else {
                        debug!(
                            "{}: {} input tokens, {} output tokens, attempt {}",
                            label, generation.input_tokens, generation.output_tokens, attempt
                        );
                        return Ok((generation, attempt - 1));
                    }
                }
                Ok(Err(failure)) => failure,
                Err(_) => ApiFailure::Timeout {
                    secs: self.timeout.as_secs(),
                },
            };

            warn!("{}: attempt {} failed: {}", label, attempt, failure);
            if !failure.is_transient() {
                return Err(CallFailure {
                    attempts: attempt,
                    failure,
                });
            }
            last = Some(failure);
        }

        Err(CallFailure {
            attempts: max_attempts,
            failure: last.unwrap_or(ApiFailure::EmptyResponse),
        })
    }
}
