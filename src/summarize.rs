//! Summarization entry points and the pipeline orchestrator.
//!
//! Every entry point runs the same six steps:
//!
//! ```text
//! prepare ─▶ extract ─▶ chunk ─▶ summarize ─▶ aggregate ─▶ write
//! (provider)  (pdfium)  (split)  (LLM/chunk)  (join/condense) (atomic)
//! ```
//!
//! The run halts at the first fatal error. A progress event follows every
//! step and every chunk, and the run ends with exactly one terminal event.
//! Cancellation is checked before each step and before each chunk; a call
//! already in flight runs to completion.
//! The destination file is written atomically, so it either holds the
//! complete report or is left untouched.

use crate::config::SummaryConfig;
use crate::document::Document;
use crate::error::SummarizeError;
use crate::output::{Inspection, RunStats, SummaryFragment, SummaryOutput};
use crate::pipeline::aggregate::{format_yaml_front_matter, Aggregator};
use crate::pipeline::chunk::{Chunk, Chunker};
use crate::pipeline::context::RunningContext;
use crate::pipeline::extract;
use crate::pipeline::input::{output_stem, validate_pdf_path};
use crate::pipeline::llm::{GenerationRequest, ProviderGenerator, SummaryClient, TextGenerator};
use crate::progress::{ProgressTracker, RunStatus, Step};
use crate::prompts;
use crate::terms::{self, Term};
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Model used when neither the config nor the environment names one.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Summarize a PDF file and return the report without writing it.
///
/// # Errors
/// Returns `Err(SummarizeError)` for every fatal condition: unreadable or
/// invalid input, no extractable text, a chunk that failed permanently,
/// or cancellation.
pub async fn summarize(
    pdf_path: impl AsRef<Path>,
    config: &SummaryConfig,
) -> Result<SummaryOutput, SummarizeError> {
    run(Source::Path(pdf_path.as_ref()), None, config).await
}

/// Summarize an already extracted [`Document`].
pub async fn summarize_document(
    doc: Document,
    config: &SummaryConfig,
) -> Result<SummaryOutput, SummarizeError> {
    run(Source::Document(doc), None, config).await
}

/// Summarize a PDF file and write the report to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn summarize_to_file(
    pdf_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &SummaryConfig,
) -> Result<SummaryOutput, SummarizeError> {
    run(
        Source::Path(pdf_path.as_ref()),
        Some(output_path.as_ref()),
        config,
    )
    .await
}

/// Summarize a [`Document`] and write the report to `output_path`.
pub async fn summarize_document_to_file(
    doc: Document,
    output_path: impl AsRef<Path>,
    config: &SummaryConfig,
) -> Result<SummaryOutput, SummarizeError> {
    run(Source::Document(doc), Some(output_path.as_ref()), config).await
}

/// Summarize a PDF into `config.output_dir/<stem>_summary.txt`.
pub async fn summarize_into_dir(
    pdf_path: impl AsRef<Path>,
    config: &SummaryConfig,
) -> Result<SummaryOutput, SummarizeError> {
    let pdf_path = pdf_path.as_ref();
    let out = default_output_path(pdf_path, &config.output_dir);
    run(Source::Path(pdf_path), Some(&out), config).await
}

/// `<dir>/<stem>_summary.txt` for a given input path.
pub fn default_output_path(pdf_path: &Path, dir: &Path) -> PathBuf {
    dir.join(format!("{}_summary.txt", output_stem(pdf_path)))
}

/// Summarize PDF bytes held in memory.
///
/// The bytes are written to a managed [`tempfile`] that is removed when the
/// call returns.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdfsum::{summarize_bytes, SummaryConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("document.pdf")?;
/// let output = summarize_bytes(&bytes, &SummaryConfig::default()).await?;
/// println!("{}", output.report);
/// # Ok(())
/// # }
/// ```
pub async fn summarize_bytes(
    bytes: &[u8],
    config: &SummaryConfig,
) -> Result<SummaryOutput, SummarizeError> {
    let mut tmp = tempfile::Builder::new()
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| SummarizeError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| SummarizeError::Internal(format!("tempfile write: {e}")))?;
    // `tmp` is dropped (and the file deleted) when `summarize` returns
    summarize(tmp.path(), config).await
}

/// Synchronous wrapper around [`summarize`].
///
/// Creates a temporary tokio runtime internally.
pub fn summarize_sync(
    pdf_path: impl AsRef<Path>,
    config: &SummaryConfig,
) -> Result<SummaryOutput, SummarizeError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| SummarizeError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(summarize(pdf_path, config))
}

/// Extract a PDF's text and structure without calling any LLM.
///
/// Does not require an LLM provider or API key.
pub async fn inspect(
    pdf_path: impl AsRef<Path>,
    password: Option<&str>,
) -> Result<Inspection, SummarizeError> {
    let path = validate_pdf_path(pdf_path)?;
    let doc = extract::extract_document(&path, password).await?;
    Ok(Inspection::from(&doc))
}

// ── Orchestration ────────────────────────────────────────────────────────

enum Source<'a> {
    Path(&'a Path),
    Document(Document),
}

async fn run(
    source: Source<'_>,
    dest: Option<&Path>,
    config: &SummaryConfig,
) -> Result<SummaryOutput, SummarizeError> {
    let tracker = ProgressTracker::new(config.progress_callback.clone());
    let result = run_steps(source, dest, config, &tracker).await;

    match &result {
        Ok(output) => {
            let step = if dest.is_some() {
                Step::Write
            } else {
                Step::Aggregate
            };
            tracker.finish(
                step,
                None,
                RunStatus::Succeeded {
                    output: output.output_path.clone(),
                },
            );
        }
        Err(SummarizeError::Cancelled { step }) => {
            info!("Run cancelled at step '{}'", step);
            tracker.finish(*step, None, RunStatus::Cancelled { step: *step });
        }
        Err(e) => {
            warn!("Run failed at step '{}': {}", e.step(), e);
            tracker.finish(
                e.step(),
                e.chunk_index(),
                RunStatus::Failed {
                    step: e.step(),
                    chunk: e.chunk_index(),
                    error: e.to_string(),
                },
            );
        }
    }
    result
}

fn checkpoint(config: &SummaryConfig, step: Step) -> Result<(), SummarizeError> {
    if config.is_cancelled() {
        Err(SummarizeError::Cancelled { step })
    } else {
        Ok(())
    }
}

async fn run_steps(
    source: Source<'_>,
    dest: Option<&Path>,
    config: &SummaryConfig,
    tracker: &ProgressTracker,
) -> Result<SummaryOutput, SummarizeError> {
    let total_start = Instant::now();

    // ── Step 1: Prepare ──────────────────────────────────────────────────
    checkpoint(config, Step::Prepare)?;
    let generator = resolve_generator(config)?;
    let client = SummaryClient::new(generator, config.retry.clone(), config.api_timeout())
        .with_call_counter(tracker.api_call_counter());
    tracker.emit(Step::Prepare, None);

    // ── Step 2: Extract ──────────────────────────────────────────────────
    checkpoint(config, Step::Extract)?;
    let extract_start = Instant::now();
    let doc = match source {
        Source::Path(p) => {
            info!("Starting summarization: {}", p.display());
            let path = validate_pdf_path(p)?;
            extract::extract_document(&path, config.password.as_deref()).await?
        }
        Source::Document(doc) => doc,
    };
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    tracker.set_pages(doc.page_count());
    tracker.emit(Step::Extract, None);

    // ── Step 3: Chunk ────────────────────────────────────────────────────
    checkpoint(config, Step::Chunk)?;
    let chunker = Chunker::new(
        config.max_chunk_chars,
        config.chunk_overlap,
        config.strategy.chunk_mode(),
    );
    let chunks = chunker.chunk(&doc)?;
    info!(
        "{} strategy: {} chunks from {} pages",
        config.strategy,
        chunks.len(),
        doc.page_count()
    );
    tracker.set_total_chunks(chunks.len());
    tracker.emit(Step::Chunk, None);

    let chunk_terms: Vec<Vec<Term>> = chunks
        .iter()
        .map(|c| terms::extract_terms(&c.text, c.first_page))
        .collect();
    let all_terms = terms::dedup(chunk_terms.iter().flatten().cloned().collect());
    let hints = if config.term_hints {
        chunk_terms
    } else {
        vec![Vec::new(); chunks.len()]
    };
    debug!("{} key terms extracted", all_terms.len());

    // ── Step 4: Summarize ────────────────────────────────────────────────
    checkpoint(config, Step::Summarize)?;
    let summarize_start = Instant::now();
    let fragments = if config.strategy.is_iterative() || config.concurrency <= 1 {
        process_sequential(&client, &chunks, &hints, config, tracker).await?
    } else {
        process_concurrent(&client, &chunks, &hints, config, tracker).await?
    };

    // ── Step 5: Aggregate ────────────────────────────────────────────────
    checkpoint(config, Step::Aggregate)?;
    let aggregator = Aggregator::new(config.section_headers, config.max_report_chars);
    let aggregated = aggregator.aggregate(&fragments, &client).await?;
    let summarize_duration_ms = summarize_start.elapsed().as_millis() as u64;

    let coverage = terms::coverage(&all_terms, &aggregated.report);
    let title = doc.title();
    let report = if config.include_metadata {
        format!(
            "{}{}",
            format_yaml_front_matter(&title, &doc.metadata, config.model.as_deref()),
            aggregated.report
        )
    } else {
        aggregated.report
    };
    tracker.emit(Step::Aggregate, None);

    let stats = RunStats {
        strategy: config.strategy,
        total_pages: doc.page_count(),
        total_chunks: chunks.len(),
        api_calls: tracker.api_calls(),
        input_chars: doc.char_len(),
        output_chars: report.chars().count(),
        total_input_tokens: fragments.iter().map(|f| f.input_tokens).sum::<u64>()
            + aggregated.input_tokens,
        total_output_tokens: fragments.iter().map(|f| f.output_tokens).sum::<u64>()
            + aggregated.output_tokens,
        condensed: aggregated.condensed,
        coverage,
        extract_duration_ms,
        summarize_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    let mut output = SummaryOutput {
        report,
        title,
        metadata: doc.metadata.clone(),
        fragments,
        stats,
        output_path: None,
    };

    // ── Step 6: Write ────────────────────────────────────────────────────
    if let Some(path) = dest {
        checkpoint(config, Step::Write)?;
        write_outputs(path, &output, doc.source.as_deref(), config.write_stats).await?;
        output.output_path = Some(path.to_path_buf());
        tracker.emit(Step::Write, None);
    }

    info!(
        "Summary complete: {} chunks, {} API calls, {} → {} chars ({:.1}%), {}ms",
        output.stats.total_chunks,
        output.stats.api_calls,
        output.stats.input_chars,
        output.stats.output_chars,
        output.stats.compression_pct(),
        output.stats.total_duration_ms
    );
    Ok(output)
}

/// Process chunks one at a time. Refine carries the running context.
async fn process_sequential(
    client: &SummaryClient,
    chunks: &[Chunk],
    hints: &[Vec<Term>],
    config: &SummaryConfig,
    tracker: &ProgressTracker,
) -> Result<Vec<SummaryFragment>, SummarizeError> {
    let total = chunks.len();
    let mut context = RunningContext::new(config.max_context_chars);
    let mut fragments = Vec::with_capacity(total);

    for (chunk, key_terms) in chunks.iter().zip(hints) {
        if chunk.index > 1 && config.request_interval_ms > 0 {
            tokio::time::sleep(Duration::from_millis(config.request_interval_ms)).await;
        }
        let prior = if config.strategy.is_iterative() {
            context.current()
        } else {
            None
        };
        let fragment =
            summarize_chunk(client, chunk, key_terms, total, prior, config, tracker).await?;
        if config.strategy.is_iterative() {
            context.push(&fragment.text);
        }
        fragments.push(fragment);
    }

    Ok(fragments)
}

/// Process chunks with up to `config.concurrency` calls in flight.
///
/// `buffered` yields results in chunk order. The first error ends the
/// stream; calls still in flight are dropped.
async fn process_concurrent(
    client: &SummaryClient,
    chunks: &[Chunk],
    hints: &[Vec<Term>],
    config: &SummaryConfig,
    tracker: &ProgressTracker,
) -> Result<Vec<SummaryFragment>, SummarizeError> {
    let total = chunks.len();
    let calls: Vec<_> = chunks
        .iter()
        .zip(hints)
        .map(|(chunk, key_terms)| {
            summarize_chunk(client, chunk, key_terms, total, None, config, tracker)
        })
        .collect();
    stream::iter(calls)
        .buffered(config.concurrency)
        .try_collect()
        .await
}

/// Summarize one chunk. Cancellation is checked before the call; a call
/// already in flight runs to completion.
async fn summarize_chunk(
    client: &SummaryClient,
    chunk: &Chunk,
    key_terms: &[Term],
    total: usize,
    context: Option<String>,
    config: &SummaryConfig,
    tracker: &ProgressTracker,
) -> Result<SummaryFragment, SummarizeError> {
    checkpoint(config, Step::Summarize)?;
    tracker.emit(Step::Summarize, Some(chunk.index));
    debug!(
        "Chunk {}/{}: {} chars (~{} tokens), pages {}-{}",
        chunk.index,
        total,
        chunk.char_len(),
        chunk.estimated_tokens(),
        chunk.first_page,
        chunk.last_page
    );

    let request = GenerationRequest {
        instruction: config
            .instruction
            .clone()
            .unwrap_or_else(|| prompts::instruction_for(config.strategy, chunk.index == 1)),
        content: prompts::chunk_content(chunk, total, key_terms),
        context,
    };
    let label = format!("Chunk {}/{}", chunk.index, total);

    let (generation, retries) = client
        .generate(&label, &request)
        .await
        .map_err(|f| SummarizeError::ChunkFailed {
            chunk: chunk.index,
            attempts: f.attempts,
            source: f.failure,
        })?;

    tracker.chunk_done();
    tracker.emit(Step::Summarize, Some(chunk.index));

    Ok(SummaryFragment {
        chunk: chunk.index,
        section: chunk.section.clone(),
        text: generation.text,
        input_tokens: generation.input_tokens,
        output_tokens: generation.output_tokens,
        retries,
    })
}

// ── Output ───────────────────────────────────────────────────────────────

/// Path of the stats sidecar for a report path: `<stem>.stats.json`.
pub fn stats_path(report_path: &Path) -> PathBuf {
    report_path.with_file_name(format!("{}.stats.json", output_stem(report_path)))
}

async fn write_outputs(
    path: &Path,
    output: &SummaryOutput,
    source: Option<&Path>,
    write_stats: bool,
) -> Result<(), SummarizeError> {
    let sidecar = if write_stats {
        let json = serde_json::json!({
            "title": output.title,
            "source": source,
            "output": path,
            "metadata": output.metadata,
            "stats": output.stats,
            "coverage_percentage": output.stats.coverage.percentage(),
        });
        let body = serde_json::to_string_pretty(&json)
            .map_err(|e| SummarizeError::Internal(format!("stats serialization: {e}")))?;
        let sidecar = stats_path(path);
        write_atomic(&sidecar, body).await?;
        Some(sidecar)
    } else {
        None
    };

    if let Err(e) = write_atomic(path, output.report.clone()).await {
        if let Some(ref s) = sidecar {
            let _ = tokio::fs::remove_file(s).await;
        }
        return Err(e);
    }
    info!("Wrote summary to {}", path.display());
    Ok(())
}

/// Write `contents` to `path` through a temp file in the same directory.
///
/// The temp file is removed automatically if anything fails before the
/// final rename.
pub(crate) async fn write_atomic(path: &Path, contents: String) -> Result<(), SummarizeError> {
    let path = path.to_path_buf();
    let target = path.clone();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::Builder::new()
            .prefix(".pdfsum-")
            .suffix(".tmp")
            .tempfile_in(&dir)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| SummarizeError::Internal(format!("Write task panicked: {}", e)))?
    .map_err(|e| SummarizeError::OutputWriteFailed { path, source: e })
}

// ── Provider resolution ──────────────────────────────────────────────────

/// Resolve the text generator, from most-specific to least-specific.
///
/// 1. **Pre-built generator** (`config.generator`), used as-is.
/// 2. **Pre-built provider** (`config.provider`), wrapped in a
///    [`ProviderGenerator`].
/// 3. **Named provider** (`config.provider_name`) with `config.model` or
///    that provider's default model.
/// 4. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 5. **Gemini key** (`GEMINI_API_KEY`) with [`DEFAULT_MODEL`].
/// 6. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_generator(config: &SummaryConfig) -> Result<Arc<dyn TextGenerator>, SummarizeError> {
    if let Some(ref generator) = config.generator {
        return Ok(Arc::clone(generator));
    }
    let provider = resolve_provider(config)?;
    Ok(Arc::new(ProviderGenerator::new(provider, config)))
}

fn resolve_provider(config: &SummaryConfig) -> Result<Arc<dyn LLMProvider>, SummarizeError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| default_model_for(name).to_string());
        return create_provider(name, &model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if std::env::var("GEMINI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider("gemini", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| SummarizeError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY or ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, SummarizeError> {
    debug!("Creating provider '{}' with model '{}'", name, model);
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        SummarizeError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })
}

fn default_model_for(provider: &str) -> &'static str {
    match provider {
        "openai" => "gpt-4.1-mini",
        "anthropic" => "claude-3-5-haiku-latest",
        _ => DEFAULT_MODEL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_path_uses_stem() {
        let p = default_output_path(Path::new("in/Lecture 3.pdf"), Path::new("out"));
        assert_eq!(p, PathBuf::from("out/Lecture 3_summary.txt"));
    }

    #[test]
    fn stats_path_sits_next_to_report() {
        assert_eq!(
            stats_path(Path::new("out/report_summary.txt")),
            PathBuf::from("out/report_summary.stats.json")
        );
    }

    #[tokio::test]
    async fn atomic_write_creates_parent_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/out.txt");
        write_atomic(&target, "hello\n".into()).await.unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hello\n");
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn atomic_write_into_missing_dir_under_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let err = write_atomic(&blocker.join("out.txt"), "x".into())
            .await
            .unwrap_err();
        assert!(matches!(err, SummarizeError::OutputWriteFailed { .. }));
    }

    #[test]
    fn default_model_per_provider() {
        assert_eq!(default_model_for("gemini"), DEFAULT_MODEL);
        assert_eq!(default_model_for("openai"), "gpt-4.1-mini");
    }
}
