//! CLI binary for edgequake-pdfsum.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `SummaryConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdfsum::{
    inspect, summarize, summarize_into_dir, summarize_to_file, CancellationToken,
    ProgressCallback, ProgressEvent, RunStatus, Step, Strategy, SummaryConfig, SummaryOutput,
    SummaryProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner while the PDF is read, then a bar
/// over the planned chunks with one log line per finished chunk.
///
/// Chunk events come in pairs (started, finished), possibly interleaved when
/// several calls run at once, so start times are keyed by chunk index.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    bar_active: Mutex<bool>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Resolving provider…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            bar_active: Mutex::new(false),
        })
    }

    /// Switch to the full progress-bar style once we know `total`.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} chunks  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Summarizing");
        self.bar.reset_eta();
    }

    fn on_chunk(&self, chunk: usize, event: &ProgressEvent) {
        let mut starts = self
            .start_times
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        match starts.remove(&chunk) {
            None => {
                starts.insert(chunk, Instant::now());
                self.bar.set_message(format!("chunk {chunk}"));
            }
            Some(started) => {
                self.bar.println(format!(
                    "  {} Chunk {:>3}/{:<3}  {}",
                    green("✓"),
                    chunk,
                    event.total_chunks,
                    dim(&format!("{:.1}s", started.elapsed().as_secs_f64())),
                ));
                self.bar.set_position(event.chunks_processed as u64);
            }
        }
    }

    fn on_finish(&self, status: &RunStatus, event: &ProgressEvent) {
        self.bar.finish_and_clear();
        match status {
            RunStatus::Succeeded { .. } => eprintln!(
                "{} {} chunks summarized  {}",
                green("✔"),
                bold(&event.chunks_processed.to_string()),
                dim(&format!("({} API calls)", event.api_calls)),
            ),
            RunStatus::Failed { step, chunk, error } => {
                let at = match chunk {
                    Some(c) => format!("chunk {c}"),
                    None => format!("step {step}"),
                };
                // Keep the line short; the full error is printed by main.
                let msg: String = if error.chars().count() > 80 {
                    format!("{}\u{2026}", error.chars().take(79).collect::<String>())
                } else {
                    error.clone()
                };
                eprintln!("{} Failed at {}  {}", red("✘"), at, red(&msg));
            }
            RunStatus::Cancelled { step } => {
                eprintln!("{} Cancelled during {}", cyan("⚠"), step)
            }
        }
    }
}

impl SummaryProgressCallback for CliProgressCallback {
    fn on_event(&self, event: &ProgressEvent) {
        if let Some(ref status) = event.status {
            self.on_finish(status, event);
            return;
        }
        match (event.step, event.current_chunk) {
            (Step::Extract, _) => {
                self.bar.set_prefix("Extracting");
                self.bar
                    .set_message(format!("{} pages read", event.pages_processed));
            }
            (Step::Chunk, _) => {
                let mut active = self.bar_active.lock().unwrap_or_else(|e| e.into_inner());
                if !*active {
                    self.activate_bar(event.total_chunks);
                    *active = true;
                    self.bar.println(format!(
                        "{} {}",
                        cyan("◆"),
                        bold(&format!(
                            "{} pages split into {} chunks",
                            event.pages_processed, event.total_chunks
                        ))
                    ));
                }
            }
            (Step::Summarize, Some(chunk)) => self.on_chunk(chunk, event),
            (Step::Aggregate, _) => self.bar.set_message("joining fragments"),
            _ => {}
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Summarize into ./output/<name>_summary.txt
  pdfsum lecture.pdf

  # Write to a specific file
  pdfsum lecture.pdf -o notes.txt

  # Print the report instead of writing a file
  pdfsum --stdout paper.pdf

  # Iterative refinement: every call sees the notes written so far
  pdfsum --strategy refine book.pdf

  # Page windows with four calls in flight
  pdfsum --strategy advanced -c 4 slides.pdf

  # Use a specific model
  pdfsum --provider openai --model gpt-4.1-mini document.pdf

  # Inspect extracted text and detected sections (no API key needed)
  pdfsum --inspect-only document.pdf

  # JSON output with fragments and stats
  pdfsum --json document.pdf > summary.json

STRATEGIES:
  smart      one chunk per detected section, independent calls (default)
  refine     natural-break chunks with overlap, strictly sequential
  advanced   page-window chunks, independent calls

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)

  Variables can also be placed in a .env file in the working directory.
"#;

/// Summarize PDF documents with LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pdfsum",
    version,
    about = "Summarize PDF documents with LLMs",
    long_about = "Extract the text of a PDF, split it into chunks that fit a model's context \
window, summarize each chunk with an LLM and join the results into one plain-text report. \
Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any OpenAI-compatible endpoint.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file to summarize.
    input: PathBuf,

    /// Write the report to this file.
    #[arg(short, long, env = "PDFSUM_OUTPUT", conflicts_with = "stdout")]
    output: Option<PathBuf>,

    /// Directory for `<name>_summary.txt` when no --output is given.
    #[arg(long, env = "PDFSUM_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Print the report to stdout instead of writing a file.
    #[arg(long)]
    stdout: bool,

    /// Summarization strategy.
    #[arg(long, env = "PDFSUM_STRATEGY", value_enum, default_value = "smart")]
    strategy: StrategyArg,

    /// LLM model ID (e.g. gemini-2.5-flash, gpt-4.1-mini).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: gemini, openai, anthropic, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Upper bound on characters per chunk.
    #[arg(long, env = "PDFSUM_MAX_CHUNK_CHARS", default_value_t = 8000)]
    max_chunk_chars: usize,

    /// Characters repeated between consecutive chunks.
    #[arg(long, env = "PDFSUM_CHUNK_OVERLAP", default_value_t = 500)]
    chunk_overlap: usize,

    /// Running-context budget for the refine strategy.
    #[arg(long, env = "PDFSUM_MAX_CONTEXT_CHARS", default_value_t = 12000)]
    max_context_chars: usize,

    /// Condense the report with one extra call when it exceeds this size.
    #[arg(long, env = "PDFSUM_MAX_REPORT_CHARS")]
    max_report_chars: Option<usize>,

    /// Number of concurrent LLM calls (smart and advanced only).
    #[arg(short, long, env = "PDFSUM_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Retries per chunk on transient LLM failure.
    #[arg(long, env = "PDFSUM_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Base backoff between retries, in milliseconds.
    #[arg(long, env = "PDFSUM_RETRY_BACKOFF_MS", default_value_t = 500)]
    retry_backoff_ms: u64,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDFSUM_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens per call.
    #[arg(long, env = "PDFSUM_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "PDFSUM_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Pause between sequential calls, in milliseconds.
    #[arg(long, env = "PDFSUM_REQUEST_INTERVAL_MS", default_value_t = 0)]
    request_interval_ms: u64,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDFSUM_PASSWORD")]
    password: Option<String>,

    /// Path to a text file replacing the built-in instruction.
    #[arg(long, env = "PDFSUM_INSTRUCTION")]
    instruction: Option<PathBuf>,

    /// Prepend YAML front-matter with document metadata.
    #[arg(long, env = "PDFSUM_METADATA")]
    metadata: bool,

    /// Do not list extracted legal references and key terms in requests.
    #[arg(long, env = "PDFSUM_NO_TERMS")]
    no_terms: bool,

    /// Write `<name>.stats.json` next to the report.
    #[arg(long, env = "PDFSUM_STATS")]
    stats: bool,

    /// Output structured JSON (SummaryOutput) on stdout.
    #[arg(long, env = "PDFSUM_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDFSUM_NO_PROGRESS")]
    no_progress: bool,

    /// Print extracted structure only, no summarization.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFSUM_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFSUM_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum StrategyArg {
    Smart,
    Refine,
    Advanced,
}

impl From<StrategyArg> for Strategy {
    fn from(v: StrategyArg) -> Self {
        match v {
            StrategyArg::Smart => Strategy::Smart,
            StrategyArg::Refine => Strategy::Refine,
            StrategyArg::Advanced => Strategy::Advanced,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let info = inspect(&cli.input, cli.password.as_deref())
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&info).context("Failed to serialize inspection")?
            );
        } else {
            println!("File:         {}", cli.input.display());
            println!("Title:        {}", info.title);
            if let Some(ref a) = info.metadata.author {
                println!("Author:       {}", a);
            }
            if let Some(ref s) = info.metadata.subject {
                println!("Subject:      {}", s);
            }
            println!(
                "Pages:        {} ({} with text)",
                info.metadata.page_count, info.pages_with_text
            );
            println!("PDF Version:  {}", info.metadata.pdf_version);
            println!("Characters:   {}", info.total_chars);
            if let Some(ref p) = info.metadata.producer {
                println!("Producer:     {}", p);
            }
            println!("Sections:     {}", info.sections.len());
            for s in &info.sections {
                println!("  p.{:<4} {}", s.page, s.title);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn SummaryProgressCallback>)
    } else {
        None
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let config = build_config(&cli, progress_cb, cancel).await?;

    // ── Run ──────────────────────────────────────────────────────────────
    let output = if cli.stdout {
        summarize(&cli.input, &config).await
    } else if let Some(ref path) = cli.output {
        summarize_to_file(&cli.input, path, &config).await
    } else {
        summarize_into_dir(&cli.input, &config).await
    }
    .context("Summarization failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if cli.stdout {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.report.as_bytes())
            .context("Failed to write to stdout")?;
        if !output.report.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet && !cli.json {
        print_summary_line(&output);
    }

    Ok(())
}

fn print_summary_line(output: &SummaryOutput) {
    let s = &output.stats;
    let dest = output
        .output_path
        .as_ref()
        .map(|p| format!("  →  {}", bold(&p.display().to_string())))
        .unwrap_or_default();
    eprintln!(
        "   {} → {} chars ({:.1}%)  {}ms{}",
        s.input_chars,
        s.output_chars,
        s.compression_pct(),
        s.total_duration_ms,
        dest,
    );
    eprintln!(
        "   {} tokens in  /  {} tokens out{}",
        dim(&s.total_input_tokens.to_string()),
        dim(&s.total_output_tokens.to_string()),
        if s.condensed {
            dim("  (condensed)")
        } else {
            String::new()
        },
    );
    if s.coverage.total_terms > 0 {
        eprintln!(
            "   {}/{} key terms kept ({:.1}%)",
            s.coverage.terms_in_output,
            s.coverage.total_terms,
            s.coverage.percentage(),
        );
    }
}

/// Map CLI args to `SummaryConfig`.
async fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
) -> Result<SummaryConfig> {
    let mut builder = SummaryConfig::builder()
        .strategy(cli.strategy.clone().into())
        .output_dir(cli.output_dir.clone())
        .max_chunk_chars(cli.max_chunk_chars)
        .chunk_overlap(cli.chunk_overlap)
        .max_context_chars(cli.max_context_chars)
        .concurrency(cli.concurrency)
        .max_retries(cli.max_retries)
        .retry_backoff_ms(cli.retry_backoff_ms)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .api_timeout_secs(cli.api_timeout)
        .request_interval_ms(cli.request_interval_ms)
        .include_metadata(cli.metadata)
        .term_hints(!cli.no_terms)
        .write_stats(cli.stats)
        .cancellation_token(cancel);

    if let Some(ref path) = cli.instruction {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read instruction from {:?}", path))?;
        builder = builder.instruction(text);
    }
    if let Some(n) = cli.max_report_chars {
        builder = builder.max_report_chars(n);
    }
    if let Some(ref m) = cli.model {
        builder = builder.model(m.clone());
    }
    if let Some(ref p) = cli.provider {
        builder = builder.provider_name(p.clone());
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
