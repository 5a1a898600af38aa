//! CLI binary for edgequake-stitch.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `StitchConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_stitch::assemble::write_atomic;
use edgequake_stitch::{
    assemble, assemble_to_file, plan, AssemblyProgressCallback, AssemblyReport, BoundaryState,
    ProgressCallback, StitchConfig, StitchError,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
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

/// Live progress bar over windows, plus one log line per window and per
/// escalated boundary.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Splitting…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} windows  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rewriting");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl AssemblyProgressCallback for CliProgressCallback {
    fn on_assembly_start(&self, total_windows: usize) {
        self.activate_bar(total_windows);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rewriting {total_windows} windows…"))
        ));
    }

    fn on_window_start(&self, index: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(format!("window {index}"));
    }

    fn on_window_complete(&self, index: usize, total: usize, rewritten_len: usize) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} Window {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            index + 1,
            total,
            dim(&format!("{rewritten_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_window_error(&self, index: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Window {:>3}/{:<3}  {}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_boundary_resolved(&self, left_index: usize, state: BoundaryState, match_len: usize) {
        let label = match state {
            BoundaryState::AutoMatched => return,
            BoundaryState::AssistedMatched => cyan("assisted"),
            BoundaryState::Forced => red("forced"),
            BoundaryState::Pending | BoundaryState::Failed => return,
        };
        self.bar.println(format!(
            "  {} Boundary {}→{}  {}  {}",
            cyan("⚠"),
            left_index,
            left_index + 1,
            label,
            dim(&format!("best auto match {match_len} chars")),
        ));
    }

    fn on_boundary_failed(&self, left_index: usize, error: &str) {
        self.bar.println(format!(
            "  {} Boundary {}→{}  {}",
            red("✗"),
            left_index,
            left_index + 1,
            red(error),
        ));
    }

    fn on_assembly_complete(&self, total_windows: usize, success: bool) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);

        if success {
            eprintln!(
                "{} {} windows stitched",
                green("✔"),
                bold(&total_windows.to_string())
            );
        } else {
            eprintln!(
                "{} assembly failed  ({} of {} windows failed)",
                red("✘"),
                red(&failed.to_string()),
                total_windows,
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Rewrite and stitch a chapter (stdout)
  stitch chapter_8.txt

  # Write to file, label the chapter for the prompt
  stitch chapter_8.txt --label chapter_8 -o chapter_8.md

  # Read from stdin
  pdftotext book.pdf - | stitch - -o book.md

  # Show the windows without calling any model
  stitch --plan chapter_8.txt

  # Cheap first pass: no stitch oracle, fail on any unmatched boundary
  stitch --no-assist chapter_8.txt -o chapter_8.md

  # Never fail on a boundary; forced joins are marked in the output
  stitch --force-unresolved chapter_8.txt -o chapter_8.md

  # JSON output (document, joins and stats, or the failure report)
  stitch --json chapter_8.txt > chapter_8.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID

EXIT STATUS:
  0  document assembled
  1  usage, provider or I/O error
  2  assembly failed; the report lists every failed window and boundary
"#;

/// Rewrite long text through an LLM in overlapping windows and stitch it back together.
#[derive(Parser, Debug)]
#[command(
    name = "stitch",
    version,
    about = "Rewrite long text through an LLM in overlapping windows and stitch it back together",
    long_about = "Split a long text into overlapping windows, rewrite each window with an LLM \
(concurrently), then rediscover each overlap in the rewritten text and join the windows so \
nothing is dropped or repeated. Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and \
any OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input text file, or `-` for stdin.
    input: String,

    /// Write the merged document to this file instead of stdout.
    #[arg(short, long, env = "STITCH_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Document label used in the rewrite prompt, e.g. chapter_8.
    #[arg(long, env = "STITCH_LABEL")]
    label: Option<String>,

    /// Window length in chars.
    #[arg(long, env = "STITCH_WINDOW_SIZE", default_value_t = 6000)]
    window_size: usize,

    /// Overlap between consecutive windows in chars.
    #[arg(long, env = "STITCH_OVERLAP_SIZE", default_value_t = 3000)]
    overlap_size: usize,

    /// Shortest shared block accepted as an automatic join.
    #[arg(long, env = "STITCH_MIN_MATCH", default_value_t = 20)]
    min_match: usize,

    /// Number of concurrent rewrite calls.
    #[arg(short, long, env = "STITCH_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Do not escalate unmatched boundaries to the stitch oracle.
    #[arg(long, env = "STITCH_NO_ASSIST")]
    no_assist: bool,

    /// Join unresolved boundaries with a marker instead of failing.
    #[arg(long, env = "STITCH_FORCE_UNRESOLVED")]
    force_unresolved: bool,

    /// Path to a text file containing a custom rewrite prompt.
    #[arg(long, env = "STITCH_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens per call.
    #[arg(long, env = "STITCH_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "STITCH_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries per call on transient LLM failure.
    #[arg(long, env = "STITCH_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "STITCH_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Output structured JSON instead of text.
    #[arg(long, env = "STITCH_JSON")]
    json: bool,

    /// Print the window plan only; no model calls.
    #[arg(long)]
    plan: bool,

    /// Disable progress bar.
    #[arg(long, env = "STITCH_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "STITCH_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "STITCH_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; --verbose always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.plan;
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

    let text = read_input(&cli.input).await?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn AssemblyProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Plan-only mode ───────────────────────────────────────────────────
    if cli.plan {
        let windows = plan(&text, &config).context("Failed to split input")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&windows).context("Failed to serialize plan")?
            );
        } else {
            println!("Input:    {} chars", text.chars().count());
            println!("Windows:  {}", windows.len());
            for w in &windows {
                println!(
                    "  {:>3}  [{:>7}, {:>7})  {:>5} chars",
                    w.index,
                    w.start_offset,
                    w.end_offset,
                    w.len()
                );
            }
        }
        return Ok(());
    }

    // ── Run assembly ─────────────────────────────────────────────────────
    match (&cli.output, cli.json) {
        (Some(output_path), false) => {
            let stats = match assemble_to_file(&text, output_path, &config).await {
                Ok(stats) => stats,
                Err(e) => return handle_failure(e, &cli),
            };

            if !cli.quiet {
                eprintln!(
                    "{}  {} windows  {} auto / {} assisted / {} forced  {}ms  →  {}",
                    if stats.forced_joins == 0 {
                        green("✔")
                    } else {
                        cyan("⚠")
                    },
                    stats.total_windows,
                    stats.auto_joins,
                    stats.assisted_joins,
                    stats.forced_joins,
                    stats.total_duration_ms,
                    bold(&output_path.display().to_string()),
                );
            }
        }
        (output, json) => {
            let doc = match assemble(&text, &config).await {
                Ok(doc) => doc,
                Err(e) => return handle_failure(e, &cli),
            };

            let rendered = if json {
                serde_json::to_string_pretty(&doc).context("Failed to serialise output")?
            } else {
                doc.text.clone()
            };

            if let Some(path) = output {
                write_atomic(path, &rendered)
                    .await
                    .context("Failed to write output")?;
            } else {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                handle
                    .write_all(rendered.as_bytes())
                    .context("Failed to write to stdout")?;
                if !rendered.ends_with('\n') {
                    handle.write_all(b"\n").ok();
                }
            }

            if !cli.quiet && !show_progress {
                eprintln!(
                    "Stitched {} windows ({} auto, {} assisted, {} forced) in {}ms",
                    doc.stats.total_windows,
                    doc.stats.auto_joins,
                    doc.stats.assisted_joins,
                    doc.stats.forced_joins,
                    doc.stats.total_duration_ms
                );
            }
        }
    }

    Ok(())
}

/// Print an assembly failure report and exit with status 2; pass other errors through.
fn handle_failure(err: StitchError, cli: &Cli) -> Result<()> {
    let report = match err {
        StitchError::AssemblyFailed(report) => report,
        other => return Err(other).context("Assembly failed"),
    };

    if cli.json {
        let json =
            serde_json::to_string_pretty(&*report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        print_report(&report);
    }
    std::process::exit(2);
}

fn print_report(report: &AssemblyReport) {
    eprintln!(
        "{} {} window(s) failed, {} boundary(ies) unresolved",
        red("✘"),
        report.window_failures.len(),
        report.boundary_failures.len()
    );
    for f in &report.window_failures {
        eprintln!(
            "  {} window {:>3}  [{}, {})  {}",
            red("✗"),
            f.index(),
            f.window.start_offset,
            f.window.end_offset,
            f.error
        );
    }
    for f in &report.boundary_failures {
        eprintln!("  {} {}", red("✗"), f.error);
    }
    let pending = report.pending_boundaries();
    if !pending.is_empty() {
        eprintln!(
            "{}",
            dim(&format!(
                "  {} boundary(ies) next to a failed window not checked",
                pending.len()
            ))
        );
    }
    if report.window_failures.is_empty() && !report.boundary_failures.is_empty() {
        eprintln!(
            "{}",
            dim("  hint: retry with --force-unresolved, or a lower --min-match")
        );
    }
}

async fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read input file '{input}'"))
}

/// Map CLI args to `StitchConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<StitchConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = StitchConfig::builder()
        .window_size(cli.window_size)
        .overlap_size(cli.overlap_size)
        .min_match_len(cli.min_match)
        .oracle_concurrency(cli.concurrency)
        .assisted_reconcile(!cli.no_assist)
        .force_unresolved(cli.force_unresolved)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    let mut config = builder.build().context("Invalid configuration")?;

    config.model = cli.model.clone();
    config.provider_name = cli.provider.clone();
    config.document_label = cli.label.clone();
    config.system_prompt = system_prompt;

    Ok(config)
}
