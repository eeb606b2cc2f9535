//! CLI binary for tender-analyzer.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AnalyzeConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tender_analyzer::{
    analyze, convert_document, AnalysisProgressCallback, AnalyzeConfig, DocType, HttpExtractor,
    ProgressEvent,
};
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: renders the pipeline's percent-complete
/// events as a live progress bar with the current stage as prefix.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Analyzing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_progress(&self, event: ProgressEvent) {
        self.bar.set_position(event.percent as u64);
        self.bar.set_prefix(capitalize(event.stage));
        self.bar.set_message(event.message);
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Full analysis (conversion + field extraction)
  tender-analyze ihale.pdf --analysis-url http://localhost:8080

  # Write the analysis record to a file
  tender-analyze ihale.pdf --analysis-url http://localhost:8080 -o analiz.json

  # Conversion only — no language-understanding service needed
  tender-analyze ihale.pdf --convert-only

  # Scope validation to a known document type
  tender-analyze idari_sartname.pdf --doc-type idari_sartname --analysis-url http://localhost:8080

  # Tune chunking for very large bundles
  tender-analyze buyuk_dosya.pdf --chunk-size 20 --parallelism 5 --analysis-url http://localhost:8080

SERVICES:
  The document-conversion service (default http://localhost:5001) converts
  PDFs/scans/office files to text, tables and images. It is required.

  The language-understanding service (--analysis-url) receives chunk text
  and returns candidate field values. Without it only --convert-only works.

ENVIRONMENT VARIABLES:
  TENDER_CONVERSION_URL   Conversion service base URL
  TENDER_ANALYSIS_URL     Language-understanding service base URL
"#;

/// Analyze tender documents into structured bid-relevant fields.
#[derive(Parser, Debug)]
#[command(
    name = "tender-analyze",
    version,
    about = "Analyze tender documents into structured bid-relevant fields",
    long_about = "Analyze procurement documents (PDF, scans, office files) through chunked \
parallel conversion, multi-source conflict resolution, critical-field validation and \
confidence scoring. Results are printed as JSON.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Document to analyze.
    input: PathBuf,

    /// Write the JSON output to this file instead of stdout.
    #[arg(short, long, env = "TENDER_OUTPUT")]
    output: Option<PathBuf>,

    /// Conversion service base URL.
    #[arg(long, env = "TENDER_CONVERSION_URL", default_value = "http://localhost:5001")]
    conversion_url: String,

    /// Language-understanding service base URL (enables extraction).
    #[arg(long, env = "TENDER_ANALYSIS_URL")]
    analysis_url: Option<String>,

    /// Pages per chunk when splitting large documents.
    #[arg(long, env = "TENDER_CHUNK_SIZE", default_value_t = 10)]
    chunk_size: usize,

    /// Chunks converted concurrently per batch.
    #[arg(short, long, env = "TENDER_PARALLELISM", default_value_t = 3)]
    parallelism: usize,

    /// Document type: idari_sartname, teknik_sartname, birim_fiyat, sozlesme, ilan.
    #[arg(long, env = "TENDER_DOC_TYPE")]
    doc_type: Option<String>,

    /// Skip targeted re-extraction of missing critical fields.
    #[arg(long)]
    no_refill: bool,

    /// Convert and merge only; skip extraction, conflicts and validation.
    #[arg(long)]
    convert_only: bool,

    /// Maximum wait in seconds for asynchronous conversion jobs.
    #[arg(long, env = "TENDER_MAX_WAIT", default_value_t = 600)]
    max_wait: u64,

    /// Disable the progress bar.
    #[arg(long, env = "TENDER_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TENDER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the JSON result.
    #[arg(short, long, env = "TENDER_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would fight with the progress bar; keep stderr
    // quiet unless the user asked for detail.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb = show_progress.then(CliProgressCallback::new);

    let mut builder = AnalyzeConfig::builder()
        .conversion_base_url(&cli.conversion_url)
        .chunk_size_pages(cli.chunk_size)
        .parallelism(cli.parallelism)
        .max_poll_wait(Duration::from_secs(cli.max_wait))
        .refill_missing(!cli.no_refill);

    if let Some(ref raw) = cli.doc_type {
        let doc_type = DocType::parse(raw)
            .with_context(|| format!("Unknown document type: '{raw}'"))?;
        builder = builder.doc_type(doc_type);
    }
    if let Some(ref url) = cli.analysis_url {
        builder = builder.extractor(Arc::new(HttpExtractor::new(url.clone())));
    }
    if let Some(ref cb) = progress_cb {
        builder = builder.progress_callback(Arc::clone(cb) as Arc<dyn AnalysisProgressCallback>);
    }

    let config = builder.build().context("Invalid configuration")?;

    // ── Run ──────────────────────────────────────────────────────────────
    let json = if cli.convert_only {
        let (document, merged) = convert_document(&cli.input, &config)
            .await
            .context("Conversion failed")?;
        if let Some(ref cb) = progress_cb {
            cb.finish();
        }
        if !cli.quiet {
            eprintln!(
                "{} {} pages converted  {}",
                green("✔"),
                bold(&document.page_count.to_string()),
                dim(&format!(
                    "{} chunks ok / {} attempted",
                    merged.metadata.total_chunks, merged.metadata.attempted_chunks
                )),
            );
        }
        serde_json::json!({ "document": document, "merged": merged })
    } else {
        if cli.analysis_url.is_none() {
            anyhow::bail!(
                "extraction requires --analysis-url (or TENDER_ANALYSIS_URL); \
                 use --convert-only to run without the language-understanding service"
            );
        }
        let output = analyze(&cli.input, &config).await.context("Analysis failed")?;
        if let Some(ref cb) = progress_cb {
            cb.finish();
        }
        if !cli.quiet {
            print_summary(&output);
        }
        serde_json::to_value(&output).context("Failed to serialise output")?
    };

    // ── Emit ─────────────────────────────────────────────────────────────
    let rendered = serde_json::to_string_pretty(&json).context("Failed to serialise output")?;
    match cli.output {
        Some(ref path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !cli.quiet {
                eprintln!("   →  {}", bold(&path.display().to_string()));
            }
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(rendered.as_bytes())
                .context("Failed to write to stdout")?;
            handle.write_all(b"\n").ok();
        }
    }

    Ok(())
}

fn print_summary(output: &tender_analyzer::AnalysisOutput) {
    let v = &output.validation.after;
    let tick = if v.valid { green("✔") } else { cyan("⚠") };
    eprintln!(
        "{tick} completeness {}  confidence {}  {}",
        bold(&format!("{:.0}%", v.completeness * 100.0)),
        bold(&format!("{:.2}", output.confidence.overall_confidence)),
        dim(&format!(
            "{} chunks ok / {} attempted, {}",
            output.merged.metadata.total_chunks,
            output.merged.metadata.attempted_chunks,
            output.report.total_duration_readable
        )),
    );
    if !output.needs_review.is_empty() {
        eprintln!(
            "   {} field(s) need review: {}",
            red(&output.needs_review.len().to_string()),
            output
                .needs_review
                .iter()
                .map(|r| r.field.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    if !v.missing.is_empty() {
        eprintln!(
            "   {} critical field(s) missing: {}",
            red(&v.missing.len().to_string()),
            v.missing
                .iter()
                .map(|m| m.field.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
}
