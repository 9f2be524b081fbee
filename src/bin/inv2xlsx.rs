//! CLI binary for inv2xlsx.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, renders run progress, and writes the report.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use inv2xlsx::{
    extract_invoices, render_workbook, ExtractionConfig, InvoiceRecord, ModelChoice,
    ProgressCallback, RunProgressCallback, SessionStore, SourceDocument,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
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

/// Terminal progress callback: one bar tracking documents, with per-batch
/// log lines above it. Processing is sequential so events arrive in order.
struct CliProgress {
    bar: ProgressBar,
    batch_errors: AtomicUsize,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_run_start
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>2}/{len} documents  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");

        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            batch_errors: AtomicUsize::new(0),
        })
    }
}

impl RunProgressCallback for CliProgress {
    fn on_run_start(&self, total_documents: usize) {
        self.bar.set_length(total_documents as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_documents} document(s)…"))
        ));
    }

    fn on_document_start(&self, _index: usize, _total: usize, filename: &str) {
        self.bar.set_message(filename.to_string());
    }

    fn on_batch_complete(&self, filename: &str, range: &str, records: usize) {
        self.bar.println(format!(
            "  {} {:<28} {:<12} {}",
            green("✓"),
            filename,
            dim(range),
            dim(&format!("{records} invoice(s)")),
        ));
    }

    fn on_batch_error(&self, filename: &str, range: &str, error: &str) {
        self.batch_errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.len() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:<28} {:<12} {}",
            red("✗"),
            filename,
            dim(range),
            red(&msg),
        ));
    }

    fn on_document_complete(&self, _index: usize, _total: usize, _filename: &str, _records: usize) {
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_records: usize) {
        self.bar.finish_and_clear();
        let failed = self.batch_errors.load(Ordering::SeqCst);
        if total_records > 0 && failed == 0 {
            eprintln!(
                "{} {} invoice(s) extracted",
                green("✔"),
                bold(&total_records.to_string())
            );
        } else if total_records > 0 {
            eprintln!(
                "{} {} invoice(s) extracted  ({} batch(es) failed)",
                cyan("⚠"),
                bold(&total_records.to_string()),
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract one invoice PDF into Invoices_Master.xlsx
  inv2xlsx invoice.pdf

  # Several documents, custom output path
  inv2xlsx march/*.pdf -o reports/march.xlsx

  # Use the older engine
  inv2xlsx --model gemini-2.0-flash invoice.pdf

  # Dump the extracted records as JSON instead of a summary
  inv2xlsx --json invoice.pdf > records.json

SUPPORTED MODELS:
  gemini-2.5-flash   (default)
  gemini-2.0-flash

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY   Google Gemini API key (or pass --api-key)

SETUP:
  1. Set API key:   export GEMINI_API_KEY=AIza...
  2. Extract:       inv2xlsx invoices/*.pdf

Documents over 20 pages are split into 15-page batches automatically.
Rate-limited calls are retried up to 3 times with 5 s / 10 s backoff.
"#;

/// Extract structured invoice data from PDFs into a master-detail Excel report.
#[derive(Parser, Debug)]
#[command(
    name = "inv2xlsx",
    version,
    about = "Extract structured invoice data from PDFs into a master-detail Excel report",
    long_about = "Extract invoice header and line-item data from PDF documents using a \
multimodal LLM, and render the results as a styled master-detail workbook: one bold row \
per invoice with collapsible line-item rows underneath.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF files to process, in order.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Write the workbook to this path.
    #[arg(short, long, env = "INV2XLSX_OUTPUT", default_value = "Invoices_Master.xlsx")]
    output: PathBuf,

    /// Extraction engine.
    #[arg(long, env = "INV2XLSX_MODEL", value_enum, default_value = "gemini-2.5-flash")]
    model: ModelArg,

    /// Gemini API key. Falls back to the GEMINI_API_KEY environment variable.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Print the extracted records as JSON to stdout instead of the summary view.
    #[arg(long)]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "INV2XLSX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "INV2XLSX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "INV2XLSX_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum ModelArg {
    #[value(name = "gemini-2.5-flash")]
    Gemini25Flash,
    #[value(name = "gemini-2.0-flash")]
    Gemini20Flash,
}

impl From<ModelArg> for ModelChoice {
    fn from(v: ModelArg) -> Self {
        match v {
            ModelArg::Gemini25Flash => ModelChoice::Gemini25Flash,
            ModelArg::Gemini20Flash => ModelChoice::Gemini20Flash,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs while the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress;
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

    // ── Load documents ───────────────────────────────────────────────────
    let mut documents = Vec::with_capacity(cli.inputs.len());
    for path in &cli.inputs {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        documents.push(SourceDocument::new(filename, data));
    }

    // ── Build config ─────────────────────────────────────────────────────
    let mut builder = ExtractionConfig::builder().model(cli.model.clone().into());
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if show_progress {
        let cb = CliProgress::new();
        builder = builder.progress_callback(cb as ProgressCallback);
    }
    let config = builder.build().context("Invalid configuration")?;

    // ── Run the pipeline ─────────────────────────────────────────────────
    let output = extract_invoices(&documents, &config)
        .await
        .context("Extraction run failed")?;

    let mut session = SessionStore::new();
    session.replace(output.records.clone());

    if !output.has_records() {
        eprintln!("{} No data found.", cyan("⚠"));
        return Ok(());
    }

    // ── Write the report ─────────────────────────────────────────────────
    let workbook = render_workbook(&output.records).context("Failed to build workbook")?;
    tokio::fs::write(&cli.output, &workbook)
        .await
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;

    if !cli.quiet {
        eprintln!(
            "{}  {} invoice(s)  {}ms  →  {}",
            green("✔"),
            output.summary.records_extracted,
            output.summary.duration_ms,
            bold(&cli.output.display().to_string()),
        );
    }

    // ── Summary view ─────────────────────────────────────────────────────
    if cli.json {
        let records = session.records().unwrap_or(&[]);
        let json = serde_json::to_string_pretty(records)
            .context("Failed to serialise records")?;
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle.write_all(json.as_bytes()).context("Failed to write to stdout")?;
        handle.write_all(b"\n").ok();
    } else if !cli.quiet {
        if let Some(records) = session.records() {
            print_summary(records);
        }
    }

    Ok(())
}

/// Read-only per-invoice summary, printed after a successful run.
fn print_summary(records: &[InvoiceRecord]) {
    eprintln!();
    for record in records {
        eprintln!(
            "{} {}  {} {}  {} {}",
            cyan("▸"),
            bold(or_na(&record.seller_name)),
            dim("id"),
            or_na(&record.invoice_id),
            dim("date"),
            or_na(&record.date_issued),
        );
        eprintln!(
            "    total {:.2} {}   buyer {}   {} item(s)   {}",
            record.total_amount,
            record.currency,
            or_na(&record.buyer_name),
            record.line_items.len(),
            dim(or_na(&record.general_summary)),
        );
    }
}

fn or_na(s: &str) -> &str {
    if s.is_empty() {
        "N/A"
    } else {
        s
    }
}
