//! # inv2xlsx
//!
//! Extract structured invoice data from PDF documents using a multimodal
//! LLM backend, and assemble the results into a master-detail Excel report.
//!
//! ## Why this crate?
//!
//! Template-based invoice parsers break on every new supplier layout.
//! Instead this crate hands each PDF (or a page-range slice of it) to a
//! generative model that reads the document as a human would, constrained to
//! return a fixed JSON schema — then normalises the per-batch results into
//! one ordered record set and renders a two-tier spreadsheet: bold invoice
//! rows with collapsible line-item detail underneath.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDFs
//!  │
//!  ├─ 1. Segment    split >20-page documents into 15-page batches (lopdf)
//!  ├─ 2. Extract    one model call per batch, strict-JSON schema, retry on 429
//!  ├─ 3. Aggregate  merge + stamp filenames + normalise line items, in order
//!  └─ 4. Report     styled master-detail workbook (Invoices_Master.xlsx)
//! ```
//!
//! Processing is strictly sequential by design — one document, one batch,
//! one call at a time, with a 1 s pacing delay between documents. Concurrent
//! calls would multiply rate-limit risk without a token budget to absorb it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use inv2xlsx::{extract_invoices, render_workbook, ExtractionConfig, SourceDocument};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key resolved from GEMINI_API_KEY if not set explicitly
//!     let config = ExtractionConfig::default();
//!     let documents = vec![SourceDocument::new(
//!         "march.pdf",
//!         std::fs::read("march.pdf")?,
//!     )];
//!
//!     let output = extract_invoices(&documents, &config).await?;
//!     eprintln!("{} invoice(s) extracted", output.records.len());
//!
//!     if output.has_records() {
//!         let workbook = render_workbook(&output.records)?;
//!         std::fs::write("Invoices_Master.xlsx", workbook)?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `inv2xlsx` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! inv2xlsx = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod record;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, ModelChoice};
pub use error::{BackendError, BatchError, InvoiceError};
pub use output::{RunOutput, RunSummary};
pub use pipeline::aggregate::{extract_invoices, process_documents, resolve_backend};
pub use pipeline::backend::{GeminiClient, GenerativeBackend};
pub use pipeline::report::{layout_rows, render_workbook, ReportRow, HEADERS};
pub use progress::{NoopRunProgress, ProgressCallback, RunProgressCallback};
pub use record::{Batch, InvoiceRecord, LineItem, SourceDocument};
pub use session::SessionStore;
