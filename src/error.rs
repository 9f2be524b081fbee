//! Error types for the inv2xlsx library.
//!
//! Three distinct error types reflect three distinct failure modes:
//!
//! * [`InvoiceError`] — **Fatal**: the run cannot proceed at all (missing or
//!   rejected API key, invalid configuration, workbook write failure).
//!   Returned as `Err(InvoiceError)` from the top-level entry points.
//!
//! * [`BatchError`] — **Non-fatal**: a single batch failed (model call
//!   exhausted its retries, the response was not valid JSON) but other
//!   batches and documents are fine. Logged and counted in
//!   [`crate::output::RunSummary`], never propagated to abort the run —
//!   partial success is the expected steady state of a multi-document batch
//!   job.
//!
//! * [`BackendError`] — the classified failure taxonomy at the model-API
//!   adapter boundary. The HTTP status code is mapped to an explicit
//!   `RateLimited | Auth | Api | Transport` tag here, so retry decisions
//!   never depend on substring-matching a rendered error message.

use thiserror::Error;

/// All fatal errors returned by the inv2xlsx library.
///
/// Batch-level failures use [`BatchError`] and are tallied in
/// [`crate::output::RunSummary`] rather than propagated here.
#[derive(Debug, Error)]
pub enum InvoiceError {
    // ── Credential errors ─────────────────────────────────────────────────
    /// No API key was supplied and none was found in the environment.
    #[error("No API key configured.\nPass --api-key or set GEMINI_API_KEY.")]
    MissingApiKey,

    /// The backend rejected the key at client-construction or first use.
    #[error("API key rejected by the backend: {detail}")]
    InvalidApiKey { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Report errors ─────────────────────────────────────────────────────
    /// The workbook could not be assembled.
    #[error("Failed to build the report workbook: {0}")]
    ReportFailed(#[from] rust_xlsxwriter::XlsxError),

    /// Could not write the report file to disk.
    #[error("Failed to write report file '{path}': {source}")]
    ReportWriteFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single batch.
///
/// A failed batch contributes zero records; the run continues with the
/// remaining batches and documents.
#[derive(Debug, Clone, Error)]
pub enum BatchError {
    /// The model call failed after all retry attempts.
    #[error("Batch '{range}': model call failed after {attempts} attempts: {detail}")]
    CallFailed {
        range: String,
        attempts: u32,
        detail: String,
    },

    /// The model returned text that is not the requested JSON shape.
    #[error("Batch '{range}': response is not valid invoice JSON: {detail}")]
    MalformedResponse { range: String, detail: String },

    /// The model returned a response with no usable text part.
    #[error("Batch '{range}': response contained no text")]
    EmptyResponse { range: String },

    /// The backend rejected the credential. Retrying other batches with the
    /// same key is pointless, so the aggregator escalates this one to a
    /// fatal [`InvoiceError::InvalidApiKey`].
    #[error("Batch '{range}': API key rejected: {detail}")]
    AuthRejected { range: String, detail: String },
}

/// Classified failure from the generative backend, produced at the adapter
/// boundary.
///
/// Only [`BackendError::RateLimited`] is eligible for retry with backoff;
/// everything else is definitive for the attempt.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// Request-quota exhaustion (HTTP 429). Check `retry_after_secs` for a
    /// server-specified delay, or use the pipeline's own backoff if `None`.
    #[error("Rate limit exceeded (HTTP 429)")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Authentication/authorization failure (HTTP 401/403) — retry will not
    /// help; the run should surface a credential error.
    #[error("Authentication error: {detail}")]
    Auth { detail: String },

    /// Any other non-success API response.
    #[error("API error (HTTP {status}): {detail}")]
    Api { status: u16, detail: String },

    /// The request never produced an HTTP response (DNS, connect, timeout).
    #[error("Transport error: {detail}")]
    Transport { detail: String },
}

impl BackendError {
    /// Whether this failure is transient and eligible for retry with backoff.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, BackendError::RateLimited { .. })
    }

    /// Whether this failure means the credential itself was rejected.
    pub fn is_auth(&self) -> bool {
        matches!(self, BackendError::Auth { .. })
    }
}
