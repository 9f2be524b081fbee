//! Configuration types for an extraction run.
//!
//! All run behaviour is controlled through [`ExtractionConfig`], built via
//! its [`ExtractionConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share a config across a run, log it, and diff two runs to
//! understand why their outputs differ.
//!
//! Deliberately, almost nothing here is tunable: the model is selectable from
//! a two-entry catalogue and the credential can be injected, but batch size,
//! the segmentation threshold, retry counts, backoff, and pacing are fixed
//! constants of the pipeline. They encode the backend's tolerance, not user
//! preference.

use crate::error::InvoiceError;
use crate::pipeline::backend::GenerativeBackend;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

// ── Pipeline constants ───────────────────────────────────────────────────

/// Pages per batch when a large document is split.
pub const PAGES_PER_BATCH: usize = 15;

/// Documents at or below this page count are sent whole as a single "All"
/// batch. Note this is deliberately larger than [`PAGES_PER_BATCH`]: a
/// 21-page document splits into 15 + 6 even though 20 pages would have fit
/// in one call.
pub const SEGMENTATION_THRESHOLD: usize = 20;

/// Total model-call attempts per batch (1 initial + 2 retries).
pub const MAX_ATTEMPTS: u32 = 3;

/// Backoff before retry attempt `n` (1-indexed) is
/// `BACKOFF_BASE + BACKOFF_STEP * (n - 1)`: 5 s, then 10 s.
pub const BACKOFF_BASE: Duration = Duration::from_secs(5);
pub const BACKOFF_STEP: Duration = Duration::from_secs(5);

/// Fixed sleep between documents (not between batches of the same document),
/// skipped before the first document. Keeps burst rate below the backend's
/// per-minute quota.
pub const DOCUMENT_PACING: Duration = Duration::from_secs(1);

/// Per-call HTTP timeout for the backend client.
pub const API_TIMEOUT: Duration = Duration::from_secs(120);

/// Compute the backoff delay before retry attempt `attempt` (1-indexed).
pub fn backoff_delay(attempt: u32) -> Duration {
    BACKOFF_BASE + BACKOFF_STEP * attempt.saturating_sub(1)
}

// ── Model catalogue ──────────────────────────────────────────────────────

/// The supported extraction engines.
///
/// Exactly two models are supported; both accept an `application/pdf` part
/// and honour the strict-JSON response constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModelChoice {
    /// `gemini-2.5-flash` (default).
    #[default]
    Gemini25Flash,
    /// `gemini-2.0-flash`.
    Gemini20Flash,
}

impl ModelChoice {
    /// The wire identifier sent to the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelChoice::Gemini25Flash => "gemini-2.5-flash",
            ModelChoice::Gemini20Flash => "gemini-2.0-flash",
        }
    }
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelChoice {
    type Err = InvoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "gemini-2.5-flash" => Ok(ModelChoice::Gemini25Flash),
            "gemini-2.0-flash" => Ok(ModelChoice::Gemini20Flash),
            other => Err(InvoiceError::InvalidConfig(format!(
                "Unknown model '{other}'. Supported: gemini-2.5-flash, gemini-2.0-flash"
            ))),
        }
    }
}

// ── Config ───────────────────────────────────────────────────────────────

/// Configuration for one extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use inv2xlsx::{ExtractionConfig, ModelChoice};
///
/// let config = ExtractionConfig::builder()
///     .model(ModelChoice::Gemini20Flash)
///     .api_key("AIza...")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone, Default)]
pub struct ExtractionConfig {
    /// Which model the extraction calls use.
    pub model: ModelChoice,

    /// API key for the backend. If `None`, resolution falls back to the
    /// `GEMINI_API_KEY` environment variable; if that is also absent, the run
    /// fails fast with [`InvoiceError::MissingApiKey`] before any pipeline
    /// work.
    pub api_key: Option<String>,

    /// Pre-constructed backend. Takes precedence over `api_key`. Useful in
    /// tests or when the caller needs custom middleware around the model API.
    pub backend: Option<Arc<dyn GenerativeBackend>>,

    /// Observer for per-document progress events. If `None`, no events fire.
    pub progress_callback: Option<ProgressCallback>,
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("backend", &self.backend.as_ref().map(|_| "<dyn GenerativeBackend>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn RunProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn model(mut self, model: ModelChoice) -> Self {
        self.config.model = model;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn backend(mut self, backend: Arc<dyn GenerativeBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, InvoiceError> {
        if let Some(ref key) = self.config.api_key {
            if key.trim().is_empty() {
                return Err(InvoiceError::InvalidConfig(
                    "API key must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_round_trip() {
        for m in [ModelChoice::Gemini25Flash, ModelChoice::Gemini20Flash] {
            assert_eq!(ModelChoice::from_str(m.as_str()).unwrap(), m);
        }
    }

    #[test]
    fn unknown_model_is_rejected() {
        assert!(ModelChoice::from_str("gpt-4o").is_err());
    }

    #[test]
    fn default_model_is_25_flash() {
        assert_eq!(ModelChoice::default(), ModelChoice::Gemini25Flash);
    }

    #[test]
    fn empty_api_key_fails_validation() {
        let result = ExtractionConfig::builder().api_key("  ").build();
        assert!(result.is_err());
    }

    #[test]
    fn backoff_schedule_is_5_then_10() {
        assert_eq!(backoff_delay(1), Duration::from_secs(5));
        assert_eq!(backoff_delay(2), Duration::from_secs(10));
    }

    #[test]
    fn threshold_exceeds_batch_size() {
        // A 21-page document splits into 15 + 6; 16..=20 pages go whole.
        assert!(SEGMENTATION_THRESHOLD > PAGES_PER_BATCH);
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = ExtractionConfig::builder().api_key("secret").build().unwrap();
        let dump = format!("{config:?}");
        assert!(!dump.contains("secret"));
        assert!(dump.contains("redacted"));
    }
}
