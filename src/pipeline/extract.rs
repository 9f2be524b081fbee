//! Batch extraction: drive one model call with retry and parse the result.
//!
//! This module is intentionally thin — the prompt lives in
//! [`crate::prompts`] and the wire handling in [`super::backend`], so retry
//! policy can change without touching either.
//!
//! ## Retry strategy
//!
//! Only rate-limit failures are retried: the quota recovers on its own, so
//! waiting helps. Everything else (auth, malformed request, 5xx, transport)
//! either cannot be fixed by waiting or is rare enough that retrying just
//! stalls the run. The backoff is linear — 5 s, then 10 s — sized to the
//! backend's per-minute quota window rather than exponential growth; with 3
//! total attempts the pipeline never stalls more than ~15 s on one batch.
//!
//! A failed batch yields `Err(BatchError)` and contributes zero records.
//! Callers log it and continue; nothing here can abort the run.

use crate::config::{backoff_delay, MAX_ATTEMPTS};
use crate::error::{BackendError, BatchError};
use crate::prompts::extraction_prompt;
use crate::record::{parse_records, Batch, InvoiceRecord};
use super::backend::GenerativeBackend;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Extract invoice records from one batch.
///
/// Makes up to [`MAX_ATTEMPTS`] backend calls (one per attempt), sleeping
/// between attempts only when the previous failure was a rate limit.
pub async fn extract_batch(
    backend: &dyn GenerativeBackend,
    model: &str,
    batch: &Batch,
) -> Result<Vec<InvoiceRecord>, BatchError> {
    let prompt = extraction_prompt(&batch.range);

    let mut attempt = 1;
    loop {
        match backend.extract_json(model, &batch.data, &prompt).await {
            Ok(text) => {
                if text.trim().is_empty() {
                    return Err(BatchError::EmptyResponse {
                        range: batch.range.clone(),
                    });
                }
                return match parse_records(&text) {
                    Ok(records) => {
                        debug!(
                            "Batch '{}': {} record(s) on attempt {attempt}",
                            batch.range,
                            records.len()
                        );
                        Ok(records)
                    }
                    Err(detail) => Err(BatchError::MalformedResponse {
                        range: batch.range.clone(),
                        detail,
                    }),
                };
            }
            Err(e) if e.is_rate_limited() && attempt < MAX_ATTEMPTS => {
                let delay = backoff_delay(attempt);
                warn!(
                    "Batch '{}': rate limited, retry {}/{} after {:?}",
                    batch.range,
                    attempt,
                    MAX_ATTEMPTS - 1,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(BackendError::Auth { detail }) => {
                return Err(BatchError::AuthRejected {
                    range: batch.range.clone(),
                    detail,
                });
            }
            Err(e) => {
                return Err(call_failed(&batch.range, attempt, e));
            }
        }
    }
}

fn call_failed(range: &str, attempts: u32, error: BackendError) -> BatchError {
    BatchError::CallFailed {
        range: range.to_string(),
        attempts,
        detail: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend that fails `failures` times with the given error, then
    /// succeeds with `payload`.
    struct FlakyBackend {
        calls: AtomicUsize,
        failures: usize,
        error: BackendError,
        payload: String,
    }

    #[async_trait]
    impl GenerativeBackend for FlakyBackend {
        async fn extract_json(
            &self,
            _model: &str,
            _pdf_bytes: &[u8],
            _prompt: &str,
        ) -> Result<String, BackendError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(self.error.clone())
            } else {
                Ok(self.payload.clone())
            }
        }
    }

    fn sample_batch() -> Batch {
        Batch {
            data: b"%PDF".to_vec(),
            range: "All".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_twice_then_success_makes_three_calls() {
        let backend = FlakyBackend {
            calls: AtomicUsize::new(0),
            failures: 2,
            error: BackendError::RateLimited {
                retry_after_secs: None,
            },
            payload: r#"[{"Invoice_ID": "INV-9"}]"#.to_string(),
        };

        let started = tokio::time::Instant::now();
        let records = extract_batch(&backend, "gemini-2.5-flash", &sample_batch())
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].invoice_id, "INV-9");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        // Backoff schedule: 5 s after attempt 1, 10 s after attempt 2.
        assert_eq!(started.elapsed().as_secs(), 15);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_exhaustion_is_definitive() {
        let backend = FlakyBackend {
            calls: AtomicUsize::new(0),
            failures: 10,
            error: BackendError::RateLimited {
                retry_after_secs: None,
            },
            payload: String::new(),
        };

        let result = extract_batch(&backend, "gemini-2.5-flash", &sample_batch()).await;
        assert!(matches!(
            result,
            Err(BatchError::CallFailed { attempts: 3, .. })
        ));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_rate_limit_failure_makes_exactly_one_call() {
        let backend = FlakyBackend {
            calls: AtomicUsize::new(0),
            failures: 10,
            error: BackendError::Api {
                status: 500,
                detail: "boom".into(),
            },
            payload: String::new(),
        };

        let result = extract_batch(&backend, "gemini-2.5-flash", &sample_batch()).await;
        assert!(matches!(
            result,
            Err(BatchError::CallFailed { attempts: 1, .. })
        ));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_json_is_not_retried() {
        let backend = FlakyBackend {
            calls: AtomicUsize::new(0),
            failures: 0,
            error: BackendError::Transport { detail: "".into() },
            payload: "sorry, I could not find any invoices".to_string(),
        };

        let result = extract_batch(&backend, "gemini-2.5-flash", &sample_batch()).await;
        assert!(matches!(result, Err(BatchError::MalformedResponse { .. })));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn single_object_response_is_wrapped() {
        let backend = FlakyBackend {
            calls: AtomicUsize::new(0),
            failures: 0,
            error: BackendError::Transport { detail: "".into() },
            payload: r#"{"Invoice_ID": "0042", "Seller_Name": "Acme"}"#.to_string(),
        };

        let records = extract_batch(&backend, "gemini-2.5-flash", &sample_batch())
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].invoice_id, "0042");
        assert!(records[0].line_items.is_empty());
    }

    #[tokio::test]
    async fn empty_text_is_an_empty_response() {
        let backend = FlakyBackend {
            calls: AtomicUsize::new(0),
            failures: 0,
            error: BackendError::Transport { detail: "".into() },
            payload: "   ".to_string(),
        };

        let result = extract_batch(&backend, "gemini-2.5-flash", &sample_batch()).await;
        assert!(matches!(result, Err(BatchError::EmptyResponse { .. })));
    }
}
