//! Record aggregation: drive segmentation and extraction across all
//! uploaded documents into one ordered record list.
//!
//! Processing is strictly sequential — one document, one batch, one model
//! call at a time. That is a deliberate throughput/rate-limit tradeoff:
//! concurrent calls would multiply 429 risk with no token budget to absorb
//! it. Sequencing also makes output order trivially deterministic: document
//! upload order, then batch order within a document, then model-returned
//! order within a batch.
//!
//! Per-document and per-batch failures are swallowed here, logged, and
//! counted in the summary. Partial success is the steady state for a
//! multi-document batch job; only credential/setup failures (handled before
//! this module runs) are fatal.

use crate::config::{
    ExtractionConfig, DOCUMENT_PACING, PAGES_PER_BATCH, SEGMENTATION_THRESHOLD,
};
use crate::error::InvoiceError;
use crate::output::{RunOutput, RunSummary};
use crate::record::{InvoiceRecord, SourceDocument};
use super::backend::{GeminiClient, GenerativeBackend};
use super::{extract, segment};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{info, warn};

/// Run the full extraction pipeline over `documents`.
///
/// This is the primary library entry point: resolves the backend from the
/// config (pre-built backend → explicit key → `GEMINI_API_KEY`), then
/// processes every document. Returns `Ok` even when every batch failed —
/// check [`RunOutput::has_records`]. Only credential problems are `Err`.
pub async fn extract_invoices(
    documents: &[SourceDocument],
    config: &ExtractionConfig,
) -> Result<RunOutput, InvoiceError> {
    let backend = resolve_backend(config)?;
    process_documents(backend.as_ref(), config, documents).await
}

/// Resolve the generative backend, from most-specific to least-specific:
///
/// 1. **Pre-built backend** (`config.backend`) — the caller constructed it
///    entirely; used as-is. The seam tests and custom middleware hook into.
/// 2. **Explicit key** (`config.api_key`).
/// 3. **Environment** — `GEMINI_API_KEY`.
///
/// No key anywhere is a fatal [`InvoiceError::MissingApiKey`]; the pipeline
/// never starts.
pub fn resolve_backend(
    config: &ExtractionConfig,
) -> Result<Arc<dyn GenerativeBackend>, InvoiceError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    if let Some(ref key) = config.api_key {
        return Ok(Arc::new(GeminiClient::new(key.clone())?));
    }

    match std::env::var("GEMINI_API_KEY") {
        Ok(key) if !key.trim().is_empty() => Ok(Arc::new(GeminiClient::new(key)?)),
        _ => Err(InvoiceError::MissingApiKey),
    }
}

/// Process every document through segmentation and extraction, in order.
///
/// Per-batch and per-document failures are swallowed and counted; the only
/// `Err` is a rejected credential, which no amount of continuing can fix.
pub async fn process_documents(
    backend: &dyn GenerativeBackend,
    config: &ExtractionConfig,
    documents: &[SourceDocument],
) -> Result<RunOutput, InvoiceError> {
    let started = Instant::now();
    let total = documents.len();
    let model = config.model.as_str();
    let progress = config.progress_callback.as_deref();

    info!("Starting extraction run: {total} document(s), model {model}");
    if let Some(cb) = progress {
        cb.on_run_start(total);
    }

    let mut records: Vec<InvoiceRecord> = Vec::new();
    let mut summary = RunSummary {
        documents_total: total,
        ..Default::default()
    };

    for (index, document) in documents.iter().enumerate() {
        // Pacing between documents, not between batches of one document.
        if index > 0 {
            sleep(DOCUMENT_PACING).await;
        }

        if let Some(cb) = progress {
            cb.on_document_start(index, total, &document.filename);
        }

        let batches = match segment::page_count(&document.data) {
            Some(pages) if pages > 0 => {
                if pages > SEGMENTATION_THRESHOLD {
                    info!(
                        "Splitting large document '{}' ({pages} pages)",
                        document.filename
                    );
                    segment::split_into_batches(&document.data, PAGES_PER_BATCH)
                } else {
                    vec![segment::whole_document_batch(&document.data)]
                }
            }
            _ => Vec::new(),
        };

        if batches.is_empty() {
            warn!(
                "Document '{}' produced no extractable batches; skipping",
                document.filename
            );
            summary.documents_failed += 1;
            if let Some(cb) = progress {
                cb.on_document_complete(index, total, &document.filename, 0);
            }
            continue;
        }

        let mut document_records = 0;
        for batch in &batches {
            summary.batches_total += 1;
            match extract::extract_batch(backend, model, batch).await {
                Ok(batch_records) => {
                    document_records += batch_records.len();
                    if let Some(cb) = progress {
                        cb.on_batch_complete(
                            &document.filename,
                            &batch.range,
                            batch_records.len(),
                        );
                    }
                    records.extend(batch_records.into_iter().map(|mut record| {
                        record.filename = document.filename.clone();
                        record
                    }));
                }
                Err(crate::error::BatchError::AuthRejected { detail, .. }) => {
                    return Err(InvoiceError::InvalidApiKey { detail });
                }
                Err(e) => {
                    warn!("{e}");
                    summary.batches_failed += 1;
                    if let Some(cb) = progress {
                        cb.on_batch_error(&document.filename, &batch.range, &e.to_string());
                    }
                }
            }
        }

        if let Some(cb) = progress {
            cb.on_document_complete(index, total, &document.filename, document_records);
        }
    }

    summary.records_extracted = records.len();
    summary.duration_ms = started.elapsed().as_millis() as u64;
    info!(
        "Run complete: {}/{} document(s) readable, {} record(s) in {}ms",
        summary.documents_total - summary.documents_failed,
        summary.documents_total,
        summary.records_extracted,
        summary.duration_ms
    );
    if let Some(cb) = progress {
        cb.on_run_complete(records.len());
    }

    Ok(RunOutput { records, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use async_trait::async_trait;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Minimal valid PDF with `pages` blank pages, built in memory.
    fn tiny_pdf(pages: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids: Vec<Object> = Vec::with_capacity(pages);
        for _ in 0..pages {
            let content = Content {
                operations: vec![Operation::new("BT", vec![]), Operation::new("ET", vec![])],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    /// Backend returning a fixed payload for every call.
    struct FixedBackend {
        calls: AtomicUsize,
        payload: String,
    }

    impl FixedBackend {
        fn returning(payload: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                payload: payload.to_string(),
            }
        }
    }

    #[async_trait]
    impl GenerativeBackend for FixedBackend {
        async fn extract_json(
            &self,
            _model: &str,
            _pdf_bytes: &[u8],
            _prompt: &str,
        ) -> Result<String, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.payload.clone())
        }
    }

    fn config() -> ExtractionConfig {
        ExtractionConfig::default()
    }

    #[tokio::test]
    async fn filenames_are_stamped_per_document() {
        let backend = FixedBackend::returning(r#"[{"Invoice_ID": "1"}]"#);
        let documents = vec![
            SourceDocument::new("march.pdf", tiny_pdf(2)),
            SourceDocument::new("april.pdf", tiny_pdf(3)),
        ];

        let output = process_documents(&backend, &config(), &documents).await.unwrap();

        assert_eq!(output.records.len(), 2);
        assert_eq!(output.records[0].filename, "march.pdf");
        assert_eq!(output.records[1].filename, "april.pdf");
        assert_eq!(output.summary.batches_total, 2);
        assert_eq!(output.summary.batches_failed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_sleeps_once_between_two_documents() {
        let backend = FixedBackend::returning(r#"[{"Invoice_ID": "1"}]"#);
        let documents = vec![
            SourceDocument::new("a.pdf", tiny_pdf(1)),
            SourceDocument::new("b.pdf", tiny_pdf(1)),
        ];

        let started = tokio::time::Instant::now();
        let output = process_documents(&backend, &config(), &documents).await.unwrap();

        assert_eq!(output.records.len(), 2);
        assert_eq!(started.elapsed().as_secs(), 1);
    }

    #[tokio::test]
    async fn unreadable_document_is_skipped_not_fatal() {
        let backend = FixedBackend::returning(r#"[{"Invoice_ID": "1"}]"#);
        let documents = vec![
            SourceDocument::new("broken.pdf", b"not a pdf".to_vec()),
            SourceDocument::new("ok.pdf", tiny_pdf(1)),
        ];

        let output = process_documents(&backend, &config(), &documents).await.unwrap();

        assert_eq!(output.summary.documents_failed, 1);
        assert_eq!(output.records.len(), 1);
        assert_eq!(output.records[0].filename, "ok.pdf");
        // The broken document never reached the backend.
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn large_document_is_segmented() {
        let backend = FixedBackend::returning(r#"[{"Invoice_ID": "1"}]"#);
        let documents = vec![SourceDocument::new("big.pdf", tiny_pdf(32))];

        let output = process_documents(&backend, &config(), &documents).await.unwrap();

        // 32 pages → 3 batches → 3 calls → 3 records.
        assert_eq!(output.summary.batches_total, 3);
        assert_eq!(output.records.len(), 3);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn threshold_document_goes_whole() {
        let backend = FixedBackend::returning(r#"[{"Invoice_ID": "1"}]"#);
        let documents = vec![SourceDocument::new("exact.pdf", tiny_pdf(20))];

        let output = process_documents(&backend, &config(), &documents).await.unwrap();

        assert_eq!(output.summary.batches_total, 1);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_credential_is_fatal() {
        struct AuthFailing;

        #[async_trait]
        impl GenerativeBackend for AuthFailing {
            async fn extract_json(
                &self,
                _model: &str,
                _pdf_bytes: &[u8],
                _prompt: &str,
            ) -> Result<String, BackendError> {
                Err(BackendError::Auth {
                    detail: "API key not valid".into(),
                })
            }
        }

        let documents = vec![SourceDocument::new("a.pdf", tiny_pdf(1))];
        let result = process_documents(&AuthFailing, &config(), &documents).await;
        assert!(matches!(result, Err(InvoiceError::InvalidApiKey { .. })));
    }

    #[test]
    fn resolve_backend_prefers_prebuilt() {
        let prebuilt: Arc<dyn GenerativeBackend> =
            Arc::new(FixedBackend::returning("[]"));
        let config = ExtractionConfig::builder()
            .backend(Arc::clone(&prebuilt))
            .build()
            .unwrap();
        assert!(resolve_backend(&config).is_ok());
    }
}
