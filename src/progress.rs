//! Progress-callback trait for per-document run events.
//!
//! Inject an [`Arc<dyn RunProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through documents and batches.
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a terminal progress bar, a channel, or a UI — without
//! the library knowing anything about how the host application communicates.
//! Processing is strictly sequential, so events arrive in order, but the
//! trait is `Send + Sync` so implementations can be shared freely.

use std::sync::Arc;

/// Called by the pipeline as it processes each document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Document progress advances regardless of whether the
/// document produced records.
pub trait RunProgressCallback: Send + Sync {
    /// Called once before any document is processed.
    fn on_run_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called when a document's processing begins (after the pacing delay,
    /// before its page count is inspected).
    fn on_document_start(&self, index: usize, total: usize, filename: &str) {
        let _ = (index, total, filename);
    }

    /// Called after each batch's extraction call completes successfully.
    fn on_batch_complete(&self, filename: &str, range: &str, records: usize) {
        let _ = (filename, range, records);
    }

    /// Called when a batch fails definitively (retries exhausted or response
    /// unparseable). The run continues.
    fn on_batch_error(&self, filename: &str, range: &str, error: &str) {
        let _ = (filename, range, error);
    }

    /// Called when a document finishes, whatever the outcome.
    ///
    /// `records` is the number of records this document contributed.
    fn on_document_complete(&self, index: usize, total: usize, filename: &str, records: usize) {
        let _ = (index, total, filename, records);
    }

    /// Called once after all documents have been attempted.
    fn on_run_complete(&self, total_records: usize) {
        let _ = total_records;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopRunProgress;

impl RunProgressCallback for NoopRunProgress {}

/// Convenience alias matching the type stored in
/// [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn RunProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        docs_started: AtomicUsize,
        docs_completed: AtomicUsize,
        batch_errors: AtomicUsize,
        final_records: AtomicUsize,
    }

    impl RunProgressCallback for TrackingCallback {
        fn on_document_start(&self, _index: usize, _total: usize, _filename: &str) {
            self.docs_started.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_complete(
            &self,
            _index: usize,
            _total: usize,
            _filename: &str,
            _records: usize,
        ) {
            self.docs_completed.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_error(&self, _filename: &str, _range: &str, _error: &str) {
            self.batch_errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_run_complete(&self, total_records: usize) {
            self.final_records.store(total_records, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopRunProgress;
        cb.on_run_start(2);
        cb.on_document_start(0, 2, "a.pdf");
        cb.on_batch_complete("a.pdf", "All", 1);
        cb.on_batch_error("a.pdf", "Pages 1-15", "rate limited");
        cb.on_document_complete(0, 2, "a.pdf", 1);
        cb.on_run_complete(1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            docs_started: AtomicUsize::new(0),
            docs_completed: AtomicUsize::new(0),
            batch_errors: AtomicUsize::new(0),
            final_records: AtomicUsize::new(0),
        };

        tracker.on_run_start(2);
        tracker.on_document_start(0, 2, "a.pdf");
        tracker.on_batch_complete("a.pdf", "All", 2);
        tracker.on_document_complete(0, 2, "a.pdf", 2);
        tracker.on_document_start(1, 2, "b.pdf");
        tracker.on_batch_error("b.pdf", "All", "boom");
        tracker.on_document_complete(1, 2, "b.pdf", 0);
        tracker.on_run_complete(2);

        assert_eq!(tracker.docs_started.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.docs_completed.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.batch_errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.final_records.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn RunProgressCallback> = Arc::new(NoopRunProgress);
        cb.on_run_start(1);
        cb.on_document_complete(0, 1, "x.pdf", 0);
    }
}
