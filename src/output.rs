//! Run output types: the aggregated record list plus run accounting.

use crate::record::InvoiceRecord;
use serde::{Deserialize, Serialize};

/// Result of one extraction run, even a partially-failed one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    /// All extracted records, in (document, batch, model) order.
    pub records: Vec<InvoiceRecord>,
    /// Counters for the run.
    pub summary: RunSummary,
}

impl RunOutput {
    /// Whether the run produced anything to report on.
    pub fn has_records(&self) -> bool {
        !self.records.is_empty()
    }
}

/// Accounting for one extraction run.
///
/// `documents_failed` counts documents that yielded zero extractable batches
/// (unreadable/corrupt PDFs); `batches_failed` counts batches whose model
/// call or response parse failed. Neither aborts the run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub documents_total: usize,
    pub documents_failed: usize,
    pub batches_total: usize,
    pub batches_failed: usize,
    pub records_extracted: usize,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_run_has_no_records() {
        let output = RunOutput {
            records: vec![],
            summary: RunSummary::default(),
        };
        assert!(!output.has_records());
    }

    #[test]
    fn summary_serializes() {
        let summary = RunSummary {
            documents_total: 3,
            documents_failed: 1,
            batches_total: 5,
            batches_failed: 2,
            records_extracted: 4,
            duration_ms: 1234,
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"documents_total\":3"));
    }
}
