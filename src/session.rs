//! Session-scoped storage for the last successful run.
//!
//! The record list survives across UI interactions (re-rendering the report,
//! showing the summary view) until the next successful run replaces it or the
//! session ends. It is an explicit owned value handed to whoever needs it —
//! deliberately not a global: the host decides the session boundary.

use crate::record::InvoiceRecord;

/// Holds the record list of the most recent successful run.
///
/// Lifecycle: initialized empty at session start, replaced wholesale by each
/// successful run, cleared when the session ends. Records are never mutated
/// in place once stored.
#[derive(Debug, Default)]
pub struct SessionStore {
    records: Option<Vec<InvoiceRecord>>,
}

impl SessionStore {
    /// An empty store for a fresh session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored run wholesale.
    pub fn replace(&mut self, records: Vec<InvoiceRecord>) {
        self.records = Some(records);
    }

    /// The stored records, if a run has completed this session.
    pub fn records(&self) -> Option<&[InvoiceRecord]> {
        self.records.as_deref()
    }

    /// Take ownership of the stored records, leaving the store empty.
    pub fn take(&mut self) -> Option<Vec<InvoiceRecord>> {
        self.records.take()
    }

    /// Drop the stored run.
    pub fn clear(&mut self) {
        self.records = None;
    }

    /// Whether a run is stored.
    pub fn is_populated(&self) -> bool {
        self.records.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> InvoiceRecord {
        InvoiceRecord {
            invoice_id: id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn starts_empty() {
        let store = SessionStore::new();
        assert!(!store.is_populated());
        assert!(store.records().is_none());
    }

    #[test]
    fn replace_is_wholesale() {
        let mut store = SessionStore::new();
        store.replace(vec![record("A"), record("B")]);
        assert_eq!(store.records().unwrap().len(), 2);

        store.replace(vec![record("C")]);
        let records = store.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].invoice_id, "C");
    }

    #[test]
    fn clear_empties_the_store() {
        let mut store = SessionStore::new();
        store.replace(vec![record("A")]);
        store.clear();
        assert!(!store.is_populated());
    }

    #[test]
    fn take_moves_records_out() {
        let mut store = SessionStore::new();
        store.replace(vec![record("A")]);
        let taken = store.take().unwrap();
        assert_eq!(taken[0].invoice_id, "A");
        assert!(!store.is_populated());
    }
}
