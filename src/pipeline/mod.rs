//! Pipeline stages for invoice extraction.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different model backend) without touching
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! documents ──▶ segment ──▶ extract ──▶ aggregate ──▶ report
//! (PDF bytes)   (batches)   (model+retry) (merge+tag)  (xlsx)
//! ```
//!
//! 1. [`segment`]   — split oversized PDFs into page batches (lopdf)
//! 2. [`backend`]   — the model-API seam; HTTP status classified into an
//!    explicit retryability taxonomy at this boundary
//! 3. [`extract`]   — drive one batch through the backend with retry/backoff;
//!    the only stage with network I/O
//! 4. [`aggregate`] — sequential run driver: order, pacing, filename
//!    stamping, partial-failure accounting
//! 5. [`report`]    — pure row layout + styled master-detail workbook

pub mod aggregate;
pub mod backend;
pub mod extract;
pub mod report;
pub mod segment;
