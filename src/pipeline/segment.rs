//! Document segmentation: split an oversized PDF into page batches.
//!
//! The model backend accepts whole PDF files, but large documents blow its
//! input limits, so anything over [`crate::config::SEGMENTATION_THRESHOLD`]
//! pages is cut into consecutive [`crate::config::PAGES_PER_BATCH`]-page
//! slices. Each slice is a standalone PDF built by cloning the source
//! document, deleting the out-of-range pages, and pruning what's left.
//!
//! Failure policy: a PDF that cannot be parsed yields zero batches, never an
//! error. One unreadable upload must not abort the run for the others.

use crate::record::Batch;
use lopdf::Document;
use tracing::{debug, warn};

/// Number of pages in the document, or `None` if the bytes are not a
/// readable PDF.
pub fn page_count(bytes: &[u8]) -> Option<usize> {
    match Document::load_mem(bytes) {
        Ok(doc) => Some(doc.get_pages().len()),
        Err(e) => {
            warn!("Unreadable PDF ({e}); treating as zero pages");
            None
        }
    }
}

/// A single batch covering the whole document, labeled `"All"`.
pub fn whole_document_batch(bytes: &[u8]) -> Batch {
    Batch {
        data: bytes.to_vec(),
        range: "All".to_string(),
    }
}

/// Split a PDF into consecutive batches of at most `batch_size` pages,
/// covering all pages with no gaps or overlaps.
///
/// Labels are 1-indexed inclusive ranges (`"Pages 1-15"`). An unreadable PDF
/// yields an empty vector; the caller treats that as "zero extractable
/// batches" and moves on.
pub fn split_into_batches(bytes: &[u8], batch_size: usize) -> Vec<Batch> {
    let source = match Document::load_mem(bytes) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Cannot split unreadable PDF ({e}); skipping");
            return Vec::new();
        }
    };

    let total_pages = source.get_pages().len();
    if total_pages == 0 {
        return Vec::new();
    }

    let mut batches = Vec::with_capacity(total_pages.div_ceil(batch_size));
    for (start, end) in plan_ranges(total_pages, batch_size) {
        match slice_pages(&source, start, end) {
            Ok(data) => {
                debug!("Built batch Pages {start}-{end} ({} bytes)", data.len());
                batches.push(Batch {
                    data,
                    range: format!("Pages {start}-{end}"),
                });
            }
            Err(e) => {
                // A slice that fails to serialise loses only its own pages.
                warn!("Failed to build batch Pages {start}-{end}: {e}");
            }
        }
    }
    batches
}

/// Plan the 1-indexed inclusive page ranges for a document of `total_pages`.
///
/// Pure arithmetic, exposed for direct testing: `ceil(total/batch_size)`
/// ranges, consecutive, non-overlapping, covering `1..=total_pages`.
pub fn plan_ranges(total_pages: usize, batch_size: usize) -> Vec<(usize, usize)> {
    let batch_size = batch_size.max(1);
    let mut ranges = Vec::new();
    let mut start = 1;
    while start <= total_pages {
        let end = (start + batch_size - 1).min(total_pages);
        ranges.push((start, end));
        start = end + 1;
    }
    ranges
}

/// Build a standalone PDF containing pages `start..=end` (1-indexed) of the
/// source document.
fn slice_pages(source: &Document, start: usize, end: usize) -> Result<Vec<u8>, lopdf::Error> {
    let mut doc = source.clone();

    let discard: Vec<u32> = doc
        .get_pages()
        .keys()
        .copied()
        .filter(|&page| (page as usize) < start || (page as usize) > end)
        .collect();
    doc.delete_pages(&discard);

    // Deleted pages leave orphaned objects behind; drop them before saving.
    doc.prune_objects();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;
    Ok(buffer)
}
