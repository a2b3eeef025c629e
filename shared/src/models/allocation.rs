//! Batch allocation for outbound stock requests
//!
//! Selection is FIFO by expiry: the batch closest to expiring that can still
//! cover the whole request wins. A request is never split across batches;
//! when no single batch can satisfy the full quantity the allocation fails,
//! even if the sum across batches would suffice. This single-batch behavior
//! is a known limitation of the exit flow, kept deliberately.

use std::cmp::Ordering;

use super::Batch;

/// Order batches ascending by expiration date; batches with no expiration
/// sort last.
pub fn expiry_order(a: &Batch, b: &Batch) -> Ordering {
    match (a.expiration_date, b.expiration_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Select the single batch that satisfies an outbound request.
///
/// Candidates are filtered to allocatable statuses (`available`,
/// `near_expiry`) with remaining quantity, sorted by `expiry_order`, and the
/// first batch whose `quantity_available` covers the full requested quantity
/// is returned. `None` means no single batch can satisfy the request.
pub fn select_batch(candidates: &[Batch], requested_qty: i64) -> Option<&Batch> {
    let mut eligible: Vec<&Batch> = candidates
        .iter()
        .filter(|b| b.status.is_allocatable() && b.quantity_available > 0)
        .collect();
    eligible.sort_by(|a, b| expiry_order(a, b));
    eligible
        .into_iter()
        .find(|b| b.quantity_available >= requested_qty)
}
