// ============================================================
// Layer 4: Split Subsampling
// ============================================================
// Keeps a prefix of a split: the first ceil(ratio × len)
// records. No shuffling, so a given ratio always selects the
// same records and ratio = 1 returns the split untouched.

/// Number of records kept from a split of `total` records.
///
/// A product that lands a hair above an integer is snapped down
/// to it, so 0.3 × 10 (3.0000000000000004 in f64) keeps 3, not
/// 4. A non-empty split always keeps at least one record.
pub fn subsample_size(total: usize, ratio: f64) -> usize {
    if total == 0 {
        return 0;
    }
    let exact = (total as f64) * ratio;
    let up    = exact.ceil();
    let keep  = if up >= 1.0 && exact - (up - 1.0) < 1e-9 * exact.max(1.0) {
        up - 1.0
    } else {
        up
    };
    (keep as usize).clamp(1, total)
}

/// Keep the first `ceil(ratio × len)` records.
pub fn select_prefix<T>(mut records: Vec<T>, ratio: f64) -> Vec<T> {
    let total = records.len();
    let keep  = subsample_size(total, ratio);
    records.truncate(keep);

    tracing::debug!("Subsampled {} of {} records (ratio {})", keep, total, ratio);
    records
}
