//! Checked numeric conversions for bin indices and progress fractions

/// Quantize a normalized value into one of `bins` buckets.
///
/// Values outside `[0, 1)` land in the first or last bin; non-finite values
/// land in bin 0. A zero-sized grid always yields 0.
#[must_use]
#[allow(clippy::cast_precision_loss)] // Bin counts are tiny
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Clamped before truncation
pub fn normalized_to_bin(value: f32, bins: usize) -> usize {
    if bins <= 1 || !value.is_finite() {
        return 0;
    }
    let scaled = (value * bins as f32).floor();
    if scaled <= 0.0 {
        0
    } else {
        (scaled as usize).min(bins - 1)
    }
}

/// `count / total` as an `f32` fraction clamped to `[0, 1]`
#[must_use]
#[allow(clippy::cast_precision_loss)] // Frame and bin counts are well within f32 precision
pub fn fraction(count: usize, total: usize) -> f32 {
    if total == 0 {
        return 0.0;
    }
    (count as f32 / total as f32).min(1.0)
}
