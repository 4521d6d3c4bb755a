/// Generate a random `f64` in the range `[low, high)`.
#[inline]
pub(crate) fn f64_range(rng: &mut fastrand::Rng, low: f64, high: f64) -> f64 {
    low + rng.f64() * (high - low)
}

/// Clamp `value` into `[low, high)`, collapsing to `low` when `low == high`.
///
/// Rounding in `f64_range` or a log/exp round trip can land exactly on `high`.
#[inline]
pub(crate) fn below(value: f64, low: f64, high: f64) -> f64 {
    value.clamp(low, high.next_down().max(low))
}
