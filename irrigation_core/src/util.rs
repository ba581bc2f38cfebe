//! Time and volume helpers for irrigation_core.

/// Number of milliseconds in one minute.
pub const MILLIS_PER_MIN: u64 = 60_000;

/// Convert an interval in milliseconds to fractional minutes.
#[inline]
pub fn ms_to_minutes(ms: u64) -> f32 {
    // f64 keeps precision for long intervals before narrowing
    (ms as f64 / MILLIS_PER_MIN as f64) as f32
}

/// Volume (liters) delivered at `rate_l_min` over `ms`.
#[inline]
pub fn volume_at_rate(rate_l_min: f32, ms: u64) -> f32 {
    rate_l_min * ms_to_minutes(ms)
}
