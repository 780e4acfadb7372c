//! Derived-metric arithmetic. Every division by an empty denominator yields 0.

/// Round to two decimal places
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `part / whole * 100`, 0 when `whole` is 0
#[must_use]
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(part as f64 / whole as f64 * 100.0)
}

/// Same as [`percentage`] for amounts
#[must_use]
pub fn percentage_f64(part: f64, whole: f64) -> f64 {
    if whole.abs() < f64::EPSILON || !whole.is_finite() {
        return 0.0;
    }
    round2(part / whole * 100.0)
}

/// Change from `previous` to `current` in percent, 0 when `previous` is 0
#[must_use]
pub fn growth(current: f64, previous: f64) -> f64 {
    if previous.abs() < f64::EPSILON || !previous.is_finite() {
        return 0.0;
    }
    round2((current - previous) / previous * 100.0)
}

/// `total / count`, 0 when `count` is 0
#[must_use]
pub fn average(total: f64, count: u64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    round2(total / count as f64)
}
