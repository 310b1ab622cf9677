//! Element-wise error measures and tolerance tests shared by the comparators.
//!
//! Every measure here is NaN-free: a pair that is not literally equal always
//! produces a strictly positive error, so "nonzero absolute error" and
//! "elements that differ" describe the same set of cells.

/// `|a - b|`, with `0` for equal values (including equal infinities) and
/// `inf` whenever the difference is not a number.
pub fn absolute_error(lhs: f64, rhs: f64) -> f64 {
    if lhs == rhs {
        return 0.0;
    }

    let diff = (lhs - rhs).abs();
    if diff.is_nan() { f64::INFINITY } else { diff }
}

/// `|a - b| / |a + b|`. Equal values give `0`; a vanishing or non-finite
/// denominator for unequal values gives `inf`.
pub fn relative_error(lhs: f64, rhs: f64) -> f64 {
    let abs_diff = absolute_error(lhs, rhs);
    if abs_diff == 0.0 {
        return 0.0;
    }

    let scale = (lhs + rhs).abs();
    if !abs_diff.is_finite() || scale == 0.0 || !scale.is_finite() {
        return f64::INFINITY;
    }

    abs_diff / scale
}

/// One-directional closeness: `|a - b| <= atol + rtol * |b|`.
///
/// Equal infinities are close; NaN is never close to anything.
pub fn is_close(lhs: f64, rhs: f64, rtol: f64, atol: f64) -> bool {
    if lhs == rhs {
        return true;
    }

    if !lhs.is_finite() || !rhs.is_finite() {
        return false;
    }

    (lhs - rhs).abs() <= atol + rtol * rhs.abs()
}

/// Closeness that must hold with either value taken as the reference.
pub fn is_close_symmetric(lhs: f64, rhs: f64, rtol: f64, atol: f64) -> bool {
    is_close(lhs, rhs, rtol, atol) && is_close(rhs, lhs, rtol, atol)
}

pub fn max_value<'a>(values: impl IntoIterator<Item = &'a f64>) -> f64 {
    values.into_iter().copied().fold(0.0_f64, f64::max)
}

/// Scientific notation with a signed, at least two-digit exponent
/// (`1.00E-08`), right-aligned to `width`.
pub fn format_scientific(value: f64, width: usize, precision: usize) -> String {
    let rendered = if value.is_nan() {
        "NAN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "INF" } else { "-INF" }.to_string()
    } else {
        let raw = format!("{value:.precision$E}");
        match raw.split_once('E') {
            Some((mantissa, exponent)) => {
                let exponent: i32 = exponent.parse().unwrap_or(0);
                let sign = if exponent < 0 { '-' } else { '+' };
                format!("{mantissa}E{sign}{:02}", exponent.unsigned_abs())
            }
            None => raw,
        }
    };

    format!("{rendered:>width$}")
}
