use crate::errors::GeoConformalError;

// Validation
pub fn validate_float_parameter(
    value: f64,
    min: f64,
    max: f64,
    parameter: &str,
) -> Result<(), GeoConformalError> {
    if value.is_nan() || value < min || max < value {
        let ex_msg = format!("real value within range {} and {}", min, max);
        Err(GeoConformalError::InvalidParameter(
            parameter.to_string(),
            ex_msg,
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Validate a value lies strictly inside the open unit interval.
/// Used for `alpha` and `split` parameters.
pub fn validate_unit_open_interval(value: f64, parameter: &str) -> Result<(), GeoConformalError> {
    if value.is_nan() || value <= 0.0 || value >= 1.0 {
        Err(GeoConformalError::InvalidParameter(
            parameter.to_string(),
            "real value strictly between 0 and 1".to_string(),
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

/// The `pct`-th percentile of `values` with linear interpolation, `pct` on the
/// 0-100 scale. The rank is clamped to the valid range, so percentiles below 0
/// return the minimum and above 100 the maximum.
///
/// Returns `None` for an empty slice.
pub fn percentile(values: &[f64], pct: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_owned();
    sorted.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = (pct / 100.0) * (sorted.len() - 1) as f64;
    let rank = rank.clamp(0.0, (sorted.len() - 1) as f64);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return Some(sorted[lo]);
    }
    let frac = rank - lo as f64;
    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

/// Calculate if a value is missing.
#[inline]
pub fn is_missing(value: &f64, missing: &f64) -> bool {
    if missing.is_nan() {
        value.is_nan()
    } else {
        value == missing || value.is_nan()
    }
}

/// Replace missing values with `fill`, in place.
pub fn fill_missing(values: &mut [f64], missing: f64, fill: f64) {
    for v in values.iter_mut() {
        if is_missing(v, &missing) {
            *v = fill;
        }
    }
}
