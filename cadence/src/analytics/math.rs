/// Arithmetic mean, 0.0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }

    // Welford's online algorithm for numerically stable variance calculation
    let mut mean = 0.0;
    let mut m2 = 0.0;

    for (i, &value) in values.iter().enumerate() {
        let delta = value - mean;
        mean += delta / (i + 1) as f64;
        let delta2 = value - mean;
        m2 += delta * delta2;
    }

    (m2 / values.len() as f64).sqrt()
}

/// Standard deviation divided by the mean.
///
/// Returns 0.0 instead of NaN/infinity when the mean is zero or the slice is empty.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let mean = mean(values);
    if mean == 0.0 {
        return 0.0;
    }

    let cv = std_dev(values) / mean;
    if cv.is_finite() { cv } else { 0.0 }
}
