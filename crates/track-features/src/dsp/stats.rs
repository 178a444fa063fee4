/// Linear-interpolated percentile (`pct` in `[0, 100]`), `None` for an empty series.
///
/// Every adaptive threshold in the pipeline goes through this function once per
/// invocation, so tests can substitute a fixed value instead.
pub fn percentile(series: &[f32], pct: f32) -> Option<f32> {
    if series.is_empty() {
        return None;
    }
    let mut sorted = series.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (pct.clamp(0.0, 100.0) as f64 / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    let value = sorted[lo] as f64 + (sorted[hi] as f64 - sorted[lo] as f64) * frac;
    Some(value as f32)
}

pub fn mean(series: &[f32]) -> Option<f32> {
    if series.is_empty() {
        return None;
    }
    let sum: f64 = series.iter().map(|&v| v as f64).sum();
    Some((sum / series.len() as f64) as f32)
}

/// Least-squares slope of `series` against its index.
pub fn slope(series: &[f32]) -> f32 {
    let n = series.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = series.iter().map(|&v| v as f64).sum::<f64>() / n as f64;
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in series.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y as f64 - y_mean);
        den += dx * dx;
    }
    (num / den) as f32
}
