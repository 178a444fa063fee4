use crate::config::PeakPickConfig;

/// Local-maximum peak picking over an onset/novelty series.
///
/// Frame `n` is accepted when `x[n]` is the maximum of `x[n-pre_max ..= n+post_max]`,
/// `x[n] >= mean(x[n-pre_avg ..= n+post_avg]) + delta`, and more than `wait`
/// frames have passed since the last accepted peak. Windows are clipped at the
/// series edges. Returned indices are strictly increasing.
pub fn peak_pick(x: &[f32], cfg: &PeakPickConfig, delta: f32) -> Vec<usize> {
    let len = x.len();
    let mut peaks = Vec::new();
    let mut last: Option<usize> = None;

    for n in 0..len {
        let max_lo = n.saturating_sub(cfg.pre_max);
        let max_hi = n.saturating_add(cfg.post_max).saturating_add(1).min(len);
        let local_max = x[max_lo..max_hi].iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if x[n] != local_max {
            continue;
        }

        let avg_lo = n.saturating_sub(cfg.pre_avg);
        let avg_hi = n.saturating_add(cfg.post_avg).saturating_add(1).min(len);
        let window = &x[avg_lo..avg_hi];
        let local_avg = window.iter().map(|&v| v as f64).sum::<f64>() / window.len() as f64;
        if (x[n] as f64) < local_avg + delta as f64 {
            continue;
        }

        if last.map_or(true, |prev| n > prev.saturating_add(cfg.wait)) {
            peaks.push(n);
            last = Some(n);
        }
    }
    peaks
}
