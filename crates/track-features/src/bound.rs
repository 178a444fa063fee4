//! Payload bounding: every list that grows with track length is capped by
//! even index sampling before a record leaves the pipeline.

use crate::config::CapsConfig;
use crate::record::FeatureRecord;

/// Select `k` of `items` at indices `round(i * (n - 1) / (k - 1))`.
///
/// Returns the input unchanged when it already fits. Indices are computed in
/// integer arithmetic (round half up), so the selection is exact and strictly
/// increasing whenever `n > k`.
pub fn evenly_sample<T: Clone>(items: &[T], k: usize) -> Vec<T> {
    let n = items.len();
    if n <= k {
        return items.to_vec();
    }
    match k {
        0 => Vec::new(),
        1 => vec![items[0].clone()],
        _ => {
            let num = n - 1;
            let den = k - 1;
            (0..k).map(|i| items[(2 * i * num + den) / (2 * den)].clone()).collect()
        }
    }
}

/// Merge contiguous spans down to at most `k` by keeping an even sample of
/// the interior boundaries.
///
/// The outer edges never move and every kept span ends where the next one
/// starts, so coverage and contiguity survive the cap. `k == 0` is treated
/// as 1.
pub fn cap_spans(spans: &[(f32, f32)], k: usize) -> Vec<(f32, f32)> {
    let (Some(first), Some(last)) = (spans.first(), spans.last()) else {
        return Vec::new();
    };
    if spans.len() <= k {
        return spans.to_vec();
    }
    let interior: Vec<f32> = spans[1..].iter().map(|&(start, _)| start).collect();
    let kept = evenly_sample(&interior, k.max(1) - 1);

    let mut out = Vec::with_capacity(kept.len() + 1);
    let mut start = first.0;
    for b in kept {
        out.push((start, b));
        start = b;
    }
    out.push((start, last.1));
    out
}

/// Apply every configured cap to an assembled record.
///
/// Structure segments are capped at the span level by the structure stage
/// (see [`cap_spans`]) and pass through unchanged here.
pub fn bound_record(mut record: FeatureRecord, caps: &CapsConfig) -> FeatureRecord {
    record.energy_profile = evenly_sample(&record.energy_profile, caps.energy_profile);
    record.transients = evenly_sample(&record.transients, caps.transients);
    record.drop_timestamps = evenly_sample(&record.drop_timestamps, caps.drops);
    record.silence_segments = evenly_sample(&record.silence_segments, caps.silence);
    record.vocal_segments = evenly_sample(&record.vocal_segments, caps.vocal);
    record.fx_events = evenly_sample(&record.fx_events, caps.fx);
    record
}
