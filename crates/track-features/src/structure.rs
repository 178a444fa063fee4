//! Novelty-based section boundaries with coarse energy labels.

use tracing::debug;

use crate::bound::cap_spans;
use crate::config::StructureConfig;
use crate::dsp::{peak_pick, percentile, search_sorted, Spectrogram};
use crate::error::{AnalysisError, AnalysisResult};
use crate::record::{SectionLabel, StructureSegment};

/// Spectral flux: positive frame-to-frame rise of the power spectrum, summed
/// over bins. Frame 0 is zero so the curve aligns with the frame grid.
pub fn novelty_curve(spec: &Spectrogram) -> Vec<f32> {
    let mut curve = Vec::with_capacity(spec.n_frames());
    let mut prev: Option<&[f32]> = None;
    for frame in spec.frames() {
        let flux = match prev {
            Some(p) => frame
                .iter()
                .zip(p)
                .map(|(&m, &q)| ((m as f64).powi(2) - (q as f64).powi(2)).max(0.0))
                .sum::<f64>() as f32,
            None => 0.0,
        };
        curve.push(flux);
        prev = Some(frame);
    }
    curve
}

/// Spans between accepted boundaries.
///
/// Candidates are `0`, every novelty peak time and `duration`. A candidate is
/// accepted only when it lies at least `min_seg` after the previous accepted
/// one; a short trailing span extends the last segment, so the result always
/// covers `[0, duration]`.
pub fn boundary_spans(curve: &[f32], times: &[f32], duration: f32, cfg: &StructureConfig) -> AnalysisResult<Vec<(f32, f32)>> {
    let threshold = percentile(curve, cfg.novelty_percentile).ok_or(AnalysisError::EmptySeries("structure"))?;
    let max = curve.iter().copied().fold(0.0f32, f32::max);
    let delta = threshold.max(cfg.novelty_floor_ratio * max).max(cfg.peaks.delta);

    let peaks: Vec<usize> = peak_pick(curve, &cfg.peaks, delta).into_iter().filter(|&i| curve[i] > 0.0).collect();

    let mut spans = Vec::new();
    let mut last = 0.0f32;
    for b in peaks.iter().map(|&i| times[i]).chain(std::iter::once(duration)) {
        if b - last >= cfg.min_seg {
            spans.push((last, b));
            last = b;
        }
    }
    if last < duration {
        match spans.last_mut() {
            Some(span) => span.1 = duration,
            None => spans.push((0.0, duration)),
        }
    }
    debug!(peaks = peaks.len(), delta, segments = spans.len(), "structure boundaries");
    Ok(spans)
}

/// Mean novelty over each span, labeled against the low and high percentiles of the curve.
pub fn label_spans(spans: &[(f32, f32)], curve: &[f32], times: &[f32], cfg: &StructureConfig) -> AnalysisResult<Vec<StructureSegment>> {
    let low = percentile(curve, cfg.breakdown_percentile).ok_or(AnalysisError::EmptySeries("structure"))?;
    let high = percentile(curve, cfg.build_percentile).ok_or(AnalysisError::EmptySeries("structure"))?;

    spans
        .iter()
        .map(|&(start, end)| {
            let i0 = search_sorted(times, start).min(curve.len() - 1);
            let i1 = search_sorted(times, end).max(i0 + 1);
            let window = &curve[i0..i1];
            let energy = (window.iter().map(|&v| v as f64).sum::<f64>() / window.len() as f64) as f32;
            if !energy.is_finite() {
                return Err(AnalysisError::NonFinite("structure"));
            }
            let label = if energy <= low {
                SectionLabel::Breakdown
            } else if energy >= high {
                SectionLabel::Build
            } else {
                SectionLabel::Section
            };
            Ok(StructureSegment { start, end, label, energy })
        })
        .collect()
}

/// Boundaries, capped to `max_segments` spans, then labeled.
pub fn segment(
    spec: &Spectrogram,
    duration: f32,
    cfg: &StructureConfig,
    max_segments: usize,
) -> AnalysisResult<Vec<StructureSegment>> {
    let curve = novelty_curve(spec);
    let times = spec.times();
    let spans = cap_spans(&boundary_spans(&curve, &times, duration, cfg)?, max_segments);
    label_spans(&spans, &curve, &times, cfg)
}
