//! Transition heuristics evaluated around each structural boundary.
//!
//! A boundary can emit several events at once; every rule is checked
//! independently.

use tracing::debug;

use crate::config::FxConfig;
use crate::dsp::{mean, percentile, search_sorted, slope};
use crate::error::{AnalysisError, AnalysisResult};
use crate::record::{FxEvent, FxKind, StructureSegment};
use crate::spectral::SpectralSeries;

/// Whole-track reference levels the windowed rules compare against.
#[derive(Clone, Copy, Debug)]
struct TrackLevels {
    zcr: f32,
    centroid: f32,
}

fn events_at(
    t: f32,
    centroid: &[f32],
    bandwidth: &[f32],
    zcr: &[f32],
    track: TrackLevels,
    cfg: &FxConfig,
) -> Vec<FxEvent> {
    let mut events = Vec::new();
    let mut emit = |kind, confidence| events.push(FxEvent { t, kind, confidence });

    if centroid.len() > 2 && slope(centroid) > 0.0 && slope(bandwidth) > 0.0 {
        emit(FxKind::Riser, cfg.riser_confidence);
    }
    if percentile(zcr, cfg.glitch_window_percentile).is_some_and(|z| z > track.zcr) {
        emit(FxKind::Glitch, cfg.glitch_confidence);
    }
    if centroid.len() > 6 {
        let (left, right) = centroid.split_at(centroid.len() / 2);
        if let (Some(l), Some(r)) = (mean(left), mean(right)) {
            if l > r * cfg.reverse_ratio {
                emit(FxKind::Reverse, cfg.reverse_confidence);
            }
        }
    }
    let tail = &centroid[centroid.len().saturating_sub(cfg.sweep_tail_frames)..];
    if mean(tail).is_some_and(|c| c > track.centroid) {
        emit(FxKind::Sweep, cfg.sweep_confidence);
    }
    events
}

/// Events for every segment end, filtered to `min_confidence`, in boundary order.
pub fn detect(series: &SpectralSeries, times: &[f32], segments: &[StructureSegment], cfg: &FxConfig) -> AnalysisResult<Vec<FxEvent>> {
    let n = times.len().min(series.centroid.len()).min(series.bandwidth.len()).min(series.zcr.len());
    if n == 0 {
        return Err(AnalysisError::EmptySeries("fx"));
    }
    let track = TrackLevels {
        zcr: percentile(&series.zcr[..n], cfg.glitch_track_percentile).ok_or(AnalysisError::EmptySeries("fx"))?,
        centroid: percentile(&series.centroid[..n], cfg.sweep_percentile).ok_or(AnalysisError::EmptySeries("fx"))?,
    };
    let times = &times[..n];
    let last_time = times[n - 1];

    let mut events = Vec::new();
    let mut skipped = 0usize;
    for t in segments.iter().map(|s| s.end) {
        let i0 = search_sorted(times, (t - cfg.pre_sec).max(0.0));
        let i1 = search_sorted(times, last_time.min(t + cfg.post_sec));
        if i1 < i0.saturating_add(cfg.min_frames) {
            skipped += 1;
            continue;
        }
        events.extend(events_at(
            t,
            &series.centroid[i0..i1],
            &series.bandwidth[i0..i1],
            &series.zcr[i0..i1],
            track,
            cfg,
        ));
    }

    let found = events.len();
    events.retain(|e| e.confidence >= cfg.min_confidence);
    debug!(boundaries = segments.len(), skipped, found, kept = events.len(), "fx detection");
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SectionLabel;

    fn seg(start: f32, end: f32) -> StructureSegment {
        StructureSegment { start, end, label: SectionLabel::Section, energy: 0.0 }
    }

    fn flat_series(n: usize) -> SpectralSeries {
        SpectralSeries {
            centroid: vec![1000.0; n],
            rolloff: vec![2000.0; n],
            bandwidth: vec![500.0; n],
            flatness: vec![0.1; n],
            zcr: vec![0.05; n],
        }
    }

    fn all_enabled() -> FxConfig {
        FxConfig { min_confidence: 0.0, ..FxConfig::default() }
    }

    #[test]
    fn rising_brightness_before_boundary_is_a_riser() {
        let times: Vec<f32> = (0..200).map(|i| i as f32 * 0.05).collect();
        let mut series = flat_series(200);
        for i in 60..100 {
            series.centroid[i] = 1000.0 + (i - 60) as f32 * 50.0;
            series.bandwidth[i] = 500.0 + (i - 60) as f32 * 10.0;
        }
        let events = detect(&series, &times, &[seg(0.0, 4.0)], &FxConfig::default()).unwrap();
        assert!(events.iter().any(|e| e.kind == FxKind::Riser && e.t == 4.0));
        assert!(events.iter().all(|e| e.confidence >= 0.5));
    }

    #[test]
    fn confidence_filter_drops_weak_kinds() {
        let times: Vec<f32> = (0..200).map(|i| i as f32 * 0.05).collect();
        let mut series = flat_series(200);
        // bright first half, dark second half: reverse (0.4) only
        for i in 40..60 {
            series.centroid[i] = 5000.0;
        }
        let cfg = all_enabled();
        let loose = detect(&series, &times, &[seg(0.0, 4.0)], &cfg).unwrap();
        assert!(loose.iter().any(|e| e.kind == FxKind::Reverse));
        let strict = detect(&series, &times, &[seg(0.0, 4.0)], &FxConfig::default()).unwrap();
        assert!(strict.iter().all(|e| e.kind != FxKind::Reverse));
    }

    #[test]
    fn zcr_burst_is_a_glitch() {
        let times: Vec<f32> = (0..200).map(|i| i as f32 * 0.05).collect();
        let mut series = flat_series(200);
        for z in series.zcr.iter_mut().skip(70).take(10) {
            *z = 0.6;
        }
        let events = detect(&series, &times, &[seg(0.0, 4.0)], &all_enabled()).unwrap();
        assert!(events.iter().any(|e| e.kind == FxKind::Glitch));
    }

    #[test]
    fn narrow_windows_are_skipped() {
        let times: Vec<f32> = (0..4).map(|i| i as f32 * 0.05).collect();
        let series = flat_series(4);
        let events = detect(&series, &times, &[seg(0.0, 0.2)], &all_enabled()).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn flat_track_emits_nothing() {
        let times: Vec<f32> = (0..400).map(|i| i as f32 * 0.05).collect();
        let series = flat_series(400);
        let segs = [seg(0.0, 5.0), seg(5.0, 10.0), seg(10.0, 20.0)];
        assert!(detect(&series, &times, &segs, &all_enabled()).unwrap().is_empty());
    }
}
