//! Active/silent segmentation of the RMS envelope.
//!
//! Runs shorter than `min_len` are dropped by default, which can leave a gap
//! between the surrounding segments. Set `absorb_short_runs` to extend the
//! previous segment over them instead.

use tracing::debug;

use crate::config::SilenceConfig;
use crate::dsp::percentile;
use crate::error::{AnalysisError, AnalysisResult};
use crate::record::{Activity, SilenceSegment};

/// Threshold actually used: the explicit one, else the configured percentile of `rms`.
pub fn silence_threshold(rms: &[f32], cfg: &SilenceConfig) -> AnalysisResult<f32> {
    match cfg.threshold {
        Some(thr) => Ok(thr),
        None => percentile(rms, cfg.percentile).ok_or(AnalysisError::EmptySeries("silence")),
    }
}

/// Label each frame `rms > threshold` and turn equal-label runs into segments.
///
/// A run spans from its first frame's time to the next run's first frame time;
/// the final run ends at `duration`.
pub fn segment(
    rms: &[f32],
    times: &[f32],
    duration: f32,
    threshold: f32,
    cfg: &SilenceConfig,
) -> AnalysisResult<Vec<SilenceSegment>> {
    if rms.is_empty() || rms.len() != times.len() {
        return Err(AnalysisError::EmptySeries("silence"));
    }

    let label_of = |v: f32| if v > threshold { Activity::Active } else { Activity::Silence };
    let mut runs: Vec<(usize, usize, Activity)> = Vec::new();
    let mut start = 0;
    let mut current = label_of(rms[0]);
    for (i, &v) in rms.iter().enumerate().skip(1) {
        let label = label_of(v);
        if label != current {
            runs.push((start, i, current));
            start = i;
            current = label;
        }
    }
    runs.push((start, rms.len(), current));

    let mut segments: Vec<SilenceSegment> = Vec::new();
    let mut pending_start: Option<f32> = None;
    for (first, next, label) in runs {
        let t0 = times[first];
        let t1 = if next < times.len() { times[next] } else { duration };
        if t1 - t0 >= cfg.min_len {
            segments.push(SilenceSegment { start: pending_start.take().unwrap_or(t0), end: t1, label });
        } else if cfg.absorb_short_runs {
            match segments.last_mut() {
                Some(prev) => prev.end = t1,
                None => {
                    pending_start.get_or_insert(t0);
                }
            }
        }
    }
    // everything was shorter than min_len and absorbed into nothing
    if let Some(t0) = pending_start {
        if duration - t0 >= cfg.min_len {
            segments.push(SilenceSegment { start: t0, end: duration, label: label_of(rms[0]) });
        }
    }

    debug!(threshold, segments = segments.len(), "silence segmentation");
    Ok(segments)
}
