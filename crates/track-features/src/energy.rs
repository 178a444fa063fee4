//! RMS envelope, peak level and transient timestamps.

use tracing::debug;

use crate::config::PeakPickConfig;
use crate::dsp::{frame_time, peak_pick};
use crate::error::{AnalysisError, AnalysisResult};
use crate::record::EnergyPoint;

/// Floor applied before converting the peak RMS to dBFS.
pub const DBFS_EPSILON: f32 = 1e-12;

#[derive(Clone, Debug, PartialEq)]
pub struct EnergySummary {
    pub peak_rms_linear: f32,
    pub peak_rms_dbfs: f32,
    /// Full-resolution profile; the payload bounder decimates it.
    pub profile: Vec<EnergyPoint>,
}

pub fn to_dbfs(linear: f32) -> f32 {
    20.0 * linear.max(DBFS_EPSILON).log10()
}

pub fn summarize(rms: &[f32], sample_rate: u32, hop: usize) -> AnalysisResult<EnergySummary> {
    if rms.is_empty() {
        return Err(AnalysisError::EmptySeries("energy"));
    }
    if rms.iter().any(|v| !v.is_finite()) {
        return Err(AnalysisError::NonFinite("energy"));
    }
    let peak = rms.iter().copied().fold(0.0f32, f32::max);
    let profile = rms
        .iter()
        .enumerate()
        .map(|(i, &v)| EnergyPoint { t: frame_time(i, hop, sample_rate), rms: v })
        .collect();
    let summary = EnergySummary { peak_rms_linear: peak, peak_rms_dbfs: to_dbfs(peak), profile };
    debug!(peak = summary.peak_rms_linear, dbfs = summary.peak_rms_dbfs, frames = rms.len(), "energy summary");
    Ok(summary)
}

/// Peak-picked onset timestamps (seconds), strictly increasing.
pub fn transients(onset_env: &[f32], sample_rate: u32, hop: usize, cfg: &PeakPickConfig) -> Vec<f32> {
    let peaks = peak_pick(onset_env, cfg, cfg.delta);
    debug!(count = peaks.len(), "transients picked");
    peaks.into_iter().map(|i| frame_time(i, hop, sample_rate)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dbfs_is_floored_for_silence() {
        assert_eq!(to_dbfs(0.0), 20.0 * 1e-12f32.log10());
        assert!((to_dbfs(0.0) + 240.0).abs() < 1e-3);
        assert!((to_dbfs(1.0)).abs() < 1e-6);
        assert!((to_dbfs(0.5) + 6.0206).abs() < 1e-3);
    }

    #[test]
    fn summary_tracks_peak_and_times() {
        let rms = [0.1, 0.4, 0.2];
        let s = summarize(&rms, 1000, 100).unwrap();
        assert_eq!(s.peak_rms_linear, 0.4);
        assert_eq!(s.peak_rms_dbfs, to_dbfs(0.4));
        assert_eq!(s.profile.len(), 3);
        assert!((s.profile[2].t - 0.2).abs() < 1e-6);
    }

    #[test]
    fn summary_rejects_empty_and_nan() {
        assert_eq!(summarize(&[], 1000, 100), Err(AnalysisError::EmptySeries("energy")));
        assert_eq!(summarize(&[0.1, f32::NAN], 1000, 100), Err(AnalysisError::NonFinite("energy")));
    }

    #[test]
    fn transients_are_strictly_increasing() {
        let mut env = vec![0.0f32; 400];
        for i in (20..400).step_by(40) {
            env[i] = 3.0;
        }
        let times = transients(&env, 44_100, 512, &PeakPickConfig::default());
        assert_eq!(times.len(), 10);
        assert!(times.windows(2).all(|w| w[0] < w[1]));
    }
}
