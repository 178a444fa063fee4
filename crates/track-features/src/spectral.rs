//! Spectral statistics over the shared magnitude spectrogram.

use tracing::debug;

use crate::config::SpectralConfig;
use crate::dsp::{mean, zcr_series, Spectrogram};
use crate::error::{AnalysisError, AnalysisResult};
use crate::record::SpectralStats;

const FLATNESS_AMIN: f64 = 1e-10;

/// Per-frame descriptor series, reused by the key heuristic and the FX detector.
#[derive(Clone, Debug, Default)]
pub struct SpectralSeries {
    pub centroid: Vec<f32>,
    pub rolloff: Vec<f32>,
    pub bandwidth: Vec<f32>,
    pub flatness: Vec<f32>,
    pub zcr: Vec<f32>,
}

impl SpectralSeries {
    pub fn compute(samples: &[f32], spec: &Spectrogram, cfg: &SpectralConfig) -> Self {
        let n = spec.n_frames();
        let freqs: Vec<f32> = (0..spec.n_bins()).map(|k| spec.bin_hz(k)).collect();
        let mut series = SpectralSeries {
            centroid: Vec::with_capacity(n),
            rolloff: Vec::with_capacity(n),
            bandwidth: Vec::with_capacity(n),
            flatness: Vec::with_capacity(n),
            zcr: zcr_series(samples, spec.frame_size(), spec.hop()),
        };

        for frame in spec.frames() {
            let (centroid, bandwidth) = centroid_bandwidth(frame, &freqs);
            series.centroid.push(centroid);
            series.bandwidth.push(bandwidth);
            series.rolloff.push(rolloff(frame, &freqs, cfg.rolloff_percent));
            series.flatness.push(flatness(frame));
        }
        series
    }

    /// Time-averaged aggregates.
    pub fn stats(&self) -> AnalysisResult<SpectralStats> {
        let avg = |s: &[f32]| mean(s).ok_or(AnalysisError::EmptySeries("spectral"));
        let stats = SpectralStats {
            centroid_hz: avg(&self.centroid)?,
            rolloff_hz: avg(&self.rolloff)?,
            bandwidth_hz: avg(&self.bandwidth)?,
            flatness: avg(&self.flatness)?,
        };
        let all_finite = [stats.centroid_hz, stats.rolloff_hz, stats.bandwidth_hz, stats.flatness]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(AnalysisError::NonFinite("spectral"));
        }
        debug!(?stats, "spectral statistics");
        Ok(stats)
    }
}

/// Magnitude-weighted mean frequency and the weighted standard deviation around it.
/// A silent frame yields `(0, 0)`.
fn centroid_bandwidth(frame: &[f32], freqs: &[f32]) -> (f32, f32) {
    let total: f64 = frame.iter().map(|&m| m as f64).sum();
    if total <= 0.0 {
        return (0.0, 0.0);
    }
    let centroid = frame.iter().zip(freqs).map(|(&m, &f)| m as f64 * f as f64).sum::<f64>() / total;
    let spread = frame
        .iter()
        .zip(freqs)
        .map(|(&m, &f)| {
            let d = f as f64 - centroid;
            m as f64 * d * d
        })
        .sum::<f64>()
        / total;
    (centroid as f32, spread.sqrt() as f32)
}

/// Lowest bin frequency whose cumulative magnitude reaches `percent` of the total.
fn rolloff(frame: &[f32], freqs: &[f32], percent: f32) -> f32 {
    let total: f64 = frame.iter().map(|&m| m as f64).sum();
    let target = total * percent as f64;
    let mut acc = 0.0;
    for (&m, &f) in frame.iter().zip(freqs) {
        acc += m as f64;
        if acc >= target {
            return f;
        }
    }
    freqs.last().copied().unwrap_or(0.0)
}

/// Geometric over arithmetic mean of the power spectrum, in `[0, 1]`.
/// A silent frame is perfectly flat (1.0).
pub fn flatness(frame: &[f32]) -> f32 {
    let n = frame.len() as f64;
    let mut log_sum = 0.0;
    let mut sum = 0.0;
    for &m in frame {
        let p = ((m as f64) * (m as f64)).max(FLATNESS_AMIN);
        log_sum += p.ln();
        sum += p;
    }
    let geometric = (log_sum / n).exp();
    let arithmetic = sum / n;
    (geometric / arithmetic).clamp(0.0, 1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpectralConfig;

    fn sine(freq: f32, sr: u32, secs: f32) -> Vec<f32> {
        (0..(sr as f32 * secs) as usize)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin())
            .collect()
    }

    #[test]
    fn sine_centroid_near_tone_and_flatness_low() {
        let sr = 22_050;
        let x = sine(1000.0, sr, 2.0);
        let spec = Spectrogram::compute(&x, sr, 2048, 512);
        let series = SpectralSeries::compute(&x, &spec, &SpectralConfig::default());
        let mid = series.centroid.len() / 2;
        assert!((series.centroid[mid] - 1000.0).abs() < 50.0);
        assert!(series.flatness[mid] < 0.01);
        assert!(series.rolloff[mid] < 1100.0);
    }

    #[test]
    fn silent_frame_descriptors() {
        let frame = vec![0.0f32; 8];
        let freqs: Vec<f32> = (0..8).map(|k| k as f32 * 100.0).collect();
        assert_eq!(centroid_bandwidth(&frame, &freqs), (0.0, 0.0));
        assert_eq!(rolloff(&frame, &freqs, 0.85), 0.0);
        assert_eq!(flatness(&frame), 1.0);
    }

    #[test]
    fn white_spectrum_is_flat() {
        let frame = vec![0.3f32; 64];
        assert!((flatness(&frame) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rolloff_respects_percent() {
        let frame = [1.0, 1.0, 1.0, 1.0];
        let freqs = [0.0, 100.0, 200.0, 300.0];
        assert_eq!(rolloff(&frame, &freqs, 0.5), 100.0);
        assert_eq!(rolloff(&frame, &freqs, 0.85), 300.0);
    }

    #[test]
    fn empty_series_is_an_analysis_error() {
        let series = SpectralSeries::default();
        assert_eq!(series.stats(), Err(AnalysisError::EmptySeries("spectral")));
    }
}
