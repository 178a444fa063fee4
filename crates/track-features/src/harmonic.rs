//! Harmonic/percussive separation by median filtering, used for the
//! `vocal_intensity` scalar (mean absolute amplitude of the harmonic part).

use rustfft::{num_complex::Complex32, FftPlanner};
use tracing::debug;

use crate::config::HarmonicConfig;
use crate::dsp::frames::fill_frame;
use crate::dsp::{hann, Spectrogram};
use crate::error::{AnalysisError, AnalysisResult};

fn median(buf: &mut [f32]) -> f32 {
    let mid = buf.len() / 2;
    *buf.select_nth_unstable_by(mid, |a, b| a.total_cmp(b)).1
}

/// Soft harmonic mask `H^2 / (H^2 + P^2)`, frame-major like the spectrogram.
///
/// `H` is the median across `kernel` frames of each bin, `P` the median across
/// `kernel` bins of each frame. Windows are clipped at the edges. Cells where
/// both are zero get mask 0.
pub fn harmonic_mask(spec: &Spectrogram, kernel: usize) -> Vec<f32> {
    let half = kernel / 2;
    let (n_frames, n_bins) = (spec.n_frames(), spec.n_bins());
    let mut mask = Vec::with_capacity(n_frames * n_bins);
    let mut buf = Vec::with_capacity(kernel);

    for i in 0..n_frames {
        let frame = spec.frame(i);
        let t_lo = i.saturating_sub(half);
        let t_hi = (i + half + 1).min(n_frames);
        for k in 0..n_bins {
            buf.clear();
            buf.extend((t_lo..t_hi).map(|j| spec.frame(j)[k]));
            let h = median(&mut buf);

            buf.clear();
            buf.extend_from_slice(&frame[k.saturating_sub(half)..(k + half + 1).min(n_bins)]);
            let p = median(&mut buf);

            let (h2, p2) = (h * h, p * p);
            mask.push(if h2 + p2 > 0.0 { h2 / (h2 + p2) } else { 0.0 });
        }
    }
    mask
}

/// Apply a frame-major mask to the STFT of `samples` and resynthesize by
/// weighted overlap-add. Frames are processed one at a time, so the complex
/// spectrogram is never held in memory.
pub fn masked_resynthesis(samples: &[f32], spec: &Spectrogram, mask: &[f32]) -> Vec<f32> {
    let n = spec.frame_size();
    let hop = spec.hop();
    let n_bins = spec.n_bins();
    let pad = n / 2;

    let mut planner = FftPlanner::<f32>::new();
    let forward = planner.plan_fft_forward(n);
    let inverse = planner.plan_fft_inverse(n);
    let window = hann(n);

    let padded_len = samples.len() + 2 * pad;
    let mut out = vec![0f32; padded_len];
    let mut norm = vec![0f32; padded_len];
    let mut frame = vec![0f32; n];
    let mut buf = vec![Complex32::new(0.0, 0.0); n];

    for (i, gains) in mask.chunks_exact(n_bins).enumerate().take(spec.n_frames()) {
        fill_frame(samples, i, hop, &mut frame);
        for (slot, (&s, &w)) in buf.iter_mut().zip(frame.iter().zip(&window)) {
            *slot = Complex32::new(s * w, 0.0);
        }
        forward.process(&mut buf);
        for (k, c) in buf.iter_mut().enumerate() {
            let bin = if k < n_bins { k } else { n - k };
            *c *= gains[bin];
        }
        inverse.process(&mut buf);

        let start = i * hop;
        for (j, (c, &w)) in buf.iter().zip(&window).enumerate() {
            let Some(slot) = out.get_mut(start + j) else { break };
            *slot += w * c.re / n as f32;
            norm[start + j] += w * w;
        }
    }

    for (y, &w) in out.iter_mut().zip(&norm) {
        if w > f32::EPSILON {
            *y /= w;
        }
    }
    out.drain(..pad);
    out.truncate(samples.len());
    out
}

pub fn vocal_intensity(samples: &[f32], spec: &Spectrogram, cfg: &HarmonicConfig) -> AnalysisResult<f32> {
    if samples.is_empty() || spec.n_frames() == 0 {
        return Err(AnalysisError::EmptySeries("harmonic"));
    }
    let mask = harmonic_mask(spec, cfg.kernel);
    let harmonic = masked_resynthesis(samples, spec, &mask);
    let intensity = (harmonic.iter().map(|&s| s.abs() as f64).sum::<f64>() / harmonic.len() as f64) as f32;
    if !intensity.is_finite() {
        return Err(AnalysisError::NonFinite("harmonic"));
    }
    debug!(intensity, "harmonic separation");
    Ok(intensity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mean_abs(x: &[f32]) -> f32 {
        x.iter().map(|s| s.abs()).sum::<f32>() / x.len() as f32
    }

    #[test]
    fn unit_mask_reconstructs_the_input() {
        let sr = 22_050;
        let x: Vec<f32> = (0..sr as usize)
            .map(|i| 0.3 * (2.0 * std::f32::consts::PI * 330.0 * i as f32 / sr as f32).sin())
            .collect();
        let spec = Spectrogram::compute(&x, sr, 1024, 256);
        let ones = vec![1.0f32; spec.n_frames() * spec.n_bins()];
        let y = masked_resynthesis(&x, &spec, &ones);
        assert_eq!(y.len(), x.len());
        let max_err = x.iter().zip(&y).map(|(a, b)| (a - b).abs()).fold(0.0, f32::max);
        assert!(max_err < 1e-3, "max_err = {max_err}");
    }

    #[test]
    fn steady_tone_is_harmonic() {
        let sr = 22_050;
        let x: Vec<f32> = (0..sr as usize * 2)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sr as f32).sin())
            .collect();
        let spec = Spectrogram::compute(&x, sr, 2048, 512);
        let v = vocal_intensity(&x, &spec, &HarmonicConfig::default()).unwrap();
        let expected = mean_abs(&x);
        assert!((v - expected).abs() < 0.1 * expected, "v = {v}, expected ~{expected}");
    }

    #[test]
    fn sparse_clicks_are_percussive() {
        let sr = 22_050;
        let mut x = vec![0f32; sr as usize * 4];
        let mut seed = 7u32;
        for start in (0..x.len()).step_by(sr as usize / 2) {
            for s in x.iter_mut().skip(start).take(220) {
                seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
                *s = ((seed >> 16) as f32 / 65535.0 - 0.5) * 1.6;
            }
        }
        let spec = Spectrogram::compute(&x, sr, 2048, 512);
        let v = vocal_intensity(&x, &spec, &HarmonicConfig::default()).unwrap();
        assert!(v < 0.2 * mean_abs(&x), "v = {v}");
    }

    #[test]
    fn silence_has_zero_intensity() {
        let x = vec![0f32; 8192];
        let spec = Spectrogram::compute(&x, 22_050, 2048, 512);
        assert_eq!(vocal_intensity(&x, &spec, &HarmonicConfig::default()), Ok(0.0));
    }
}
