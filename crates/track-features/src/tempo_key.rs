//! Onset envelope, tempo estimate and chroma-based key guess.

use tracing::debug;

use crate::config::{SpectralConfig, TempoConfig};
use crate::dsp::{mean, Spectrogram};
use crate::error::{AnalysisError, AnalysisResult};
use crate::record::{Key, Mode};

const POWER_AMIN: f32 = 1e-10;
const TOP_DB: f32 = 80.0;

/// Mean positive first difference of the log-power spectrogram across bins.
///
/// Power is floored at 1e-10 and clamped to 80 dB below the loudest bin of the
/// whole track, so silent passages contribute nothing. Frame 0 is always zero.
pub fn onset_envelope(spec: &Spectrogram) -> Vec<f32> {
    let to_db = |m: f32| 10.0 * (m * m).max(POWER_AMIN).log10();
    let global_max = spec.frames().flatten().fold(f32::NEG_INFINITY, |acc, &m| acc.max(to_db(m)));
    let floor = global_max - TOP_DB;

    let mut env = Vec::with_capacity(spec.n_frames());
    let mut prev: Option<Vec<f32>> = None;
    for frame in spec.frames() {
        let cur: Vec<f32> = frame.iter().map(|&m| to_db(m).max(floor)).collect();
        let value = match &prev {
            Some(p) => {
                let rise: f64 = cur.iter().zip(p).map(|(&c, &q)| ((c - q).max(0.0)) as f64).sum();
                (rise / cur.len() as f64) as f32
            }
            None => 0.0,
        };
        env.push(value);
        prev = Some(cur);
    }
    env
}

/// Global tempo from the onset envelope's autocorrelation, weighted by a
/// log-normal prior around `prior_bpm`. Returns 0.0 when the envelope carries no
/// periodic energy (e.g. silence).
pub fn estimate_tempo(env: &[f32], sample_rate: u32, hop: usize, cfg: &TempoConfig) -> AnalysisResult<f32> {
    if env.is_empty() {
        return Err(AnalysisError::EmptySeries("tempo"));
    }
    let frames_per_min = 60.0 * sample_rate as f64 / hop as f64;
    let lag_min = (frames_per_min / cfg.max_bpm as f64).ceil().max(1.0) as usize;
    let lag_max = ((frames_per_min / cfg.min_bpm as f64).floor() as usize).min(env.len().saturating_sub(1));
    if lag_min > lag_max {
        debug!(frames = env.len(), "track too short for tempo estimation");
        return Ok(0.0);
    }

    let autocorr = |lag: usize| -> f64 {
        env.iter().zip(&env[lag..]).map(|(&a, &b)| a as f64 * b as f64).sum()
    };
    let weighted: Vec<(usize, f64)> = (lag_min..=lag_max)
        .map(|lag| {
            let bpm = frames_per_min / lag as f64;
            let octaves = (bpm / cfg.prior_bpm as f64).log2() / cfg.prior_octaves as f64;
            (lag, autocorr(lag) * (-0.5 * octaves * octaves).exp())
        })
        .collect();

    let Some(&(best_lag, best)) = weighted.iter().max_by(|a, b| a.1.total_cmp(&b.1)) else {
        return Ok(0.0);
    };
    if best <= 0.0 {
        return Ok(0.0);
    }

    // parabolic refinement around the winning lag
    let idx = best_lag - lag_min;
    let mut lag = best_lag as f64;
    if idx > 0 && idx + 1 < weighted.len() {
        let (a, b, c) = (weighted[idx - 1].1, best, weighted[idx + 1].1);
        let denom = a - 2.0 * b + c;
        if denom.abs() > 1e-12 {
            lag += (0.5 * (a - c) / denom).clamp(-0.5, 0.5);
        }
    }
    let bpm = (frames_per_min / lag) as f32;
    if !bpm.is_finite() {
        return Err(AnalysisError::NonFinite("tempo"));
    }
    Ok(bpm)
}

/// Time-averaged, per-frame max-normalized pitch-class energy.
pub fn chroma_profile(spec: &Spectrogram, cfg: &SpectralConfig) -> [f32; 12] {
    let classes: Vec<Option<usize>> = (0..spec.n_bins())
        .map(|k| {
            let hz = spec.bin_hz(k);
            if hz < cfg.chroma_min_hz || hz > cfg.chroma_max_hz {
                return None;
            }
            let midi = 69.0 + 12.0 * (hz / 440.0).log2();
            Some((midi.round() as i64).rem_euclid(12) as usize)
        })
        .collect();

    let mut acc = [0f64; 12];
    for frame in spec.frames() {
        let mut bins = [0f64; 12];
        for (&m, class) in frame.iter().zip(&classes) {
            if let Some(c) = class {
                bins[*c] += (m as f64) * (m as f64);
            }
        }
        let peak = bins.iter().copied().fold(0.0, f64::max);
        if peak > 0.0 {
            for (a, b) in acc.iter_mut().zip(bins) {
                *a += b / peak;
            }
        }
    }

    let n = spec.n_frames().max(1) as f64;
    acc.map(|v| (v / n) as f32)
}

/// Tonic = strongest pitch class. Mode is a deliberately coarse guess: minor when the
/// mean spectral centroid sits below `sample_rate / 8`, major otherwise.
pub fn estimate_key(chroma: &[f32; 12], centroid_series: &[f32], sample_rate: u32) -> AnalysisResult<Key> {
    let mean_centroid = mean(centroid_series).ok_or(AnalysisError::EmptySeries("key"))?;
    let pitch_class = chroma
        .iter()
        .enumerate()
        .fold((0usize, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
        .0 as u8;
    let mode = if mean_centroid < sample_rate as f32 / 8.0 { Mode::Minor } else { Mode::Major };
    Ok(Key { pitch_class, mode })
}
