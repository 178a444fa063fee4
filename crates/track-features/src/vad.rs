//! Heuristic voice-activity detection.
//!
//! An ordered chain of stage functions, each consuming the previous stage's
//! output: band-limit -> energy gate -> 16-bit resample -> frame classifier ->
//! timbre post-filter -> merge. Every stage can end the chain with no segments.

use tracing::debug;

use crate::config::{FrameConfig, VadConfig};
use crate::dsp::{percentile, resample_linear, rms_series, zcr_series, BiquadCascade, Spectrogram};
use crate::energy::to_dbfs;
use crate::error::{AnalysisError, AnalysisResult};
use crate::record::VocalSegment;
use crate::spectral::flatness;

/// Per-aggressiveness frame classifier tables: required rise over the noise
/// floor (dB), absolute level floor (dBFS) and zero-crossing ceiling.
const MARGIN_DB: [f32; 4] = [3.0, 6.0, 9.0, 12.0];
const LEVEL_FLOOR_DB: [f32; 4] = [-60.0, -55.0, -50.0, -45.0];
const ZCR_CEILING: [f32; 4] = [0.5, 0.45, 0.4, 0.35];
const NOISE_FLOOR_PERCENTILE: f32 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GateOutcome {
    pub mean_rms_db: f32,
    pub passed: bool,
}

/// Stage 1: Butterworth band-pass to the speech band. The upper edge is pulled
/// below the input Nyquist when needed.
pub fn band_limit(samples: &[f32], sample_rate: u32, cfg: &VadConfig) -> AnalysisResult<Vec<f32>> {
    let high = cfg.band_high_hz.min(0.45 * sample_rate as f32);
    if cfg.band_low_hz >= high {
        return Err(AnalysisError::Degenerate {
            stage: "vad",
            reason: format!("sample rate {sample_rate} Hz leaves no speech band"),
        });
    }
    Ok(BiquadCascade::bandpass(sample_rate, cfg.band_low_hz, high, cfg.filter_order).apply(samples))
}

/// Stage 2: mean frame RMS of the band-limited signal, in dBFS, against the gate.
pub fn energy_gate(band: &[f32], frame: &FrameConfig, gate_db: f32) -> AnalysisResult<GateOutcome> {
    let rms = rms_series(band, frame.frame_size, frame.hop);
    let mean = crate::dsp::mean(&rms).ok_or(AnalysisError::EmptySeries("vad"))?;
    let mean_rms_db = to_dbfs(mean);
    Ok(GateOutcome { mean_rms_db, passed: mean_rms_db >= gate_db })
}

/// Stage 3: resample to the classifier rate and quantize to 16-bit PCM.
pub fn to_pcm16(band: &[f32], sample_rate: u32, target_rate: u32) -> Vec<i16> {
    resample_linear(band, sample_rate, target_rate)
        .into_iter()
        .map(|s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
        .collect()
}

fn pcm_to_f32(pcm: &[i16]) -> Vec<f32> {
    pcm.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// Stage 4: classify each complete frame of `frame_len` samples as speech-like.
///
/// A frame passes when its level clears both the adaptive noise floor plus a
/// margin and an absolute floor, and its zero-crossing rate stays under a
/// ceiling. Higher aggressiveness tightens all three.
pub fn classify_frames(pcm: &[i16], frame_len: usize, aggressiveness: u8) -> AnalysisResult<Vec<bool>> {
    let level = usize::from(aggressiveness.min(3));
    let frames: Vec<(f32, f32)> = pcm
        .chunks_exact(frame_len)
        .map(|chunk| {
            let power = chunk.iter().map(|&s| (s as f64 / 32768.0).powi(2)).sum::<f64>() / frame_len as f64;
            let level_db = (10.0 * (power + 1e-12).log10()) as f32;
            let crossings = chunk.windows(2).filter(|w| (w[0] < 0) != (w[1] < 0)).count();
            (level_db, crossings as f32 / frame_len as f32)
        })
        .collect();
    if frames.is_empty() {
        return Ok(Vec::new());
    }

    let levels: Vec<f32> = frames.iter().map(|f| f.0).collect();
    let estimated = percentile(&levels, NOISE_FLOOR_PERCENTILE).ok_or(AnalysisError::EmptySeries("vad"))?;
    let noise_floor = estimated.min(LEVEL_FLOOR_DB[level] - MARGIN_DB[level]);

    Ok(frames
        .iter()
        .map(|&(db, zcr)| db > noise_floor + MARGIN_DB[level] && db > LEVEL_FLOOR_DB[level] && zcr < ZCR_CEILING[level])
        .collect())
}

/// Stage 5: keep frames whose spectral flatness and zero-crossing rate both sit
/// below the given percentile of the whole track. Analysis frames are twice the
/// classifier frame, hopped by one classifier frame.
pub fn timbre_mask(pcm: &[i16], sample_rate: u32, frame_len: usize, n_frames: usize, pct: f32) -> AnalysisResult<Vec<bool>> {
    if n_frames == 0 {
        return Ok(Vec::new());
    }
    let y = pcm_to_f32(pcm);
    let zcr: Vec<f32> = zcr_series(&y, 2 * frame_len, frame_len).into_iter().take(n_frames).collect();
    let spec = Spectrogram::compute(&y, sample_rate, 2 * frame_len, frame_len);
    let flat: Vec<f32> = spec.frames().take(n_frames).map(flatness).collect();

    let flat_thr = percentile(&flat, pct).ok_or(AnalysisError::EmptySeries("vad"))?;
    let zcr_thr = percentile(&zcr, pct).ok_or(AnalysisError::EmptySeries("vad"))?;
    Ok(flat.iter().zip(&zcr).map(|(&f, &z)| f < flat_thr && z < zcr_thr).collect())
}

/// Stage 6: merge runs of accepted frames, discarding runs shorter than `min_seg_ms`.
pub fn merge_frames(flags: &[bool], frame_ms: u32, min_seg_ms: u32) -> Vec<VocalSegment> {
    let frame_sec = frame_ms as f32 / 1000.0;
    let mut segments = Vec::new();
    let mut start: Option<usize> = None;
    for (i, &speech) in flags.iter().enumerate() {
        if speech && start.is_none() {
            start = Some(i);
        }
        let last = i + 1 == flags.len();
        if let (true, Some(s)) = (!speech || last, start) {
            let end = if speech { i + 1 } else { i };
            if ((end - s) as u32) * frame_ms >= min_seg_ms {
                segments.push(VocalSegment { start: s as f32 * frame_sec, end: end as f32 * frame_sec });
            }
            start = None;
        }
    }
    segments
}

/// Full chain over a mono waveform.
pub fn detect(samples: &[f32], sample_rate: u32, frame: &FrameConfig, cfg: &VadConfig) -> AnalysisResult<Vec<VocalSegment>> {
    let band = band_limit(samples, sample_rate, cfg)?;

    let gate = energy_gate(&band, frame, cfg.energy_gate_db)?;
    if !gate.passed {
        debug!(mean_rms_db = gate.mean_rms_db, gate_db = cfg.energy_gate_db, "vad gated: track too quiet");
        return Ok(Vec::new());
    }

    let pcm = to_pcm16(&band, sample_rate, cfg.target_rate);
    let frame_len = (cfg.target_rate as usize * cfg.frame_ms as usize) / 1000;
    let flags = classify_frames(&pcm, frame_len, cfg.aggressiveness)?;
    let classified = flags.iter().filter(|&&f| f).count();
    if classified == 0 {
        debug!(frames = flags.len(), "vad: classifier found no speech frames");
        return Ok(Vec::new());
    }

    let mask = timbre_mask(&pcm, cfg.target_rate, frame_len, flags.len(), cfg.timbre_percentile)?;
    let accepted: Vec<bool> = flags.iter().zip(&mask).map(|(&f, &m)| f && m).collect();

    let segments = merge_frames(&accepted, cfg.frame_ms, cfg.min_seg_ms);
    debug!(
        frames = flags.len(),
        classified,
        accepted = accepted.iter().filter(|&&a| a).count(),
        segments = segments.len(),
        "vad"
    );
    Ok(segments)
}
