//! Tunables for every stage of the extraction pipeline.
//!
//! All structs deserialize with `#[serde(default)]`, so a partial JSON file
//! only needs the fields it overrides.

use serde::{Deserialize, Serialize};

use crate::error::ExtractError;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub frame: FrameConfig,
    pub spectral: SpectralConfig,
    pub transients: PeakPickConfig,
    pub tempo: TempoConfig,
    pub silence: SilenceConfig,
    pub vad: VadConfig,
    pub harmonic: HarmonicConfig,
    pub structure: StructureConfig,
    pub fx: FxConfig,
    pub caps: CapsConfig,
}

/// STFT / RMS grid shared by every frame-based stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub frame_size: usize,
    pub hop: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self { frame_size: 2048, hop: 512 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralConfig {
    /// Fraction of spectral energy below the rolloff frequency.
    pub rolloff_percent: f32,
    /// Chroma folding range.
    pub chroma_min_hz: f32,
    pub chroma_max_hz: f32,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self { rolloff_percent: 0.85, chroma_min_hz: 32.7, chroma_max_hz: 5000.0 }
    }
}

/// Local-maximum peak picking. Window sizes are in frames.
///
/// A frame `n` is a peak when it equals the max over `[n-pre_max, n+post_max]`,
/// exceeds the mean over `[n-pre_avg, n+post_avg]` by at least `delta`, and
/// lies more than `wait` frames after the previously accepted peak.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakPickConfig {
    pub pre_max: usize,
    pub post_max: usize,
    pub pre_avg: usize,
    pub post_avg: usize,
    pub delta: f32,
    pub wait: usize,
}

impl Default for PeakPickConfig {
    fn default() -> Self {
        Self { pre_max: 16, post_max: 16, pre_avg: 16, post_avg: 16, delta: 0.7, wait: 5 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    pub min_bpm: f32,
    pub max_bpm: f32,
    /// Center of the log-normal tempo prior.
    pub prior_bpm: f32,
    /// Prior spread, in octaves.
    pub prior_octaves: f32,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self { min_bpm: 30.0, max_bpm: 300.0, prior_bpm: 120.0, prior_octaves: 1.0 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SilenceConfig {
    /// Percentile of the RMS series used as threshold when `threshold` is unset.
    pub percentile: f32,
    /// Explicit linear RMS threshold.
    pub threshold: Option<f32>,
    /// Minimum run length in seconds.
    pub min_len: f32,
    /// Extend the previous segment over sub-minimum runs instead of dropping them.
    pub absorb_short_runs: bool,
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self { percentile: 10.0, threshold: None, min_len: 0.2, absorb_short_runs: false }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    pub band_low_hz: f32,
    pub band_high_hz: f32,
    /// Butterworth order of each of the high-pass and low-pass halves. Rounded up to even.
    pub filter_order: usize,
    pub energy_gate_db: f32,
    pub target_rate: u32,
    pub frame_ms: u32,
    /// 0 (permissive) to 3 (strict).
    pub aggressiveness: u8,
    /// Frames must score below this percentile on both flatness and ZCR.
    pub timbre_percentile: f32,
    pub min_seg_ms: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            band_low_hz: 300.0,
            band_high_hz: 3400.0,
            filter_order: 6,
            energy_gate_db: -45.0,
            target_rate: 16_000,
            frame_ms: 30,
            aggressiveness: 2,
            timbre_percentile: 65.0,
            min_seg_ms: 300,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarmonicConfig {
    /// Median filter length, applied in frames (harmonic) and bins (percussive).
    pub kernel: usize,
}

impl Default for HarmonicConfig {
    fn default() -> Self {
        Self { kernel: 31 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    /// Percentile of the novelty curve used as peak delta.
    pub novelty_percentile: f32,
    /// Delta never drops below this fraction of the curve maximum.
    pub novelty_floor_ratio: f32,
    /// Window sizes and `wait` for boundary picking; `delta` is an absolute
    /// lower bound on the adaptive delta.
    pub peaks: PeakPickConfig,
    /// Minimum segment length in seconds.
    pub min_seg: f32,
    pub breakdown_percentile: f32,
    pub build_percentile: f32,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            novelty_percentile: 75.0,
            novelty_floor_ratio: 0.05,
            peaks: PeakPickConfig { delta: 0.0, wait: 10, ..PeakPickConfig::default() },
            min_seg: 4.0,
            breakdown_percentile: 30.0,
            build_percentile: 70.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FxConfig {
    pub pre_sec: f32,
    pub post_sec: f32,
    pub min_frames: usize,
    pub min_confidence: f32,
    pub riser_confidence: f32,
    pub glitch_confidence: f32,
    pub reverse_confidence: f32,
    pub sweep_confidence: f32,
    pub glitch_window_percentile: f32,
    pub glitch_track_percentile: f32,
    pub reverse_ratio: f32,
    pub sweep_percentile: f32,
    pub sweep_tail_frames: usize,
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            pre_sec: 2.0,
            post_sec: 0.5,
            min_frames: 5,
            min_confidence: 0.5,
            riser_confidence: 0.6,
            glitch_confidence: 0.5,
            reverse_confidence: 0.4,
            sweep_confidence: 0.4,
            glitch_window_percentile: 95.0,
            glitch_track_percentile: 90.0,
            reverse_ratio: 1.2,
            sweep_percentile: 85.0,
            sweep_tail_frames: 3,
        }
    }
}

/// Output caps applied by the payload bounder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapsConfig {
    pub energy_profile: usize,
    pub transients: usize,
    pub drops: usize,
    pub silence: usize,
    pub vocal: usize,
    pub structure: usize,
    pub fx: usize,
}

impl Default for CapsConfig {
    fn default() -> Self {
        Self {
            energy_profile: 512,
            transients: 128,
            drops: 5,
            silence: 128,
            vocal: 128,
            structure: 128,
            fx: 64,
        }
    }
}

fn check(ok: bool, msg: &str) -> Result<(), ExtractError> {
    if ok {
        Ok(())
    } else {
        Err(ExtractError::InvalidConfig(msg.to_string()))
    }
}

/// Largest accepted STFT frame.
pub const MAX_FRAME_SIZE: usize = 1 << 16;
/// Largest accepted median-filter length.
pub const MAX_KERNEL: usize = 255;
/// Largest accepted frame-count window (peak picking, `wait`, FX spans).
pub const MAX_WINDOW_FRAMES: usize = 10_000;

fn is_percentile(p: f32) -> bool {
    (0.0..=100.0).contains(&p)
}

fn check_peaks(p: &PeakPickConfig, name: &str) -> Result<(), ExtractError> {
    let windows = [p.pre_max, p.post_max, p.pre_avg, p.post_avg, p.wait];
    if windows.iter().any(|&w| w > MAX_WINDOW_FRAMES) {
        return Err(ExtractError::InvalidConfig(format!("{name} windows and wait must be <= {MAX_WINDOW_FRAMES} frames")));
    }
    check(p.delta.is_finite(), "peak delta must be finite")
}

impl ExtractConfig {
    pub fn validate(&self) -> Result<(), ExtractError> {
        let f = &self.frame;
        check(
            (16..=MAX_FRAME_SIZE).contains(&f.frame_size),
            "frame.frame_size must be in 16..=65536",
        )?;
        check(f.hop > 0 && f.hop <= f.frame_size, "frame.hop must be in 1..=frame_size")?;

        check(
            self.spectral.rolloff_percent > 0.0 && self.spectral.rolloff_percent <= 1.0,
            "spectral.rolloff_percent must be in (0, 1]",
        )?;
        check(
            self.spectral.chroma_min_hz > 0.0 && self.spectral.chroma_min_hz < self.spectral.chroma_max_hz,
            "spectral chroma range is empty",
        )?;

        check_peaks(&self.transients, "transients")?;

        let t = &self.tempo;
        check(t.min_bpm > 0.0 && t.min_bpm < t.max_bpm, "tempo.min_bpm must be in (0, max_bpm)")?;
        check(t.prior_bpm > 0.0 && t.prior_octaves > 0.0, "tempo prior must be positive")?;

        let s = &self.silence;
        check(is_percentile(s.percentile), "silence.percentile must be in [0, 100]")?;
        check(s.min_len >= 0.0, "silence.min_len must be >= 0")?;
        if let Some(thr) = s.threshold {
            check(thr.is_finite() && thr >= 0.0, "silence.threshold must be finite and >= 0")?;
        }

        let v = &self.vad;
        check(
            v.band_low_hz > 0.0 && v.band_low_hz < v.band_high_hz,
            "vad band must satisfy 0 < low < high",
        )?;
        check(v.filter_order >= 2 && v.filter_order <= 16, "vad.filter_order must be in 2..=16")?;
        check(v.target_rate >= 8_000, "vad.target_rate must be >= 8000")?;
        check(
            (v.band_high_hz as u32) < v.target_rate / 2,
            "vad.band_high_hz must be below the target Nyquist",
        )?;
        check(v.frame_ms >= 10 && v.frame_ms <= 100, "vad.frame_ms must be in 10..=100")?;
        check(v.aggressiveness <= 3, "vad.aggressiveness must be in 0..=3")?;
        check(is_percentile(v.timbre_percentile), "vad.timbre_percentile must be in [0, 100]")?;

        check(
            (1..=MAX_KERNEL).contains(&self.harmonic.kernel),
            "harmonic.kernel must be in 1..=255",
        )?;

        let st = &self.structure;
        check(is_percentile(st.novelty_percentile), "structure.novelty_percentile must be in [0, 100]")?;
        check(st.novelty_floor_ratio >= 0.0, "structure.novelty_floor_ratio must be >= 0")?;
        check(st.min_seg > 0.0, "structure.min_seg must be > 0")?;
        check_peaks(&st.peaks, "structure.peaks")?;
        check(
            is_percentile(st.breakdown_percentile)
                && is_percentile(st.build_percentile)
                && st.breakdown_percentile <= st.build_percentile,
            "structure label percentiles must satisfy 0 <= breakdown <= build <= 100",
        )?;

        let fx = &self.fx;
        check(fx.pre_sec >= 0.0 && fx.post_sec >= 0.0, "fx windows must be >= 0")?;
        check(
            fx.min_frames <= MAX_WINDOW_FRAMES,
            "fx.min_frames must be <= 10000",
        )?;
        check(
            (1..=MAX_WINDOW_FRAMES).contains(&fx.sweep_tail_frames),
            "fx.sweep_tail_frames must be in 1..=10000",
        )?;
        check(
            is_percentile(fx.glitch_window_percentile)
                && is_percentile(fx.glitch_track_percentile)
                && is_percentile(fx.sweep_percentile),
            "fx percentiles must be in [0, 100]",
        )?;
        for c in [
            fx.min_confidence,
            fx.riser_confidence,
            fx.glitch_confidence,
            fx.reverse_confidence,
            fx.sweep_confidence,
        ] {
            check((0.0..=1.0).contains(&c), "fx confidences must be in [0, 1]")?;
        }

        check(self.caps.structure >= 1, "caps.structure must be >= 1")?;
        Ok(())
    }
}
