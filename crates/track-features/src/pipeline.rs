//! End-to-end extraction: waveform in, bounded `FeatureRecord` out.
//!
//! Only decoding and configuration errors abort. A detector that fails is
//! logged, named in `record.degraded` and replaced by its neutral default.

use std::fmt::Debug;
use std::path::Path;
use std::time::Instant;

use tracing::{info, warn};

use crate::bound::{bound_record, evenly_sample};
use crate::config::ExtractConfig;
use crate::dsp::{rms_series, Spectrogram};
use crate::energy::{self, to_dbfs, EnergySummary};
use crate::error::{AnalysisResult, Result};
use crate::loader::{load_bytes, load_path, Waveform};
use crate::record::{FeatureRecord, Key, Mode, SpectralStats};
use crate::spectral::SpectralSeries;
use crate::{fx, harmonic, silence, structure, tempo_key, vad};

/// Collects the names of detectors that fell back to defaults.
#[derive(Default)]
struct Degraded(Vec<String>);

impl Degraded {
    fn recover<T: Debug>(&mut self, stage: &'static str, result: AnalysisResult<T>, fallback: T) -> T {
        match result {
            Ok(v) => v,
            Err(err) => {
                warn!(stage, error = %err, fallback = ?fallback, "detector failed, using default");
                self.0.push(stage.to_string());
                fallback
            }
        }
    }
}

/// Validated configuration bound to the extraction entry points.
#[derive(Clone, Debug)]
pub struct FeatureExtractor {
    config: ExtractConfig,
}

impl FeatureExtractor {
    pub fn new(config: ExtractConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    pub fn extract_path(&self, path: impl AsRef<Path>) -> Result<FeatureRecord> {
        let wave = load_path(path)?;
        Ok(self.extract(&wave))
    }

    pub fn extract_bytes(&self, bytes: &[u8], ext_hint: Option<&str>) -> Result<FeatureRecord> {
        let wave = load_bytes(bytes, ext_hint)?;
        Ok(self.extract(&wave))
    }

    pub fn extract(&self, wave: &Waveform) -> FeatureRecord {
        let cfg = &self.config;
        let started = Instant::now();
        let samples = wave.samples();
        let sr = wave.sample_rate();
        let hop = cfg.frame.hop;
        let duration_sec = wave.duration_sec();
        let mut degraded = Degraded::default();

        let spec = Spectrogram::compute(samples, sr, cfg.frame.frame_size, hop);
        let times = spec.times();

        let series = SpectralSeries::compute(samples, &spec, &cfg.spectral);
        let spectral = degraded.recover("spectral", series.stats(), SpectralStats::default());

        let onset_env = tempo_key::onset_envelope(&spec);
        let tempo_bpm = degraded.recover("tempo", tempo_key::estimate_tempo(&onset_env, sr, hop, &cfg.tempo), 0.0);
        let chroma = tempo_key::chroma_profile(&spec, &cfg.spectral);
        let key = degraded.recover(
            "key",
            tempo_key::estimate_key(&chroma, &series.centroid, sr),
            Key { pitch_class: 0, mode: Mode::Major },
        );

        let rms = rms_series(samples, cfg.frame.frame_size, hop);
        let energy = degraded.recover(
            "energy",
            energy::summarize(&rms, sr, hop),
            EnergySummary { peak_rms_linear: 0.0, peak_rms_dbfs: to_dbfs(0.0), profile: Vec::new() },
        );
        let transients = energy::transients(&onset_env, sr, hop, &cfg.transients);
        let drop_timestamps = evenly_sample(&transients, cfg.caps.drops);

        let silence_segments = degraded.recover(
            "silence",
            silence::silence_threshold(&rms, &cfg.silence)
                .and_then(|thr| silence::segment(&rms, &times, duration_sec, thr, &cfg.silence)),
            Vec::new(),
        );

        let vocal_segments = degraded.recover("vad", vad::detect(samples, sr, &cfg.frame, &cfg.vad), Vec::new());
        let vocal_intensity =
            degraded.recover("harmonic", harmonic::vocal_intensity(samples, &spec, &cfg.harmonic).map(Some), None);

        let structure_segments = degraded.recover(
            "structure",
            structure::segment(&spec, duration_sec, &cfg.structure, cfg.caps.structure),
            Vec::new(),
        );
        let fx_events = degraded.recover("fx", fx::detect(&series, &times, &structure_segments, &cfg.fx), Vec::new());

        let record = bound_record(
            FeatureRecord {
                tempo_bpm,
                key,
                duration_sec,
                peak_rms_linear: energy.peak_rms_linear,
                peak_rms_dbfs: energy.peak_rms_dbfs,
                spectral,
                energy_profile: energy.profile,
                transients,
                silence_segments,
                vocal_intensity,
                vocal_segments,
                drop_timestamps,
                structure_segments,
                fx_events,
                degraded: degraded.0,
            },
            &cfg.caps,
        );

        info!(
            duration_sec,
            sample_rate = sr,
            tempo_bpm = record.tempo_bpm,
            key = %record.key,
            sections = record.structure_segments.len(),
            degraded = ?record.degraded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "features extracted"
        );
        record
    }
}

/// Extract with an explicit configuration.
pub fn extract(wave: &Waveform, config: &ExtractConfig) -> Result<FeatureRecord> {
    Ok(FeatureExtractor::new(config.clone())?.extract(wave))
}

pub fn extract_path(path: impl AsRef<Path>, config: &ExtractConfig) -> Result<FeatureRecord> {
    FeatureExtractor::new(config.clone())?.extract_path(path)
}

pub fn extract_bytes(bytes: &[u8], ext_hint: Option<&str>, config: &ExtractConfig) -> Result<FeatureRecord> {
    FeatureExtractor::new(config.clone())?.extract_bytes(bytes, ext_hint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AnalysisError, ExtractError};

    #[test]
    fn recover_records_stage_and_returns_fallback() {
        let mut d = Degraded::default();
        let ok: AnalysisResult<f32> = Ok(1.5);
        assert_eq!(d.recover("tempo", ok, 0.0), 1.5);
        let err: AnalysisResult<f32> = Err(AnalysisError::EmptySeries("tempo"));
        assert_eq!(d.recover("tempo", err, 0.0), 0.0);
        assert_eq!(d.0, vec!["tempo".to_string()]);
    }

    #[test]
    fn invalid_config_is_fatal() {
        let mut cfg = ExtractConfig::default();
        cfg.frame.hop = 0;
        let wave = Waveform::new(vec![0.0; 1000], 8000).unwrap();
        assert!(matches!(extract(&wave, &cfg), Err(ExtractError::InvalidConfig(_))));
    }

    #[test]
    fn short_noise_produces_bounded_record() {
        let mut seed = 99u32;
        let samples: Vec<f32> = (0..22_050)
            .map(|_| {
                seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
                ((seed >> 16) as f32 / 65535.0 - 0.5) * 0.5
            })
            .collect();
        let wave = Waveform::new(samples, 22_050).unwrap();
        let record = extract(&wave, &ExtractConfig::default()).unwrap();
        assert!((record.duration_sec - 1.0).abs() < 1e-6);
        assert!(record.energy_profile.len() <= 512);
        assert!(record.drop_timestamps.len() <= 5);
        assert_eq!(record.structure_segments.len(), 1);
        assert!(record.degraded.is_empty(), "degraded: {:?}", record.degraded);
    }
}
