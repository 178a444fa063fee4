//! Flat payload handed to the prompt-assembly step.

use serde::{Deserialize, Serialize};
use track_features::{EnergyPoint, FeatureRecord, FxEvent, SilenceSegment, StructureSegment, VocalSegment};

pub const STRUCTURE_NOTE: &str = "Segmented via novelty curve; labels are heuristic.";

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeakRms {
    pub linear: f32,
    pub dbfs: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedbackMetadata {
    pub tempo: f32,
    pub key: String,
    pub duration: f32,
    pub peak_rms: PeakRms,

    pub centroid: f32,
    pub rolloff: f32,
    pub bandwidth: f32,
    pub flatness: f32,

    pub energy_profile: Vec<EnergyPoint>,
    pub transients_info: Vec<f32>,
    pub silence_segments: Vec<SilenceSegment>,

    pub vocal_timestamps: Vec<VocalSegment>,
    pub vocal_intensity: Option<f32>,

    pub drop_timestamps: Vec<f32>,
    pub structure_segments: Vec<StructureSegment>,
    pub structure: String,
    pub fx_and_transitions: Vec<FxEvent>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<String>,
}

impl From<FeatureRecord> for FeedbackMetadata {
    fn from(r: FeatureRecord) -> Self {
        Self {
            tempo: r.tempo_bpm,
            key: r.key.to_string(),
            duration: r.duration_sec,
            peak_rms: PeakRms { linear: r.peak_rms_linear, dbfs: r.peak_rms_dbfs },
            centroid: r.spectral.centroid_hz,
            rolloff: r.spectral.rolloff_hz,
            bandwidth: r.spectral.bandwidth_hz,
            flatness: r.spectral.flatness,
            energy_profile: r.energy_profile,
            transients_info: r.transients,
            silence_segments: r.silence_segments,
            vocal_timestamps: r.vocal_segments,
            vocal_intensity: r.vocal_intensity,
            drop_timestamps: r.drop_timestamps,
            structure_segments: r.structure_segments,
            structure: STRUCTURE_NOTE.to_string(),
            fx_and_transitions: r.fx_events,
            degraded: r.degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use track_features::{Activity, FxKind, Key, Mode, SectionLabel, SpectralStats};

    fn record() -> FeatureRecord {
        FeatureRecord {
            tempo_bpm: 124.0,
            key: Key { pitch_class: 9, mode: Mode::Minor },
            duration_sec: 12.5,
            peak_rms_linear: 0.5,
            peak_rms_dbfs: -6.02,
            spectral: SpectralStats { centroid_hz: 1800.0, rolloff_hz: 4200.0, bandwidth_hz: 1500.0, flatness: 0.02 },
            energy_profile: vec![EnergyPoint { t: 0.0, rms: 0.1 }],
            transients: vec![0.5, 1.0],
            silence_segments: vec![SilenceSegment { start: 0.0, end: 12.5, label: Activity::Active }],
            vocal_intensity: Some(0.07),
            vocal_segments: vec![VocalSegment { start: 2.0, end: 3.5 }],
            drop_timestamps: vec![0.5],
            structure_segments: vec![StructureSegment {
                start: 0.0,
                end: 12.5,
                label: SectionLabel::Section,
                energy: 3.0,
            }],
            fx_events: vec![FxEvent { t: 12.5, kind: FxKind::Riser, confidence: 0.6 }],
            degraded: Vec::new(),
        }
    }

    #[test]
    fn flattens_record_into_prompt_keys() {
        let meta = FeedbackMetadata::from(record());
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["key"], "A minor");
        assert_eq!(json["peak_rms"]["linear"], 0.5);
        assert_eq!(json["transients_info"].as_array().unwrap().len(), 2);
        assert_eq!(json["vocal_timestamps"][0]["end"], 3.5);
        assert_eq!(json["structure_segments"][0]["label"], "section");
        assert_eq!(json["fx_and_transitions"][0]["type"], "riser");
        assert_eq!(json["structure"], STRUCTURE_NOTE);
        assert!(json.get("degraded").is_none());
    }

    #[test]
    fn degraded_detectors_are_reported() {
        let mut r = record();
        r.degraded.push("vad".into());
        r.vocal_segments.clear();
        let json = serde_json::to_value(FeedbackMetadata::from(r)).unwrap();
        assert_eq!(json["degraded"][0], "vad");
        assert!(json["vocal_timestamps"].as_array().unwrap().is_empty());
    }
}
