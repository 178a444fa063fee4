//! The feature record emitted once per extraction, plus its element types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectralStats {
    pub centroid_hz: f32,
    pub rolloff_hz: f32,
    pub bandwidth_hz: f32,
    pub flatness: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnergyPoint {
    pub t: f32,
    pub rms: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    Active,
    Silence,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SilenceSegment {
    pub start: f32,
    pub end: f32,
    pub label: Activity,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VocalSegment {
    pub start: f32,
    pub end: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionLabel {
    Breakdown,
    Build,
    Section,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructureSegment {
    pub start: f32,
    pub end: f32,
    pub label: SectionLabel,
    pub energy: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FxKind {
    Riser,
    Glitch,
    Reverse,
    Sweep,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FxEvent {
    pub t: f32,
    #[serde(rename = "type")]
    pub kind: FxKind,
    pub confidence: f32,
}

const PITCH_CLASSES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Major,
    Minor,
}

/// Tonic pitch class (0 = C) plus a coarse mode guess. Serialized as e.g. `"A minor"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Key {
    pub pitch_class: u8,
    pub mode: Mode,
}

impl Key {
    pub fn tonic_name(&self) -> &'static str {
        PITCH_CLASSES[(self.pitch_class % 12) as usize]
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            Mode::Major => "major",
            Mode::Minor => "minor",
        };
        write!(f, "{} {}", self.tonic_name(), mode)
    }
}

impl FromStr for Key {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tonic, mode) = s.split_once(' ').ok_or_else(|| format!("malformed key: {s}"))?;
        let pitch_class = PITCH_CLASSES
            .iter()
            .position(|&p| p == tonic)
            .ok_or_else(|| format!("unknown tonic: {tonic}"))? as u8;
        let mode = match mode {
            "major" => Mode::Major,
            "minor" => Mode::Minor,
            other => return Err(format!("unknown mode: {other}")),
        };
        Ok(Key { pitch_class, mode })
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Everything extracted from one waveform. Immutable once the pipeline returns it.
///
/// `degraded` names the detectors that failed and fell back to their defaults
/// (empty sequences, `None` intensity, zero scalars).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub tempo_bpm: f32,
    pub key: Key,
    pub duration_sec: f32,
    pub peak_rms_linear: f32,
    pub peak_rms_dbfs: f32,
    pub spectral: SpectralStats,
    pub energy_profile: Vec<EnergyPoint>,
    pub transients: Vec<f32>,
    pub silence_segments: Vec<SilenceSegment>,
    pub vocal_intensity: Option<f32>,
    pub vocal_segments: Vec<VocalSegment>,
    pub drop_timestamps: Vec<f32>,
    pub structure_segments: Vec<StructureSegment>,
    pub fx_events: Vec<FxEvent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<String>,
}
