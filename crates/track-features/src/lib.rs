//! Bounded audio feature extraction.
//!
//! Decode once, compute a shared spectrogram, run the lightweight detectors
//! (spectral statistics, tempo/key, energy and transients, silence, voice
//! activity, harmonic intensity, structure, transitions) and cap every
//! list-valued output so the record size does not grow with track length.

pub mod bound;
pub mod config;
pub mod dsp;
pub mod energy;
pub mod error;
pub mod fx;
pub mod harmonic;
pub mod loader;
pub mod pipeline;
pub mod record;
pub mod silence;
pub mod spectral;
pub mod structure;
pub mod tempo_key;
pub mod vad;

pub use bound::{bound_record, evenly_sample};
pub use config::ExtractConfig;
pub use error::{AnalysisError, ExtractError, Result};
pub use loader::{load_bytes, load_path, Waveform};
pub use pipeline::{extract, extract_bytes, extract_path, FeatureExtractor};
pub use record::{
    Activity, EnergyPoint, FeatureRecord, FxEvent, FxKind, Key, Mode, SectionLabel, SilenceSegment, SpectralStats,
    StructureSegment, VocalSegment,
};
