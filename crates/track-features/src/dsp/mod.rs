//! Signal-processing primitives shared by the analysis stages.

pub mod filter;
pub mod frames;
pub mod peaks;
pub mod stats;
pub mod stft;

pub use filter::{resample_linear, BiquadCascade};
pub use frames::{frame_count, frame_time, hann, rms_series, search_sorted, zcr_series};
pub use peaks::peak_pick;
pub use stats::{mean, percentile, slope};
pub use stft::Spectrogram;
