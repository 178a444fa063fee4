use thiserror::Error;

/// Fatal failures: nothing downstream is meaningful without a waveform.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("decoded audio contains no samples")]
    EmptyAudio,

    #[error("invalid extraction config: {0}")]
    InvalidConfig(String),

    #[error("failed to read audio source: {0}")]
    Io(#[from] std::io::Error),
}

impl From<symphonia::core::errors::Error> for ExtractError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        ExtractError::Decode(err.to_string())
    }
}

impl From<hound::Error> for ExtractError {
    fn from(err: hound::Error) -> Self {
        ExtractError::Decode(err.to_string())
    }
}

/// Failure inside one detector. The pipeline downgrades these to defaults
/// instead of aborting the whole extraction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("{0}: series is empty")]
    EmptySeries(&'static str),

    #[error("{0}: produced a non-finite value")]
    NonFinite(&'static str),

    #[error("{stage}: {reason}")]
    Degenerate { stage: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, ExtractError>;
pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;
