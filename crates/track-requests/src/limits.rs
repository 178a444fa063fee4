use std::path::Path;

use anyhow::{Context, Result};
use thiserror::Error;

/// File extensions accepted for upload, lowercase, without the dot.
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["wav", "mp3", "flac", "m4a", "ogg"];

pub const DEFAULT_MAX_FILE_MB: u64 = 100;
pub const DEFAULT_MAX_DURATION_SEC: f32 = 420.0;

/// Upload rejections. Kept as a concrete type so callers can downcast from
/// `anyhow::Error` and pick a status code.
#[derive(Debug, Error, PartialEq)]
pub enum LimitError {
    #[error("unsupported audio type: {0:?}")]
    UnsupportedExtension(Option<String>),

    #[error("file is {size} bytes, limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("audio is {duration:.1}s long, limit is {limit:.0}s")]
    TooLong { duration: f32, limit: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Limits {
    pub max_file_bytes: u64,
    pub max_duration_sec: f32,
}

impl Default for Limits {
    fn default() -> Self {
        Self { max_file_bytes: DEFAULT_MAX_FILE_MB * 1024 * 1024, max_duration_sec: DEFAULT_MAX_DURATION_SEC }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().with_context(|| format!("invalid {key}={raw:?}")),
        Err(_) => Ok(default),
    }
}

impl Limits {
    /// `TRACKCHECK_MAX_FILE_MB` and `TRACKCHECK_MAX_DURATION_SEC`, falling back to the defaults.
    pub fn from_env() -> Result<Self> {
        let mb: u64 = env_or("TRACKCHECK_MAX_FILE_MB", DEFAULT_MAX_FILE_MB)?;
        let secs: f32 = env_or("TRACKCHECK_MAX_DURATION_SEC", DEFAULT_MAX_DURATION_SEC)?;
        Ok(Self { max_file_bytes: mb * 1024 * 1024, max_duration_sec: secs })
    }

    pub fn check_size(&self, size: u64) -> Result<(), LimitError> {
        if size > self.max_file_bytes {
            return Err(LimitError::TooLarge { size, limit: self.max_file_bytes });
        }
        Ok(())
    }

    pub fn check_duration(&self, duration: f32) -> Result<(), LimitError> {
        if duration > self.max_duration_sec {
            return Err(LimitError::TooLong { duration, limit: self.max_duration_sec });
        }
        Ok(())
    }
}

/// Lowercased extension of `name` if it is one of [`ALLOWED_EXTENSIONS`].
pub fn audio_extension(name: &str) -> Result<String, LimitError> {
    let ext = Path::new(name).extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    match ext {
        Some(e) if ALLOWED_EXTENSIONS.contains(&e.as_str()) => Ok(e),
        other => Err(LimitError::UnsupportedExtension(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_are_case_insensitive() {
        assert_eq!(audio_extension("Mix_v3.WAV"), Ok("wav".to_string()));
        assert_eq!(audio_extension("/tmp/a.b/track.m4a"), Ok("m4a".to_string()));
    }

    #[test]
    fn rejects_unknown_or_missing_extension() {
        assert_eq!(audio_extension("notes.txt"), Err(LimitError::UnsupportedExtension(Some("txt".into()))));
        assert_eq!(audio_extension("README"), Err(LimitError::UnsupportedExtension(None)));
    }

    #[test]
    fn size_and_duration_limits() {
        let limits = Limits::default();
        assert_eq!(limits.max_file_bytes, 100 * 1024 * 1024);
        assert!(limits.check_size(100 * 1024 * 1024).is_ok());
        assert!(matches!(limits.check_size(100 * 1024 * 1024 + 1), Err(LimitError::TooLarge { .. })));
        assert!(limits.check_duration(420.0).is_ok());
        assert!(matches!(limits.check_duration(420.5), Err(LimitError::TooLong { .. })));
    }
}
