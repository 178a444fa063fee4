use std::net::SocketAddr;
use std::num::NonZeroUsize;

use anyhow::{Context, Result};
use track_requests::Limits;

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

#[derive(Clone, Copy, Debug)]
pub struct Settings {
    pub bind: SocketAddr,
    pub limits: Limits,
    /// Extractions allowed to run at once; each one occupies a blocking thread.
    pub max_concurrency: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let bind = std::env::var("TRACKCHECK_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
        let bind = bind.parse().with_context(|| format!("invalid TRACKCHECK_BIND={bind:?}"))?;

        let max_concurrency = match std::env::var("TRACKCHECK_MAX_CONCURRENCY") {
            Ok(raw) => raw
                .trim()
                .parse::<NonZeroUsize>()
                .with_context(|| format!("invalid TRACKCHECK_MAX_CONCURRENCY={raw:?}"))?
                .get(),
            Err(_) => std::thread::available_parallelism().map(NonZeroUsize::get).unwrap_or(1),
        };

        Ok(Self { bind, limits: Limits::from_env()?, max_concurrency })
    }
}
