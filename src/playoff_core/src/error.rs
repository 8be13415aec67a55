use thiserror::Error;

use crate::constants::{MAX_CACHE_TTL_SECS, MAX_SERIES_LENGTH};

/// Errors surfaced to callers of the simulation core.
///
/// Per-team problems (a missing rating, a short conference) are absorbed
/// where they occur; only bad parameters and an unreachable rating source
/// make it this far.
#[derive(Debug, Error)]
pub enum PlayoffError {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("rating source unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the persistence collaborator. Never propagated past the
/// service layer, which falls back to computing without the cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("cache serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PlayoffError>;

impl PlayoffError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        PlayoffError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    pub fn is_invalid_parameter(&self) -> bool {
        matches!(self, PlayoffError::InvalidParameter { .. })
    }
}

pub fn validate_sample_count(name: &'static str, count: usize) -> Result<()> {
    if count == 0 {
        return Err(PlayoffError::invalid(name, "must be at least 1"));
    }
    Ok(())
}

pub fn validate_simulation_count(count: usize, max: usize) -> Result<()> {
    validate_sample_count("simulation_count", count)?;
    if count > max {
        return Err(PlayoffError::invalid(
            "simulation_count",
            format!("{} exceeds the limit of {}", count, max),
        ));
    }
    Ok(())
}

pub fn validate_series_length(series_length: u32) -> Result<()> {
    if series_length == 0 || series_length % 2 == 0 {
        return Err(PlayoffError::invalid(
            "series_length",
            format!("must be a positive odd number, got {}", series_length),
        ));
    }
    if series_length > MAX_SERIES_LENGTH {
        return Err(PlayoffError::invalid(
            "series_length",
            format!("{} exceeds the limit of {}", series_length, MAX_SERIES_LENGTH),
        ));
    }
    Ok(())
}

pub fn validate_ttl(name: &'static str, secs: u64) -> Result<()> {
    if secs > MAX_CACHE_TTL_SECS {
        return Err(PlayoffError::invalid(
            name,
            format!("{}s exceeds the limit of {}s", secs, MAX_CACHE_TTL_SECS),
        ));
    }
    Ok(())
}

#[cfg(feature = "python")]
impl From<PlayoffError> for pyo3::PyErr {
    fn from(err: PlayoffError) -> Self {
        match err {
            PlayoffError::InvalidParameter { .. } | PlayoffError::Config(_) => {
                pyo3::exceptions::PyValueError::new_err(err.to_string())
            }
            PlayoffError::UpstreamUnavailable(_) | PlayoffError::Io(_) => {
                pyo3::exceptions::PyRuntimeError::new_err(err.to_string())
            }
        }
    }
}
