use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Feil fra henting av rader (RecordSource).
/// Ingen av disse caches – neste kall prøver på nytt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Nett/auth/timeout – forbigående
    #[error("record source unavailable: {0}")]
    SourceUnavailable(String),
    /// Kilden avviste selve spørringen (ukjent ark, feil format, manglende kolonne)
    #[error("query rejected by record source: {0}")]
    QueryError(String),
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::SourceUnavailable(_))
    }
}

/// Defekt på én rad. Flagges på raden, stopper aldri resten av datasettet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum ShapeError {
    #[error("speed is zero, duration undefined")]
    ZeroSpeed,
    #[error("speed is negative or not finite")]
    InvalidSpeed,
    #[error("distance is negative or not finite")]
    InvalidDistance,
    #[error("average heart rate missing")]
    MissingHeartRate,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse error in config at {path}: {message}")]
    Parse { path: String, message: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}
