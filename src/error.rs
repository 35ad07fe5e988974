//! Error types for each stage of the subtitle pipeline.
//!
//! Only [`PipelineError`] ever aborts a run. The stage errors are consumed by
//! their workers and turned into counter updates or fallback strings.

use std::path::PathBuf;
use thiserror::Error;

/// Run-level failures
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No healthy transcription backend among {probed} probed address(es)")]
    NoHealthyBackend { probed: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failure of one video's transcription call
#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("Failed to read video {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned status {0}")]
    Status(u16),

    #[error("Backend reported an unsuccessful transcription")]
    Rejected,

    #[error("Malformed transcription response: {0}")]
    Malformed(String),

    #[error("Transcription produced no segments")]
    NoSegments,
}

/// Failure of one segment's translation call
#[derive(Error, Debug)]
pub enum TranslationError {
    #[error("Translation transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Translation timed out after {0}s")]
    Timeout(u64),

    #[error("Translation service returned HTTP {0}")]
    Status(u16),

    #[error("Translation service returned responseStatus {0}")]
    Rejected(i64),

    #[error("Translation service returned a quota warning")]
    Warning,

    #[error("Malformed translation response: {0}")]
    Malformed(String),
}

impl TranslationError {
    /// Errors where the service never produced an answer at all
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

/// Failure to write a sidecar document
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cannot fingerprint {path}: {source}")]
    Fingerprint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Sidecar path has no parent directory: {0}")]
    NoParent(PathBuf),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
