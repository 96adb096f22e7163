//! Error type for configuration and enrollment operations.
//!
//! Per-frame processing never returns these: a bad frame is a detection miss
//! and is recovered by the tracker itself.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading configuration or enrollment data.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("profile `{0}` has an empty reference embedding")]
    EmptyEmbedding(String),

    #[error("no face found in enrollment image {0}")]
    NoFaceFound(PathBuf),

    #[error("unknown profile `{0}`")]
    UnknownProfile(String),

    #[error("face encoder failed on {path}: {message}")]
    Encoder { path: PathBuf, message: String },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
