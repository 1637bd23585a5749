//! Shared error types for the application

use crate::services::{ServiceError, VcsError};
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for codesteward operations
#[derive(Debug, Error)]
pub enum Error {
    /// Per-file parse failure; isolated, never aborts a run
    #[error("parse error in {file}: {message}")]
    Parse { file: PathBuf, message: String },

    /// Generative synthesis failure, after retries were exhausted
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Version-control failure
    #[error(transparent)]
    Vcs(#[from] VcsError),

    /// Artifact store publish failure
    #[error("artifact store error: {message}")]
    Store {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Requested artifact key does not exist
    #[error("artifact not found: {0}")]
    ArtifactMissing(String),

    /// A pipeline stage failed; the run halts here
    #[error("stage {stage} failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<Error>,
    },

    /// Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The run was cancelled before the snapshot was published
    #[error("run cancelled")]
    Cancelled,

    /// IO errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a parse error for a unit
    pub fn parse(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Create a store error with an underlying IO cause
    pub fn store(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Store {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Attribute an error to a pipeline stage
    pub fn in_stage(self, stage: &'static str) -> Self {
        Self::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// The stage a failure occurred in, when known
    pub fn failing_stage(&self) -> Option<&'static str> {
        match self {
            Self::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }
}

/// Result type alias using our error type
pub type Result<T> = std::result::Result<T, Error>;
