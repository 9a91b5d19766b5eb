//! Error types shared across Scenecast crates.
//!
//! The variants follow the pipeline's failure taxonomy: configuration
//! errors abort before anything is written, synthesis errors are scoped to
//! a single line and recovered by the caller, capture and merge errors are
//! fatal to the run.

use std::path::PathBuf;

/// Top-level error type for Scenecast operations.
#[derive(Debug, thiserror::Error)]
pub enum ScenecastError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Synthesis failed for scene {scene} line {line}: {message}")]
    Synthesis {
        scene: usize,
        line: usize,
        message: String,
    },

    #[error("Capture error in chunk {chunk}: {message}")]
    Capture { chunk: usize, message: String },

    #[error("Merge error: {message}")]
    Merge { message: String },

    #[error("Waveform error: {message}")]
    Waveform { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ScenecastError.
pub type ScenecastResult<T> = Result<T, ScenecastError>;

impl ScenecastError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn synthesis(scene: usize, line: usize, msg: impl Into<String>) -> Self {
        Self::Synthesis {
            scene,
            line,
            message: msg.into(),
        }
    }

    pub fn capture(chunk: usize, msg: impl Into<String>) -> Self {
        Self::Capture {
            chunk,
            message: msg.into(),
        }
    }

    pub fn merge(msg: impl Into<String>) -> Self {
        Self::Merge {
            message: msg.into(),
        }
    }

    pub fn waveform(msg: impl Into<String>) -> Self {
        Self::Waveform {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether the error is scoped to a single line and may be skipped.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Synthesis { .. })
    }
}
