//! Error types shared across Beatcut crates.

use std::path::PathBuf;

/// Top-level error type for Beatcut operations.
#[derive(Debug, thiserror::Error)]
pub enum BeatcutError {
    #[error("Acquisition error: {message}")]
    Acquisition { message: String },

    #[error("Audio analysis error: {message}")]
    Analysis { message: String },

    #[error("Planning error: {message}")]
    Planning { message: String },

    #[error("Clip generation error: {message}")]
    ClipGeneration { message: String },

    #[error("Compose error: {message}")]
    Compose { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Upload error: {message}")]
    Upload { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

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

/// Result type alias using BeatcutError.
pub type BeatcutResult<T> = Result<T, BeatcutError>;

impl BeatcutError {
    pub fn acquisition(msg: impl Into<String>) -> Self {
        Self::Acquisition {
            message: msg.into(),
        }
    }

    pub fn analysis(msg: impl Into<String>) -> Self {
        Self::Analysis {
            message: msg.into(),
        }
    }

    pub fn planning(msg: impl Into<String>) -> Self {
        Self::Planning {
            message: msg.into(),
        }
    }

    pub fn clip_generation(msg: impl Into<String>) -> Self {
        Self::ClipGeneration {
            message: msg.into(),
        }
    }

    pub fn compose(msg: impl Into<String>) -> Self {
        Self::Compose {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn upload(msg: impl Into<String>) -> Self {
        Self::Upload {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }
}
