//! Error types for voxsync.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    // Structural misuse
    #[error("Unknown language: {lang}")]
    UnknownLanguage { lang: String },

    #[error("Unknown stage: {name}")]
    UnknownStage { name: String },

    #[error("Stage {stage} does not accept {found} chunks")]
    StageMismatch { stage: String, found: String },

    #[error("Stage {stage} requires a language")]
    MissingLanguage { stage: String },

    #[error("Jitter buffer needs at least one language")]
    NoLanguages,

    // Configuration errors
    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Collaborator failures surfaced by stage loops
    #[error("{stage} stage failed: {message}")]
    Stage { stage: String, message: String },

    // Replay input
    #[error("Line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
