//! Error types and reporting for pipeline stages.

use std::fmt;

/// Failure reported by an external collaborator (translator, synthesizer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationError {
    /// The chunk is skipped; the stage keeps running.
    Recoverable(String),
    /// The stage stops and propagates end of stream downstream.
    Fatal(String),
}

impl fmt::Display for StationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StationError::Recoverable(msg) => write!(f, "Recoverable error: {}", msg),
            StationError::Fatal(msg) => write!(f, "Fatal error: {}", msg),
        }
    }
}

impl std::error::Error for StationError {}

/// Trait for reporting stage errors.
pub trait ErrorReporter: Send + Sync {
    /// Reports an error from a stage (`"translate"`, `"tts/en"`, ...).
    fn report(&self, stage: &str, error: &StationError);
}

/// Reporter that forwards to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, stage: &str, error: &StationError) {
        match error {
            StationError::Recoverable(msg) => tracing::warn!(stage, "{}", msg),
            StationError::Fatal(msg) => tracing::error!(stage, "{}", msg),
        }
    }
}
