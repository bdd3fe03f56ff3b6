//! voxsync - revision-aware segment synchronization for streaming speech
//! translation.
//!
//! Routes revisioned chunks between the STT, translate and TTS stages,
//! resolves revisions per language, and releases segments only once every
//! target language has finalized them.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod app;
pub mod chunk;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod jitter;
pub mod pipeline;
pub mod resolver;
pub mod router;

// Chunk model
pub use chunk::{Chunk, ChunkHeader, Revisioned, SpeechChunk, Stage, TextChunk, TranslatedChunk};

// Synchronization components
pub use jitter::{FlushedSegment, JitterBuffer, StalledSegment};
pub use resolver::{Resolution, RevisionResolver};
pub use router::{SegmentState, StageRouter, StageState, SyncStatus};

// Pipeline
pub use pipeline::orchestrator::{Pipeline, PipelineConfig, PipelineHandle};
pub use pipeline::stage::{Synthesizer, Translator};

// Error handling
pub use error::{Result, SyncError};
pub use pipeline::error::{ErrorReporter, StationError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
