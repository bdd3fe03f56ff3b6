//! Streaming translation pipeline built on the stage router.
//!
//! ```text
//! STT ──▶ translate ──┬──▶ TTS(en) ──┐
//!                     └──▶ TTS(fr) ──┴──▶ jitter buffer ──▶ aligned segments
//! ```
//!
//! Each stage is a tokio task that pulls from the router until it sees the
//! end-of-stream marker.

pub mod error;
pub mod orchestrator;
pub mod stage;
pub mod workers;

pub use error::{ErrorReporter, LogReporter, StationError};
pub use orchestrator::{Pipeline, PipelineConfig, PipelineHandle, PipelineSummary};
pub use stage::{MockSynthesizer, MockTranslator, Synthesizer, Translator};
pub use workers::{
    StageStats, run_aligned_playback, run_resolved_playback, run_translate_stage, run_tts_stage,
};
