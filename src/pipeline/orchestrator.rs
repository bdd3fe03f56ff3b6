//! Wires the stage loops into one aligned translation pipeline.

use crate::chunk::{Stage, TextChunk};
use crate::error::{Result, SyncError};
use crate::jitter::{FlushedSegment, JitterBuffer};
use crate::pipeline::error::{ErrorReporter, LogReporter};
use crate::pipeline::stage::{Synthesizer, Translator};
use crate::pipeline::workers::{
    StageStats, run_aligned_playback, run_translate_stage, run_tts_stage,
};
use crate::router::{StageRouter, SyncStatus};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Configuration for the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Target languages; fixed for the pipeline's lifetime.
    pub target_langs: Vec<String>,
}

/// Result of a finished pipeline run.
#[derive(Debug)]
pub struct PipelineSummary {
    pub translate: StageStats,
    pub tts: Vec<(String, StageStats)>,
    /// Jitter buffer at end of stream, holding anything never released.
    pub buffer: JitterBuffer,
}

/// Aligned STT → translate → TTS pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    error_reporter: Arc<dyn ErrorReporter>,
}

impl Pipeline {
    /// Creates a new pipeline with the default error reporter.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            error_reporter: Arc::new(LogReporter),
        }
    }

    /// Sets a custom error reporter.
    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }

    /// Spawns the translate stage, one TTS stage per language and the
    /// aligned playback loop on the current tokio runtime.
    ///
    /// # Errors
    /// `SyncError::NoLanguages` if no target language is configured.
    pub fn start(
        self,
        translator: Arc<dyn Translator>,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> Result<PipelineHandle> {
        let buffer = JitterBuffer::new(self.config.target_langs.iter().cloned())?;
        let router = Arc::new(StageRouter::new(&self.config.target_langs));
        let (segments_tx, segments_rx) = mpsc::unbounded_channel();

        let translate = tokio::spawn(run_translate_stage(
            router.clone(),
            translator,
            self.config.target_langs.clone(),
            self.error_reporter.clone(),
        ));

        let tts = self
            .config
            .target_langs
            .iter()
            .map(|lang| {
                let handle = tokio::spawn(run_tts_stage(
                    router.clone(),
                    lang.clone(),
                    synthesizer.clone(),
                    self.error_reporter.clone(),
                ));
                (lang.clone(), handle)
            })
            .collect();

        let playback = tokio::spawn(run_aligned_playback(
            router.clone(),
            buffer,
            segments_tx,
        ));

        tracing::info!(languages = ?self.config.target_langs, "pipeline started");
        Ok(PipelineHandle {
            router,
            segments: segments_rx,
            translate,
            tts,
            playback,
        })
    }
}

/// Handle to a running pipeline.
pub struct PipelineHandle {
    router: Arc<StageRouter>,
    segments: mpsc::UnboundedReceiver<FlushedSegment>,
    translate: JoinHandle<Result<StageStats>>,
    tts: Vec<(String, JoinHandle<Result<StageStats>>)>,
    playback: JoinHandle<Result<JitterBuffer>>,
}

impl PipelineHandle {
    /// Feeds one STT revision into the pipeline.
    pub fn submit(&self, chunk: TextChunk) -> Result<()> {
        self.router.submit(Stage::Stt, chunk.into())
    }

    /// Signals that STT produced its last chunk.
    pub fn finish(&self) -> Result<()> {
        self.router.submit_end(Stage::Stt, None)
    }

    /// Next segment released in every language, or `None` once playback
    /// has ended.
    pub async fn next_segment(&mut self) -> Option<FlushedSegment> {
        self.segments.recv().await
    }

    pub fn status(&self) -> SyncStatus {
        self.router.status()
    }

    pub fn router(&self) -> &Arc<StageRouter> {
        &self.router
    }

    /// Waits for every stage to end. Call [`finish`](Self::finish) first.
    pub async fn join(self) -> Result<PipelineSummary> {
        let translate = join_stage("translate", self.translate).await?;
        let mut tts = Vec::with_capacity(self.tts.len());
        for (lang, handle) in self.tts {
            let stats = join_stage(&format!("tts/{lang}"), handle).await?;
            tts.push((lang, stats));
        }
        let buffer = join_stage("playback", self.playback).await?;
        Ok(PipelineSummary {
            translate,
            tts,
            buffer,
        })
    }
}

async fn join_stage<T>(stage: &str, handle: JoinHandle<Result<T>>) -> Result<T> {
    handle.await.map_err(|e| SyncError::Stage {
        stage: stage.to_string(),
        message: e.to_string(),
    })?
}
