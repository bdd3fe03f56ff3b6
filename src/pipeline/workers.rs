//! Stage loops driven by the router.
//!
//! Each loop pulls from its router queue until the end-of-stream marker,
//! then propagates its own marker downstream so fan-out consumers terminate
//! as well. A fatal collaborator error stops the loop early but still
//! propagates the marker.

use crate::chunk::{SpeechChunk, Stage, TranslatedChunk};
use crate::error::{Result, SyncError};
use crate::jitter::{FlushedSegment, JitterBuffer};
use crate::pipeline::error::{ErrorReporter, StationError};
use crate::pipeline::stage::{Synthesizer, Translator};
use crate::resolver::{Resolution, RevisionResolver};
use crate::router::StageRouter;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Counters for one stage loop run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageStats {
    /// Chunks pulled from the input queue.
    pub received: usize,
    /// Chunks submitted downstream.
    pub emitted: usize,
    /// Recoverable failures replaced by an empty chunk.
    pub degraded: usize,
    /// Whether the loop stopped on a fatal error.
    pub aborted: bool,
}

/// Translates every STT chunk into each of `target_langs`.
///
/// A recoverable failure still emits an empty translation for that
/// revision, so no language is left without a chunk for the segment.
pub async fn run_translate_stage(
    router: Arc<StageRouter>,
    translator: Arc<dyn Translator>,
    target_langs: Vec<String>,
    reporter: Arc<dyn ErrorReporter>,
) -> Result<StageStats> {
    let mut stats = StageStats::default();

    'stream: while let Some(chunk) = router.receive(Stage::Stt, None).await? {
        let Some(text) = chunk.into_text() else {
            continue;
        };
        stats.received += 1;

        for lang in &target_langs {
            let translated = match translator.translate(&text, lang).await {
                Ok(translated) => translated,
                Err(StationError::Recoverable(msg)) => {
                    reporter.report("translate", &StationError::Recoverable(msg));
                    stats.degraded += 1;
                    String::new()
                }
                Err(fatal @ StationError::Fatal(_)) => {
                    reporter.report("translate", &fatal);
                    stats.aborted = true;
                    break 'stream;
                }
            };
            let out = TranslatedChunk::new(text.header, translated, lang.as_str());
            router.submit(Stage::Translate, out.into())?;
            stats.emitted += 1;
        }
    }

    router.submit_end(Stage::Translate, None)?;
    tracing::debug!(translator = translator.name(), ?stats, "translate stage finished");
    Ok(stats)
}

/// Synthesizes translated chunks for one language.
pub async fn run_tts_stage(
    router: Arc<StageRouter>,
    lang: String,
    synthesizer: Arc<dyn Synthesizer>,
    reporter: Arc<dyn ErrorReporter>,
) -> Result<StageStats> {
    let mut stats = StageStats::default();
    let stage_name = format!("tts/{lang}");

    while let Some(chunk) = router.receive(Stage::Translate, Some(&lang)).await? {
        let Some(translated) = chunk.into_translated() else {
            continue;
        };
        stats.received += 1;

        let audio = match synthesizer.synthesize(&translated).await {
            Ok(audio) => audio,
            Err(StationError::Recoverable(msg)) => {
                reporter.report(&stage_name, &StationError::Recoverable(msg));
                stats.degraded += 1;
                Vec::new()
            }
            Err(fatal @ StationError::Fatal(_)) => {
                reporter.report(&stage_name, &fatal);
                stats.aborted = true;
                break;
            }
        };
        let out = SpeechChunk::new(translated.header, audio, lang.as_str());
        router.submit(Stage::Tts, out.into())?;
        stats.emitted += 1;
    }

    router.submit_end(Stage::Tts, Some(&lang))?;
    tracing::debug!(stage = %stage_name, ?stats, "tts stage finished");
    Ok(stats)
}

/// Feeds every language's TTS output into `buffer` and sends released
/// segments to `output`.
///
/// The buffer is owned by this loop alone; per-language forwarders only pass
/// chunks to it. Returns the buffer once every language has ended, so the
/// caller can inspect anything left unreleased.
pub async fn run_aligned_playback(
    router: Arc<StageRouter>,
    mut buffer: JitterBuffer,
    output: mpsc::UnboundedSender<FlushedSegment>,
) -> Result<JitterBuffer> {
    let (tx, mut rx) = mpsc::unbounded_channel::<(String, Option<SpeechChunk>)>();
    let mut forwarders = JoinSet::new();

    for lang in buffer.languages().map(str::to_string) {
        let router = router.clone();
        let tx = tx.clone();
        forwarders.spawn(async move {
            while let Some(chunk) = router.receive(Stage::Tts, Some(&lang)).await? {
                if let Some(speech) = chunk.into_speech()
                    && tx.send((lang.clone(), Some(speech))).is_err()
                {
                    return Ok(());
                }
            }
            if tx.send((lang, None)).is_err() {
                tracing::debug!("aligned playback already stopped");
            }
            Ok::<(), SyncError>(())
        });
    }
    drop(tx);

    let mut open = forwarders.len();
    while open > 0 {
        let Some((lang, item)) = rx.recv().await else {
            break;
        };
        let Some(chunk) = item else {
            open -= 1;
            continue;
        };
        for segment in buffer.process(&lang, chunk)? {
            tracing::debug!(segment_id = segment.segment_id, "segment released");
            if output.send(segment).is_err() {
                tracing::warn!("playback consumer dropped");
            }
        }
    }

    while let Some(joined) = forwarders.join_next().await {
        joined.map_err(|e| SyncError::Stage {
            stage: "playback".to_string(),
            message: e.to_string(),
        })??;
    }

    if let Some(stalled) = buffer.stalled_head() {
        tracing::warn!(
            segment_id = stalled.segment_id,
            missing = ?stalled.missing,
            unfinalized = ?stalled.unfinalized,
            "stream ended with unreleased segments"
        );
    }
    Ok(buffer)
}

/// Resolves one language's TTS output without cross-language alignment.
///
/// Returns the resolver at end of stream; `ordered()` gives playback order.
pub async fn run_resolved_playback(
    router: Arc<StageRouter>,
    lang: String,
) -> Result<RevisionResolver> {
    let mut resolver = RevisionResolver::new();

    while let Some(chunk) = router.receive(Stage::Tts, Some(&lang)).await? {
        let Some(speech) = chunk.into_speech() else {
            continue;
        };
        if let Resolution::Replaced { superseded } = resolver.process(speech) {
            tracing::debug!(
                lang = %lang,
                segment_id = superseded.header.segment_id,
                revision = superseded.header.revision,
                "fading out superseded revision"
            );
        }
    }
    Ok(resolver)
}
