//! Stage router: per-stage queues between pipeline stages.
//!
//! ```text
//!  STT ──▶ [stt] ──▶ translate ──▶ [translate/en] ──▶ TTS(en) ──▶ [tts/en] ──▶ playback
//!                              └─▶ [translate/fr] ──▶ TTS(fr) ──▶ [tts/fr] ──┘
//! ```
//!
//! Queues are unbounded and FIFO; the router never reorders or drops chunks.
//! Ordering correctness belongs to the resolver and the jitter buffer.
//! Every submission also updates a per-segment status table that can be
//! snapshotted at any time for observability.

use crate::chunk::{Chunk, Revisioned, Stage};
use crate::error::{Result, SyncError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// `None` marks end of stream.
type Message = Option<Chunk>;

/// Latest revision seen for one (segment, stage, language).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StageState {
    pub revision: u32,
    pub timestamp_ms: u64,
    pub is_final: bool,
}

impl StageState {
    fn of(chunk: &Chunk) -> Self {
        Self {
            revision: chunk.revision(),
            timestamp_ms: chunk.timestamp_ms(),
            is_final: chunk.is_final(),
        }
    }
}

/// State of a single segment across all stages.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SegmentState {
    pub stt: Option<StageState>,
    pub translations: BTreeMap<String, StageState>,
    pub tts: BTreeMap<String, StageState>,
}

impl SegmentState {
    fn apply(&mut self, chunk: &Chunk) {
        let state = StageState::of(chunk);
        match chunk {
            Chunk::Text(_) => self.stt = Some(state),
            Chunk::Translated(c) => {
                self.translations.insert(c.lang.clone(), state);
            }
            Chunk::Speech(c) => {
                self.tts.insert(c.lang.clone(), state);
            }
        }
    }

    /// Whether `stage` has reported a final revision for `lang`.
    pub fn is_final(&self, stage: Stage, lang: Option<&str>) -> bool {
        let state = match (stage, lang) {
            (Stage::Stt, _) => self.stt.as_ref(),
            (Stage::Translate, Some(lang)) => self.translations.get(lang),
            (Stage::Tts, Some(lang)) => self.tts.get(lang),
            (_, None) => None,
        };
        state.is_some_and(|s| s.is_final)
    }
}

/// Point-in-time copy of every segment's state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SyncStatus {
    pub segments: BTreeMap<u64, SegmentState>,
}

impl SyncStatus {
    pub fn get(&self, segment_id: u64) -> Option<&SegmentState> {
        self.segments.get(&segment_id)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    stage: Stage,
    lang: Option<String>,
}

impl QueueKey {
    fn new(stage: Stage, lang: Option<&str>) -> Result<Self> {
        if !stage.is_per_language() {
            return Ok(Self { stage, lang: None });
        }
        let lang = lang.ok_or_else(|| SyncError::MissingLanguage {
            stage: stage.to_string(),
        })?;
        Ok(Self {
            stage,
            lang: Some(lang.to_string()),
        })
    }
}

struct Queue {
    tx: UnboundedSender<Message>,
    rx: Arc<tokio::sync::Mutex<UnboundedReceiver<Message>>>,
}

impl Queue {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
        }
    }
}

/// Routes chunks between stages.
///
/// Shared between stage tasks as `Arc<StageRouter>`; all methods take `&self`.
#[derive(Default)]
pub struct StageRouter {
    queues: Mutex<BTreeMap<QueueKey, Queue>>,
    status: Mutex<BTreeMap<u64, SegmentState>>,
}

impl StageRouter {
    /// Creates a router with translate and tts queues ready for `target_langs`.
    ///
    /// Other languages still get a queue on first use.
    pub fn new<I, S>(target_langs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let router = Self::default();
        {
            let mut queues = router.lock_queues();
            for lang in target_langs {
                for stage in [Stage::Translate, Stage::Tts] {
                    queues
                        .entry(QueueKey {
                            stage,
                            lang: Some(lang.as_ref().to_string()),
                        })
                        .or_insert_with(Queue::new);
                }
            }
        }
        router
    }

    fn lock_queues(&self) -> MutexGuard<'_, BTreeMap<QueueKey, Queue>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_status(&self) -> MutexGuard<'_, BTreeMap<u64, SegmentState>> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sender(&self, key: QueueKey) -> UnboundedSender<Message> {
        self.lock_queues()
            .entry(key)
            .or_insert_with(Queue::new)
            .tx
            .clone()
    }

    fn receiver(&self, key: QueueKey) -> Arc<tokio::sync::Mutex<UnboundedReceiver<Message>>> {
        self.lock_queues()
            .entry(key)
            .or_insert_with(Queue::new)
            .rx
            .clone()
    }

    fn check_stage(stage: Stage, chunk: &Chunk) -> Result<()> {
        if chunk.stage() != stage {
            return Err(SyncError::StageMismatch {
                stage: stage.to_string(),
                found: chunk.kind().to_string(),
            });
        }
        Ok(())
    }

    /// Enqueues `chunk` for the consumers of `stage` and records its state.
    ///
    /// # Errors
    /// `SyncError::StageMismatch` if the chunk was not produced by `stage`.
    pub fn submit(&self, stage: Stage, chunk: Chunk) -> Result<()> {
        Self::check_stage(stage, &chunk)?;
        let key = QueueKey::new(stage, chunk.lang())?;
        self.update_status(&chunk);
        if self.sender(key).send(Some(chunk)).is_err() {
            tracing::warn!(%stage, "queue receiver dropped");
        }
        Ok(())
    }

    /// Records `chunk` in the status table without enqueueing it.
    ///
    /// For output that bypasses the router, such as TTS audio fed straight
    /// into a jitter buffer.
    pub fn record(&self, stage: Stage, chunk: &Chunk) -> Result<()> {
        Self::check_stage(stage, chunk)?;
        self.update_status(chunk);
        Ok(())
    }

    fn update_status(&self, chunk: &Chunk) {
        self.lock_status()
            .entry(chunk.segment_id())
            .or_default()
            .apply(chunk);
    }

    /// Sends the end-of-stream marker to consumers of `stage`.
    ///
    /// For per-language stages, `lang = None` broadcasts to every language
    /// queue currently known for the stage.
    pub fn submit_end(&self, stage: Stage, lang: Option<&str>) -> Result<()> {
        let keys: Vec<QueueKey> = match (stage.is_per_language(), lang) {
            (true, None) => self
                .lock_queues()
                .keys()
                .filter(|key| key.stage == stage)
                .cloned()
                .collect(),
            _ => vec![QueueKey::new(stage, lang)?],
        };

        tracing::debug!(%stage, queues = keys.len(), "end of stream");
        for key in keys {
            if self.sender(key).send(None).is_err() {
                tracing::warn!(%stage, "queue receiver dropped");
            }
        }
        Ok(())
    }

    /// Waits for the next chunk of `stage` (for `lang` on per-language
    /// stages). `Ok(None)` is the end-of-stream marker.
    ///
    /// # Errors
    /// `SyncError::MissingLanguage` if a per-language stage is asked without
    /// a language.
    pub async fn receive(&self, stage: Stage, lang: Option<&str>) -> Result<Option<Chunk>> {
        let rx = self.receiver(QueueKey::new(stage, lang)?);
        let mut rx = rx.lock().await;
        Ok(rx.recv().await.flatten())
    }

    /// Blocking variant of [`receive`](Self::receive) for a thread per stage.
    ///
    /// # Panics
    /// Panics if called from within an async runtime.
    pub fn blocking_receive(&self, stage: Stage, lang: Option<&str>) -> Result<Option<Chunk>> {
        let rx = self.receiver(QueueKey::new(stage, lang)?);
        let mut rx = rx.blocking_lock();
        Ok(rx.blocking_recv().flatten())
    }

    /// Languages with a queue on `stage`, sorted.
    pub fn languages(&self, stage: Stage) -> Vec<String> {
        self.lock_queues()
            .keys()
            .filter(|key| key.stage == stage)
            .filter_map(|key| key.lang.clone())
            .collect()
    }

    /// Copy of all segment states. Never aliases live state.
    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            segments: self.lock_status().clone(),
        }
    }

    pub fn segment_status(&self, segment_id: u64) -> Option<SegmentState> {
        self.lock_status().get(&segment_id).cloned()
    }
}
