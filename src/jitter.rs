//! Cross-language jitter buffer.
//!
//! Holds the newest revision of each segment per language and releases a
//! segment only once every registered language has finalized it. Release is
//! strictly ascending and contiguous by segment id: the next expected
//! segment blocks everything behind it, even when a later segment is
//! already complete or the next one has not been seen at all.

use crate::chunk::{Revisioned, SpeechChunk};
use crate::defaults;
use crate::error::{Result, SyncError};
use serde::Serialize;
use std::collections::BTreeMap;

/// A segment released by the jitter buffer, one final chunk per language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlushedSegment<C = SpeechChunk> {
    pub segment_id: u64,
    pub chunks: BTreeMap<String, C>,
}

/// Why the head segment has not been released yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StalledSegment {
    pub segment_id: u64,
    /// Languages that have not reported the segment at all.
    pub missing: Vec<String>,
    /// Languages holding only non-final revisions of it.
    pub unfinalized: Vec<String>,
}

/// Aligns segments across a fixed set of languages.
///
/// Not internally synchronized: a single driver owns the buffer and
/// serializes `process` calls.
#[derive(Debug, Clone)]
pub struct JitterBuffer<C = SpeechChunk> {
    buffers: BTreeMap<String, BTreeMap<u64, C>>,
    /// Segment that must be released next; everything below it is closed.
    next_segment: u64,
    last_flushed: Option<u64>,
}

impl<C: Revisioned> JitterBuffer<C> {
    /// Creates a buffer for `languages`. The set is fixed for its lifetime.
    ///
    /// Release starts at segment [`defaults::FIRST_SEGMENT_ID`]; see
    /// [`with_first_segment`](Self::with_first_segment) for other numbering.
    pub fn new<I, S>(languages: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let buffers: BTreeMap<String, BTreeMap<u64, C>> = languages
            .into_iter()
            .map(|lang| (lang.into(), BTreeMap::new()))
            .collect();
        if buffers.is_empty() {
            return Err(SyncError::NoLanguages);
        }
        Ok(Self {
            buffers,
            next_segment: defaults::FIRST_SEGMENT_ID,
            last_flushed: None,
        })
    }

    /// Sets the id of the first segment to release. Only meaningful before
    /// any chunk has been processed.
    pub fn with_first_segment(mut self, segment_id: u64) -> Self {
        self.next_segment = segment_id;
        self
    }

    /// Stores `chunk` for `lang` and returns every segment that became
    /// releasable, in ascending segment order.
    ///
    /// # Errors
    /// `SyncError::UnknownLanguage` if `lang` was not registered. The buffer
    /// is left unchanged.
    pub fn process(&mut self, lang: &str, chunk: C) -> Result<Vec<FlushedSegment<C>>> {
        let buffer = self
            .buffers
            .get_mut(lang)
            .ok_or_else(|| SyncError::UnknownLanguage {
                lang: lang.to_string(),
            })?;

        let segment_id = chunk.segment_id();
        if segment_id < self.next_segment {
            tracing::debug!(lang, segment_id, "ignoring chunk for closed segment");
            return Ok(Vec::new());
        }

        let retained = buffer.get(&segment_id).map(Revisioned::revision);
        match retained {
            Some(retained) if chunk.revision() < retained => {
                tracing::debug!(
                    lang,
                    segment_id,
                    revision = chunk.revision(),
                    retained,
                    "dropping stale revision"
                );
            }
            _ => {
                buffer.insert(segment_id, chunk);
            }
        }

        Ok(self.flush())
    }

    fn flush(&mut self) -> Vec<FlushedSegment<C>> {
        let mut flushed = Vec::new();
        loop {
            let segment_id = self.next_segment;
            let ready = self.buffers.values().all(|buffer| {
                buffer
                    .get(&segment_id)
                    .is_some_and(|chunk| chunk.is_final())
            });
            if !ready {
                break;
            }

            let chunks: BTreeMap<String, C> = self
                .buffers
                .iter_mut()
                .filter_map(|(lang, buffer)| {
                    buffer
                        .remove(&segment_id)
                        .map(|chunk| (lang.clone(), chunk))
                })
                .collect();
            self.last_flushed = Some(segment_id);
            self.next_segment = segment_id.saturating_add(1);
            tracing::debug!(segment_id, languages = chunks.len(), "flushed segment");
            flushed.push(FlushedSegment { segment_id, chunks });
        }
        flushed
    }

    /// Describes the segment currently blocking release, if any.
    ///
    /// Nothing in the buffer times out; callers watching for a silent
    /// language use this to decide on their own policy.
    pub fn stalled_head(&self) -> Option<StalledSegment> {
        if self.buffers.values().all(BTreeMap::is_empty) {
            return None;
        }
        let segment_id = self.next_segment;
        let mut missing = Vec::new();
        let mut unfinalized = Vec::new();
        for (lang, buffer) in &self.buffers {
            match buffer.get(&segment_id) {
                None => missing.push(lang.clone()),
                Some(chunk) if !chunk.is_final() => unfinalized.push(lang.clone()),
                Some(_) => {}
            }
        }
        Some(StalledSegment {
            segment_id,
            missing,
            unfinalized,
        })
    }

    /// Registered languages in sorted order.
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.buffers.keys().map(String::as_str)
    }

    /// Segment ids buffered in at least one language, ascending.
    pub fn pending_segments(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .buffers
            .values()
            .flat_map(|buffer| buffer.keys().copied())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Retained chunk for (`lang`, `segment_id`).
    pub fn get(&self, lang: &str, segment_id: u64) -> Option<&C> {
        self.buffers.get(lang)?.get(&segment_id)
    }

    pub fn last_flushed(&self) -> Option<u64> {
        self.last_flushed
    }

    /// Id of the segment the buffer is waiting to release.
    pub fn next_segment(&self) -> u64 {
        self.next_segment
    }
}
