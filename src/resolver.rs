//! Per-language revision resolver.
//!
//! Keeps the newest revision of every segment for a single language and
//! reconstructs playback order from upstream timestamps rather than arrival
//! order, since revisions can arrive out of network order.

use crate::chunk::{Revisioned, SpeechChunk};
use std::collections::HashMap;

/// What happened to a chunk handed to [`RevisionResolver::process`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<C> {
    /// First chunk seen for its segment.
    Inserted,
    /// Replaced an earlier (or equal) revision. The superseded chunk is
    /// returned so a player can fade out audio it already started.
    Replaced { superseded: C },
    /// Lower revision than the retained one; dropped.
    Stale,
}

impl<C> Resolution<C> {
    pub fn is_stale(&self) -> bool {
        matches!(self, Resolution::Stale)
    }
}

#[derive(Debug, Clone)]
struct Entry<C> {
    chunk: C,
    /// Order in which the segment was first seen, for stable tie-breaking.
    arrival: u64,
}

/// Deduplicates revisions for one language.
///
/// Owned by a single consumer; `process` takes `&mut self`.
#[derive(Debug, Clone)]
pub struct RevisionResolver<C = SpeechChunk> {
    segments: HashMap<u64, Entry<C>>,
    next_arrival: u64,
}

impl<C> Default for RevisionResolver<C> {
    fn default() -> Self {
        Self {
            segments: HashMap::new(),
            next_arrival: 0,
        }
    }
}

impl<C: Revisioned> RevisionResolver<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `chunk` if its revision is at least the retained one.
    ///
    /// Equal revisions replace: a retransmission may carry corrected content.
    pub fn process(&mut self, chunk: C) -> Resolution<C> {
        let segment_id = chunk.segment_id();
        match self.segments.get_mut(&segment_id) {
            Some(entry) => {
                let retained = entry.chunk.revision();
                if chunk.revision() < retained {
                    tracing::debug!(
                        segment_id,
                        revision = chunk.revision(),
                        retained,
                        "dropping stale revision"
                    );
                    return Resolution::Stale;
                }
                let superseded = std::mem::replace(&mut entry.chunk, chunk);
                Resolution::Replaced { superseded }
            }
            None => {
                let arrival = self.next_arrival;
                self.next_arrival += 1;
                self.segments.insert(segment_id, Entry { chunk, arrival });
                Resolution::Inserted
            }
        }
    }

    /// Retained chunks sorted by `timestamp_ms`, ties by first arrival.
    pub fn ordered(&self) -> Vec<&C> {
        let mut entries: Vec<&Entry<C>> = self.segments.values().collect();
        entries.sort_by_key(|e| (e.chunk.timestamp_ms(), e.arrival));
        entries.into_iter().map(|e| &e.chunk).collect()
    }

    pub fn get(&self, segment_id: u64) -> Option<&C> {
        self.segments.get(&segment_id).map(|e| &e.chunk)
    }

    pub fn remove(&mut self, segment_id: u64) -> Option<C> {
        self.segments.remove(&segment_id).map(|e| e.chunk)
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
