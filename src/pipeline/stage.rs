//! External collaborators consumed by the stage loops.
//!
//! Real implementations wrap a translation or speech synthesis API; the
//! stage loops only see these traits, so the mocks below stand in for them
//! in tests.

use crate::chunk::{Revisioned, TextChunk, TranslatedChunk};
use crate::pipeline::error::StationError;
use async_trait::async_trait;
use std::collections::HashSet;

/// Translates one transcript revision into a target language.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, chunk: &TextChunk, target_lang: &str)
    -> Result<String, StationError>;

    fn name(&self) -> &str;
}

/// Synthesizes audio for one translated revision.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, chunk: &TranslatedChunk) -> Result<Vec<u8>, StationError>;

    fn name(&self) -> &str;
}

/// Mock translator: tags the source text with the target language.
#[derive(Debug, Clone, Default)]
pub struct MockTranslator {
    failing_segments: HashSet<u64>,
    fatal_segment: Option<u64>,
}

impl MockTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail recoverably on every revision of `segment_id`.
    pub fn with_failure_on(mut self, segment_id: u64) -> Self {
        self.failing_segments.insert(segment_id);
        self
    }

    /// Fail fatally on `segment_id`.
    pub fn with_fatal_on(mut self, segment_id: u64) -> Self {
        self.fatal_segment = Some(segment_id);
        self
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(
        &self,
        chunk: &TextChunk,
        target_lang: &str,
    ) -> Result<String, StationError> {
        let segment_id = chunk.segment_id();
        if self.fatal_segment == Some(segment_id) {
            return Err(StationError::Fatal(format!(
                "mock translator gave up on segment {segment_id}"
            )));
        }
        if self.failing_segments.contains(&segment_id) {
            return Err(StationError::Recoverable(format!(
                "mock translation failure for segment {segment_id}"
            )));
        }
        Ok(format!("[{target_lang}] {}", chunk.text))
    }

    fn name(&self) -> &str {
        "mock-translator"
    }
}

/// Mock synthesizer: the "audio" is the translated text's bytes.
#[derive(Debug, Clone, Default)]
pub struct MockSynthesizer {
    failing_segments: HashSet<u64>,
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure_on(mut self, segment_id: u64) -> Self {
        self.failing_segments.insert(segment_id);
        self
    }
}

#[async_trait]
impl Synthesizer for MockSynthesizer {
    async fn synthesize(&self, chunk: &TranslatedChunk) -> Result<Vec<u8>, StationError> {
        if self.failing_segments.contains(&chunk.segment_id()) {
            return Err(StationError::Recoverable(format!(
                "mock synthesis failure for segment {}",
                chunk.segment_id()
            )));
        }
        Ok(chunk.text.as_bytes().to_vec())
    }

    fn name(&self) -> &str {
        "mock-synthesizer"
    }
}
