//! Chunk types exchanged between pipeline stages.
//!
//! Every stage emits chunks that share a [`ChunkHeader`] and differ only in
//! payload: transcript text from STT, translated text per language, and
//! encoded audio per language from TTS.

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fields common to every chunk, whatever stage produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkHeader {
    /// Segment this chunk revises. Assigned monotonically by STT.
    pub segment_id: u64,
    /// Ordinal version of the segment; higher supersedes lower.
    pub revision: u32,
    /// Upstream-assigned timestamp. Revisions may restate it.
    pub timestamp_ms: u64,
    /// Last revision for the segment.
    pub is_final: bool,
}

impl ChunkHeader {
    /// Creates a new chunk header.
    pub fn new(segment_id: u64, revision: u32, timestamp_ms: u64, is_final: bool) -> Self {
        Self {
            segment_id,
            revision,
            timestamp_ms,
            is_final,
        }
    }
}

/// Access to the revision header of any chunk type.
///
/// The resolver and jitter buffer are generic over this trait so they can
/// track text chunks as well as audio.
pub trait Revisioned {
    fn header(&self) -> &ChunkHeader;

    fn segment_id(&self) -> u64 {
        self.header().segment_id
    }

    fn revision(&self) -> u32 {
        self.header().revision
    }

    fn timestamp_ms(&self) -> u64 {
        self.header().timestamp_ms
    }

    fn is_final(&self) -> bool {
        self.header().is_final
    }
}

/// Transcript chunk produced by the STT stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    #[serde(flatten)]
    pub header: ChunkHeader,
    pub text: String,
}

impl TextChunk {
    pub fn new(header: ChunkHeader, text: impl Into<String>) -> Self {
        Self {
            header,
            text: text.into(),
        }
    }
}

/// Translated text for one target language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedChunk {
    #[serde(flatten)]
    pub header: ChunkHeader,
    pub text: String,
    pub lang: String,
}

impl TranslatedChunk {
    pub fn new(header: ChunkHeader, text: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            header,
            text: text.into(),
            lang: lang.into(),
        }
    }
}

/// Synthesized audio for one target language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechChunk {
    #[serde(flatten)]
    pub header: ChunkHeader,
    /// Encoded audio bytes (base64 on the JSON boundary).
    #[serde(rename = "audio_b64", with = "base64_audio")]
    pub audio: Vec<u8>,
    pub lang: String,
}

impl SpeechChunk {
    pub fn new(header: ChunkHeader, audio: Vec<u8>, lang: impl Into<String>) -> Self {
        Self {
            header,
            audio,
            lang: lang.into(),
        }
    }
}

impl Revisioned for TextChunk {
    fn header(&self) -> &ChunkHeader {
        &self.header
    }
}

impl Revisioned for TranslatedChunk {
    fn header(&self) -> &ChunkHeader {
        &self.header
    }
}

impl Revisioned for SpeechChunk {
    fn header(&self) -> &ChunkHeader {
        &self.header
    }
}

mod base64_audio {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(audio: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(audio))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// Pipeline phase that produces chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Stt,
    Translate,
    Tts,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Stt, Stage::Translate, Stage::Tts];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Stt => "stt",
            Stage::Translate => "translate",
            Stage::Tts => "tts",
        }
    }

    /// Whether the stage fans out into one queue per target language.
    pub fn is_per_language(&self) -> bool {
        !matches!(self, Stage::Stt)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stt" => Ok(Stage::Stt),
            "translate" => Ok(Stage::Translate),
            "tts" => Ok(Stage::Tts),
            other => Err(SyncError::UnknownStage {
                name: other.to_string(),
            }),
        }
    }
}

/// A chunk from any stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Chunk {
    Text(TextChunk),
    Translated(TranslatedChunk),
    Speech(SpeechChunk),
}

impl Chunk {
    /// The stage whose output this chunk is.
    pub fn stage(&self) -> Stage {
        match self {
            Chunk::Text(_) => Stage::Stt,
            Chunk::Translated(_) => Stage::Translate,
            Chunk::Speech(_) => Stage::Tts,
        }
    }

    /// Target language, for translated and synthesized chunks.
    pub fn lang(&self) -> Option<&str> {
        match self {
            Chunk::Text(_) => None,
            Chunk::Translated(c) => Some(&c.lang),
            Chunk::Speech(c) => Some(&c.lang),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Chunk::Text(_) => "text",
            Chunk::Translated(_) => "translated",
            Chunk::Speech(_) => "speech",
        }
    }

    pub fn into_text(self) -> Option<TextChunk> {
        match self {
            Chunk::Text(c) => Some(c),
            _ => None,
        }
    }

    pub fn into_translated(self) -> Option<TranslatedChunk> {
        match self {
            Chunk::Translated(c) => Some(c),
            _ => None,
        }
    }

    pub fn into_speech(self) -> Option<SpeechChunk> {
        match self {
            Chunk::Speech(c) => Some(c),
            _ => None,
        }
    }
}

impl Revisioned for Chunk {
    fn header(&self) -> &ChunkHeader {
        match self {
            Chunk::Text(c) => &c.header,
            Chunk::Translated(c) => &c.header,
            Chunk::Speech(c) => &c.header,
        }
    }
}

impl From<TextChunk> for Chunk {
    fn from(chunk: TextChunk) -> Self {
        Chunk::Text(chunk)
    }
}

impl From<TranslatedChunk> for Chunk {
    fn from(chunk: TranslatedChunk) -> Self {
        Chunk::Translated(chunk)
    }
}

impl From<SpeechChunk> for Chunk {
    fn from(chunk: SpeechChunk) -> Self {
        Chunk::Speech(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_parse_known_names() {
        for stage in Stage::ALL {
            assert_eq!(stage.as_str().parse::<Stage>().unwrap(), stage);
        }
    }

    #[test]
    fn test_stage_parse_unknown_name_fails() {
        match "mixdown".parse::<Stage>() {
            Err(SyncError::UnknownStage { name }) => assert_eq!(name, "mixdown"),
            other => panic!("Expected UnknownStage, got {:?}", other),
        }
    }

    #[test]
    fn test_only_stt_is_single_queue() {
        assert!(!Stage::Stt.is_per_language());
        assert!(Stage::Translate.is_per_language());
        assert!(Stage::Tts.is_per_language());
    }

    #[test]
    fn test_chunk_dispatch_by_variant() {
        let header = ChunkHeader::new(3, 1, 300, false);
        let text: Chunk = TextChunk::new(header, "hej").into();
        let translated: Chunk = TranslatedChunk::new(header, "hi", "en").into();
        let speech: Chunk = SpeechChunk::new(header, vec![1, 2], "fr").into();

        assert_eq!(text.stage(), Stage::Stt);
        assert_eq!(text.lang(), None);
        assert_eq!(translated.stage(), Stage::Translate);
        assert_eq!(translated.lang(), Some("en"));
        assert_eq!(speech.stage(), Stage::Tts);
        assert_eq!(speech.lang(), Some("fr"));
        assert_eq!(speech.segment_id(), 3);
        assert_eq!(speech.revision(), 1);
    }

    #[test]
    fn test_speech_chunk_json_uses_flat_header_and_base64() {
        let chunk = SpeechChunk::new(ChunkHeader::new(1, 2, 150, true), b"mp3".to_vec(), "en");
        let json = serde_json::to_value(&chunk).unwrap();

        assert_eq!(json["segment_id"], 1);
        assert_eq!(json["revision"], 2);
        assert_eq!(json["is_final"], true);
        assert_eq!(json["audio_b64"], "bXAz");
        assert_eq!(json["lang"], "en");
    }

    #[test]
    fn test_speech_chunk_parses_wire_line() {
        let line = r#"{"segment_id":4,"revision":0,"timestamp_ms":400,"is_final":false,"audio_b64":"AAE=","lang":"fr"}"#;
        let chunk: SpeechChunk = serde_json::from_str(line).unwrap();

        assert_eq!(chunk.header, ChunkHeader::new(4, 0, 400, false));
        assert_eq!(chunk.audio, vec![0, 1]);
        assert_eq!(chunk.lang, "fr");
    }

    #[test]
    fn test_speech_chunk_rejects_bad_base64() {
        let line = r#"{"segment_id":4,"revision":0,"timestamp_ms":0,"is_final":false,"audio_b64":"!!","lang":"fr"}"#;
        assert!(serde_json::from_str::<SpeechChunk>(line).is_err());
    }

    #[test]
    fn test_into_variant_accessors() {
        let header = ChunkHeader::new(1, 0, 0, true);
        let chunk: Chunk = TextChunk::new(header, "x").into();
        assert!(chunk.clone().into_translated().is_none());
        assert_eq!(chunk.into_text().unwrap().text, "x");
    }
}
