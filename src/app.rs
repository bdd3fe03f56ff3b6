//! Replay commands behind the `voxsync` binary.
//!
//! Reads speech chunks as JSON lines and drives them through the jitter
//! buffer or per-language resolvers, writing results as JSON lines:
//! chunks → align/resolve → stdout

use crate::chunk::SpeechChunk;
use crate::error::{Result, SyncError};
use crate::jitter::{JitterBuffer, StalledSegment};
use crate::resolver::RevisionResolver;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};

/// Outcome of [`run_align`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignReport {
    /// Chunks read from the input.
    pub chunks: usize,
    /// Chunks for languages the buffer was not built with.
    pub rejected: usize,
    /// Segments released and written.
    pub segments: usize,
    /// Head segment still blocking release at end of input.
    pub stalled: Option<StalledSegment>,
}

/// Outcome of [`run_resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveReport {
    pub chunks: usize,
    /// Chunks dropped because a newer revision was already held.
    pub stale: usize,
    /// Chunks skipped by the language filter.
    pub filtered: usize,
    /// Resolved chunks written, across all languages.
    pub written: usize,
}

/// Parse speech chunks from JSON lines. Blank lines are skipped; line
/// numbers in errors are 1-based.
pub fn read_chunks<R: BufRead>(input: R) -> impl Iterator<Item = Result<SpeechChunk>> {
    input.lines().enumerate().filter_map(|(idx, line)| {
        let line = match line {
            Ok(line) => line,
            Err(e) => return Some(Err(e.into())),
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(
            serde_json::from_str(trimmed).map_err(|e| SyncError::Parse {
                line: idx + 1,
                message: e.to_string(),
            }),
        )
    })
}

/// Replay chunks through a jitter buffer over `languages`, writing each
/// released segment as one JSON line.
///
/// Chunks for other languages are logged and skipped; the run goes on.
pub fn run_align<R, W>(languages: &[String], input: R, mut output: W) -> Result<AlignReport>
where
    R: BufRead,
    W: Write,
{
    let mut buffer = JitterBuffer::new(languages.iter().cloned())?;
    let mut report = AlignReport::default();

    for chunk in read_chunks(input) {
        let chunk = chunk?;
        report.chunks += 1;
        let lang = chunk.lang.clone();

        let flushed = match buffer.process(&lang, chunk) {
            Ok(flushed) => flushed,
            Err(SyncError::UnknownLanguage { lang }) => {
                tracing::warn!(%lang, "chunk for unconfigured language skipped");
                report.rejected += 1;
                continue;
            }
            Err(e) => return Err(e),
        };

        for segment in flushed {
            serde_json::to_writer(&mut output, &segment)?;
            writeln!(output)?;
            report.segments += 1;
        }
    }

    report.stalled = buffer.stalled_head();
    if let Some(stalled) = &report.stalled {
        tracing::warn!(
            segment_id = stalled.segment_id,
            missing = ?stalled.missing,
            unfinalized = ?stalled.unfinalized,
            "input ended with segments still held"
        );
    }
    Ok(report)
}

/// Replay chunks through one resolver per language, then write every
/// resolved chunk as a JSON line: languages in lexical order, chunks in
/// timestamp order within each language.
pub fn run_resolve<R, W>(lang: Option<&str>, input: R, mut output: W) -> Result<ResolveReport>
where
    R: BufRead,
    W: Write,
{
    let mut resolvers: BTreeMap<String, RevisionResolver> = BTreeMap::new();
    let mut report = ResolveReport::default();

    for chunk in read_chunks(input) {
        let chunk = chunk?;
        report.chunks += 1;
        if lang.is_some_and(|wanted| wanted != chunk.lang) {
            report.filtered += 1;
            continue;
        }
        let resolver = resolvers.entry(chunk.lang.clone()).or_default();
        if resolver.process(chunk).is_stale() {
            report.stale += 1;
        }
    }

    for resolver in resolvers.values() {
        for chunk in resolver.ordered() {
            serde_json::to_writer(&mut output, chunk)?;
            writeln!(output)?;
            report.written += 1;
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Revisioned;
    use std::io::Cursor;

    fn line(segment_id: u64, revision: u32, ts: u64, is_final: bool, lang: &str) -> String {
        format!(
            r#"{{"segment_id":{segment_id},"revision":{revision},"timestamp_ms":{ts},"is_final":{is_final},"audio_b64":"aGk=","lang":"{lang}"}}"#
        )
    }

    fn langs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn output_lines(buf: &[u8]) -> Vec<serde_json::Value> {
        String::from_utf8_lossy(buf)
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_read_chunks_skips_blank_lines() {
        let input = format!("{}\n\n   \n{}\n", line(1, 0, 0, false, "en"), line(1, 1, 0, true, "en"));
        let chunks: Vec<SpeechChunk> = read_chunks(Cursor::new(input))
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].audio, b"hi".to_vec());
        assert_eq!(chunks[1].revision(), 1);
    }

    #[test]
    fn test_read_chunks_reports_line_number() {
        let input = format!("{}\n\n{{\"segment_id\": 2}}\n", line(1, 0, 0, true, "en"));
        let results: Vec<Result<SpeechChunk>> = read_chunks(Cursor::new(input)).collect();

        assert!(results[0].is_ok());
        match &results[1] {
            Err(SyncError::Parse { line, .. }) => assert_eq!(*line, 3),
            other => panic!("Expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_align_releases_when_all_languages_final() {
        let input = [
            line(1, 0, 0, false, "en"),
            line(1, 0, 0, true, "fr"),
            line(1, 1, 0, true, "en"),
        ]
        .join("\n");
        let mut out = Vec::new();

        let report = run_align(&langs(&["en", "fr"]), Cursor::new(input), &mut out).unwrap();

        assert_eq!(report.chunks, 3);
        assert_eq!(report.segments, 1);
        assert!(report.stalled.is_none());
        let lines = output_lines(&out);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["segment_id"], 1);
        assert_eq!(lines[0]["chunks"]["en"]["revision"], 1);
        assert_eq!(lines[0]["chunks"]["fr"]["audio_b64"], "aGk=");
    }

    #[test]
    fn test_align_skips_unknown_language() {
        let input = [line(1, 0, 0, true, "de"), line(1, 0, 0, true, "en")].join("\n");
        let mut out = Vec::new();

        let report = run_align(&langs(&["en"]), Cursor::new(input), &mut out).unwrap();

        assert_eq!(report.rejected, 1);
        assert_eq!(report.segments, 1);
    }

    #[test]
    fn test_align_reports_stalled_head() {
        let input = [line(1, 0, 0, true, "en"), line(2, 0, 0, true, "en")].join("\n");
        let mut out = Vec::new();

        let report = run_align(&langs(&["en", "fr"]), Cursor::new(input), &mut out).unwrap();

        assert_eq!(report.segments, 0);
        assert!(out.is_empty());
        let stalled = report.stalled.unwrap();
        assert_eq!(stalled.segment_id, 1);
        assert_eq!(stalled.missing, vec!["fr".to_string()]);
    }

    #[test]
    fn test_align_without_languages_fails() {
        let result = run_align(&[], Cursor::new(""), Vec::new());
        assert!(matches!(result, Err(SyncError::NoLanguages)));
    }

    #[test]
    fn test_align_stops_on_malformed_line() {
        let input = format!("{}\nnot json\n", line(1, 0, 0, true, "en"));
        let mut out = Vec::new();

        let result = run_align(&langs(&["en"]), Cursor::new(input), &mut out);

        assert!(matches!(result, Err(SyncError::Parse { line: 2, .. })));
        assert_eq!(output_lines(&out).len(), 1);
    }

    #[test]
    fn test_resolve_orders_by_timestamp_per_language() {
        let input = [
            line(2, 0, 200, false, "en"),
            line(1, 0, 100, false, "en"),
            line(1, 1, 100, true, "en"),
            line(1, 0, 100, false, "en"),
            line(1, 0, 50, true, "fr"),
        ]
        .join("\n");
        let mut out = Vec::new();

        let report = run_resolve(None, Cursor::new(input), &mut out).unwrap();

        assert_eq!(report.chunks, 5);
        assert_eq!(report.stale, 1);
        assert_eq!(report.written, 3);
        let lines = output_lines(&out);
        let ids: Vec<(String, u64, u64)> = lines
            .iter()
            .map(|v| {
                (
                    v["lang"].as_str().unwrap().to_string(),
                    v["segment_id"].as_u64().unwrap(),
                    v["revision"].as_u64().unwrap(),
                )
            })
            .collect();
        assert_eq!(
            ids,
            vec![
                ("en".to_string(), 1, 1),
                ("en".to_string(), 2, 0),
                ("fr".to_string(), 1, 0),
            ]
        );
    }

    #[test]
    fn test_resolve_language_filter() {
        let input = [line(1, 0, 0, true, "en"), line(1, 0, 0, true, "fr")].join("\n");
        let mut out = Vec::new();

        let report = run_resolve(Some("fr"), Cursor::new(input), &mut out).unwrap();

        assert_eq!(report.filtered, 1);
        assert_eq!(report.written, 1);
        assert_eq!(output_lines(&out)[0]["lang"], "fr");
    }
}
