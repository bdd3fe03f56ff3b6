//! Revision and alignment properties exercised through the public API.

use voxsync::{
    ChunkHeader, FlushedSegment, JitterBuffer, Revisioned, RevisionResolver, SpeechChunk,
    SyncError,
};

fn speech(segment_id: u64, revision: u32, ts: u64, is_final: bool, lang: &str) -> SpeechChunk {
    SpeechChunk::new(
        ChunkHeader::new(segment_id, revision, ts, is_final),
        format!("{lang}:{segment_id}:{revision}").into_bytes(),
        lang,
    )
}

fn ids(flushed: &[FlushedSegment]) -> Vec<u64> {
    flushed.iter().map(|s| s.segment_id).collect()
}

/// Every ordering of `items`, Heap's algorithm.
fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    fn heap<T: Clone>(k: usize, items: &mut Vec<T>, out: &mut Vec<Vec<T>>) {
        if k <= 1 {
            out.push(items.clone());
            return;
        }
        for i in 0..k {
            heap(k - 1, items, out);
            let j = if k % 2 == 0 { i } else { 0 };
            items.swap(j, k - 1);
        }
    }
    let mut items = items.to_vec();
    let mut out = Vec::new();
    heap(items.len(), &mut items, &mut out);
    out
}

#[test]
fn test_stale_revision_is_ignored_repeatedly() {
    let mut resolver = RevisionResolver::new();
    resolver.process(speech(1, 3, 0, false, "en"));

    for _ in 0..5 {
        assert!(resolver.process(speech(1, 2, 0, false, "en")).is_stale());
    }
    assert_eq!(resolver.get(1).map(|c| c.revision()), Some(3));
    assert_eq!(resolver.len(), 1);
}

#[test]
fn test_highest_revision_wins_in_any_arrival_order() {
    let revisions: Vec<u32> = (0..5).collect();

    for order in permutations(&revisions) {
        let mut resolver = RevisionResolver::new();
        for &revision in &order {
            resolver.process(speech(7, revision, 0, revision == 4, "en"));
        }
        let kept = resolver.get(7).unwrap();
        assert_eq!(kept.revision(), 4, "arrival order {:?}", order);
        assert!(kept.is_final());
    }
}

#[test]
fn test_jitter_holds_highest_revision_in_any_arrival_order() {
    let revisions: Vec<u32> = (0..4).collect();

    for order in permutations(&revisions) {
        let mut buffer = JitterBuffer::new(["en", "fr"]).unwrap();
        for &revision in &order {
            let flushed = buffer
                .process("en", speech(1, revision, 0, revision == 3, "en"))
                .unwrap();
            assert!(flushed.is_empty());
        }
        assert_eq!(buffer.get("en", 1).map(|c| c.revision()), Some(3));
    }
}

#[test]
fn test_segment_waits_for_every_language() {
    let mut buffer = JitterBuffer::new(["en", "fr"]).unwrap();

    assert!(buffer.process("en", speech(1, 0, 0, true, "en")).unwrap().is_empty());
    assert!(buffer.process("fr", speech(1, 0, 0, false, "fr")).unwrap().is_empty());

    let flushed = buffer.process("fr", speech(1, 1, 0, true, "fr")).unwrap();
    assert_eq!(ids(&flushed), vec![1]);
    assert_eq!(flushed[0].chunks["fr"].revision(), 1);
    assert_eq!(flushed[0].chunks["en"].audio, b"en:1:0".to_vec());
}

#[test]
fn test_release_is_ascending_and_bursts() {
    let mut buffer = JitterBuffer::new(["en", "fr"]).unwrap();

    for segment_id in [3, 2] {
        buffer.process("en", speech(segment_id, 0, 0, true, "en")).unwrap();
        buffer.process("fr", speech(segment_id, 0, 0, true, "fr")).unwrap();
    }
    assert_eq!(buffer.pending_segments(), vec![2, 3]);

    buffer.process("en", speech(1, 0, 0, true, "en")).unwrap();
    let flushed = buffer.process("fr", speech(1, 0, 0, true, "fr")).unwrap();

    assert_eq!(ids(&flushed), vec![1, 2, 3]);
    assert_eq!(buffer.last_flushed(), Some(3));
    assert!(buffer.pending_segments().is_empty());
}

#[test]
fn test_released_segment_is_not_released_again() {
    let mut buffer = JitterBuffer::new(["en"]).unwrap();
    assert_eq!(ids(&buffer.process("en", speech(1, 0, 0, true, "en")).unwrap()), vec![1]);

    let late = buffer.process("en", speech(1, 5, 0, true, "en")).unwrap();
    assert!(late.is_empty());
    assert!(buffer.get("en", 1).is_none());
}

#[test]
fn test_ordered_follows_timestamps_not_arrival() {
    let mut resolver = RevisionResolver::new();
    resolver.process(speech(2, 0, 200, true, "en"));
    resolver.process(speech(1, 0, 100, true, "en"));

    let order: Vec<u64> = resolver.ordered().iter().map(|c| c.segment_id()).collect();
    assert_eq!(order, vec![1, 2]);
}

#[test]
fn test_unknown_language_leaves_buffer_unchanged() {
    let mut buffer = JitterBuffer::new(["en"]).unwrap();
    buffer.process("en", speech(1, 0, 0, false, "en")).unwrap();

    let result = buffer.process("de", speech(1, 0, 0, true, "de"));

    match result {
        Err(SyncError::UnknownLanguage { lang }) => assert_eq!(lang, "de"),
        other => panic!("Expected UnknownLanguage, got {:?}", other),
    }
    assert_eq!(buffer.pending_segments(), vec![1]);
    assert_eq!(buffer.languages().collect::<Vec<_>>(), vec!["en"]);
    assert!(buffer.get("de", 1).is_none());
}

#[test]
fn test_stalled_head_names_the_blocking_language() {
    let mut buffer = JitterBuffer::new(["en", "fr", "ja"]).unwrap();
    buffer.process("en", speech(1, 0, 0, true, "en")).unwrap();
    buffer.process("fr", speech(1, 0, 0, false, "fr")).unwrap();
    buffer.process("en", speech(2, 0, 0, true, "en")).unwrap();

    let stalled = buffer.stalled_head().unwrap();
    assert_eq!(stalled.segment_id, 1);
    assert_eq!(stalled.missing, vec!["ja".to_string()]);
    assert_eq!(stalled.unfinalized, vec!["fr".to_string()]);
}
