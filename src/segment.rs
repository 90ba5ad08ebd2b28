//! Segment naming and per-segment outcomes.

use serde::Serialize;

/// What happened to one segment after it left the watcher.
///
/// Every segment gets exactly one outcome and is marked processed
/// regardless of which it is (at-most-once, never retried).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SegmentOutcome {
    /// Clip synthesized, accumulated and published to the HLS feed.
    Delivered,
    /// Synthesis credentials absent; segment abandoned.
    SkippedMissingConfig,
    /// A vendor call or transcoder invocation failed.
    SkippedError,
    /// File below the minimum byte threshold; never entered the chain.
    SkippedTooSmall,
    /// Transcript came back empty; nothing to dub.
    SkippedSilence,
}

/// Parse the numeric index out of a capture segment filename
/// (`segment_000.wav`, `segment_01234.wav`, any padding width).
///
/// Sorting by this index instead of the raw filename keeps ordering
/// correct past `segment_999.wav`.
pub fn parse_segment_index(name: &str) -> Option<u64> {
    let digits = name.strip_prefix("segment_")?.strip_suffix(".wav")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_padded_indices() {
        assert_eq!(parse_segment_index("segment_000.wav"), Some(0));
        assert_eq!(parse_segment_index("segment_007.wav"), Some(7));
        assert_eq!(parse_segment_index("segment_01234.wav"), Some(1234));
    }

    #[test]
    fn rejects_foreign_names() {
        assert_eq!(parse_segment_index("segment_000.mp3"), None);
        assert_eq!(parse_segment_index("concat.mp3"), None);
        assert_eq!(parse_segment_index("segment_.wav"), None);
        assert_eq!(parse_segment_index("segment_00a.wav"), None);
        assert_eq!(parse_segment_index("clip_000.wav"), None);
    }

    #[test]
    fn numeric_order_beats_lexicographic() {
        // "segment_1000.wav" < "segment_999.wav" as strings; not as indices.
        let a = parse_segment_index("segment_999.wav").unwrap();
        let b = parse_segment_index("segment_1000.wav").unwrap();
        assert!(a < b);
    }
}
