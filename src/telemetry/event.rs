use serde::{Deserialize, Serialize};

use crate::segment::SegmentOutcome;

// Allowed: indices, durations, counts, enums.
// Forbidden: transcript text, translated text, audio bytes.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SegmentEvent {
    Discovered { index: u64 },
    Transcribed { chars: usize },
    Translated { chars: usize },
    Synthesized { duration_secs: f32 },
    Delivered { index: u64 },
    Skipped { index: u64, reason: SkipReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    MissingConfig,
    Error,
    TooSmall,
    Silence,
}

impl SegmentEvent {
    /// Terminal event for a segment, derived from its chain outcome.
    pub fn from_outcome(index: u64, outcome: SegmentOutcome) -> Self {
        match outcome {
            SegmentOutcome::Delivered => SegmentEvent::Delivered { index },
            SegmentOutcome::SkippedMissingConfig => SegmentEvent::Skipped {
                index,
                reason: SkipReason::MissingConfig,
            },
            SegmentOutcome::SkippedError => SegmentEvent::Skipped {
                index,
                reason: SkipReason::Error,
            },
            SegmentOutcome::SkippedTooSmall => SegmentEvent::Skipped {
                index,
                reason: SkipReason::TooSmall,
            },
            SegmentOutcome::SkippedSilence => SegmentEvent::Skipped {
                index,
                reason: SkipReason::Silence,
            },
        }
    }
}
