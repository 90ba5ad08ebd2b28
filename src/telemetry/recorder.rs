use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::event::{SegmentEvent, SkipReason};

const EVENT_BUFFER: usize = 256;

/// Per-pipeline counters plus a live event feed, cheap to clone and
/// share between the watcher, the chain and the HTTP surface.
#[derive(Clone)]
pub struct TelemetryRecorder {
    inner: Arc<Mutex<TelemetrySnapshot>>,
    events: broadcast::Sender<SegmentEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub discovered: u64,
    pub transcribed: u64,
    pub translated: u64,
    pub synthesized: u64,
    pub delivered: u64,
    pub skipped_missing_config: u64,
    pub skipped_error: u64,
    pub skipped_too_small: u64,
    pub skipped_silence: u64,
    /// Highest segment index seen so far.
    pub last_index: Option<u64>,
}

impl Default for TelemetryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryRecorder {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            inner: Arc::new(Mutex::new(TelemetrySnapshot::default())),
            events,
        }
    }

    /// Live feed of this pipeline's events. Slow subscribers lag and
    /// drop; they never block the watcher.
    pub fn subscribe(&self) -> broadcast::Receiver<SegmentEvent> {
        self.events.subscribe()
    }

    pub fn record(&self, event: SegmentEvent) {
        {
            // Plain counters stay usable even after a panicked holder
            // poisoned the lock.
            let mut snap = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            match &event {
                SegmentEvent::Discovered { index } => {
                    snap.discovered += 1;
                    snap.last_index =
                        Some(snap.last_index.map_or(*index, |prev| prev.max(*index)));
                }
                SegmentEvent::Transcribed { .. } => snap.transcribed += 1,
                SegmentEvent::Translated { .. } => snap.translated += 1,
                SegmentEvent::Synthesized { .. } => snap.synthesized += 1,
                SegmentEvent::Delivered { .. } => snap.delivered += 1,
                SegmentEvent::Skipped { reason, .. } => match reason {
                    SkipReason::MissingConfig => snap.skipped_missing_config += 1,
                    SkipReason::Error => snap.skipped_error += 1,
                    SkipReason::TooSmall => snap.skipped_too_small += 1,
                    SkipReason::Silence => snap.skipped_silence += 1,
                },
            }
        }
        // No subscribers is the common case.
        let _ = self.events.send(event);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
