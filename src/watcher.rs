//! The segment watcher: discover unseen capture segments and dispatch
//! each through the conversion chain exactly once.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::segment::{parse_segment_index, SegmentOutcome};
use crate::telemetry::{SegmentEvent, TelemetryRecorder};

/// One segment in, one outcome out. The production impl is
/// [`crate::chain::ConversionChain`]; tests substitute stubs.
#[async_trait]
pub trait SegmentConverter: Send + Sync {
    async fn convert(&self, segment: &Path) -> Result<SegmentOutcome>;
}

#[derive(Debug, Clone)]
pub struct WatcherOptions {
    pub poll_interval: Duration,
    /// Files smaller than this are treated as corrupt and skipped.
    pub min_segment_bytes: u64,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            min_segment_bytes: 8 * 1024,
        }
    }
}

/// Poll `dir` for new `segment_NNN.wav` files until cancelled.
///
/// Per cycle: list, filter unseen recognized names, sort by numeric
/// index, convert each in order. Every handled segment is marked
/// processed exactly once whatever its outcome; failures are logged and
/// never retried. The one exception is a too-small file with no later
/// segment yet: the segmenter fills each file across its whole window,
/// so the newest file may simply not be finished, and it is deferred to
/// the next cycle instead of dropped. The processed-set lives and dies
/// with this invocation; a restart starts a fresh channel.
pub async fn watch_segments(
    dir: PathBuf,
    converter: &dyn SegmentConverter,
    options: WatcherOptions,
    recorder: TelemetryRecorder,
    cancel: CancellationToken,
) {
    let mut processed: HashSet<String> = HashSet::new();

    loop {
        if cancel.is_cancelled() {
            debug!(dir = %dir.display(), "watcher cancelled");
            return;
        }

        let batch = scan_unseen(&dir, &processed).await;
        let newest = batch.last().map(|(index, _)| *index);
        for (index, name) in batch {
            if cancel.is_cancelled() {
                return;
            }
            let path = dir.join(&name);

            let size = probe_size(&path).await;
            // A too-small file with no successor is the one the
            // segmenter is writing right now; leave it unseen so the
            // next cycle looks again once it has filled.
            if let Some(size) = size {
                if size < options.min_segment_bytes && Some(index) == newest {
                    debug!(segment = %name, size, "still filling, deferred");
                    continue;
                }
            }

            recorder.record(SegmentEvent::Discovered { index });
            let outcome = match size {
                // A later segment exists, so this one is final: the
                // segmenter never reopens a file it has moved past.
                Some(size) if size < options.min_segment_bytes => {
                    debug!(segment = %name, size, "below size threshold, skipping");
                    SegmentOutcome::SkippedTooSmall
                }
                // Vanished between listing and stat: treat as an error
                // skip, the capture adapter never rewrites segments.
                None => SegmentOutcome::SkippedError,
                Some(_) => match converter.convert(&path).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(segment = %name, "conversion chain failed: {}", e);
                        SegmentOutcome::SkippedError
                    }
                },
            };

            recorder.record(SegmentEvent::from_outcome(index, outcome));
            processed.insert(name);
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(options.poll_interval) => {}
        }
    }
}

/// List recognized, not-yet-processed segment files sorted by numeric
/// index (lexicographic order breaks past `segment_999.wav`).
async fn scan_unseen(dir: &Path, processed: &HashSet<String>) -> Vec<(u64, String)> {
    let mut found = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), "listing failed: {}", e);
            return found;
        }
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if processed.contains(&name) {
            continue;
        }
        if let Some(index) = parse_segment_index(&name) {
            found.push((index, name));
        }
    }
    found.sort_unstable();
    found
}

async fn probe_size(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path).await.ok().map(|m| m.len())
}
