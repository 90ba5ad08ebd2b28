use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use livedub::segment::SegmentOutcome;
use livedub::telemetry::TelemetryRecorder;
use livedub::watcher::{watch_segments, SegmentConverter, WatcherOptions};

/// Converter stub that records call order and can simulate vendor
/// failures for chosen segments.
struct RecordingConverter {
    calls: Mutex<Vec<String>>,
    fail_on: HashSet<String>,
}

impl RecordingConverter {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on: HashSet::new(),
        }
    }

    fn failing_on(names: &[&str]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SegmentConverter for RecordingConverter {
    async fn convert(&self, segment: &Path) -> anyhow::Result<SegmentOutcome> {
        let name = segment.file_name().unwrap().to_str().unwrap().to_string();
        self.calls.lock().unwrap().push(name.clone());
        if self.fail_on.contains(&name) {
            anyhow::bail!("simulated vendor 500");
        }
        Ok(SegmentOutcome::Delivered)
    }
}

fn write_segment(dir: &Path, name: &str, bytes: usize) {
    std::fs::write(dir.join(name), vec![0u8; bytes]).unwrap();
}

fn fast_options() -> WatcherOptions {
    WatcherOptions {
        poll_interval: Duration::from_millis(20),
        min_segment_bytes: 64,
    }
}

/// Run the watcher in a task for `run_for`, then cancel and join.
async fn run_watcher(
    dir: PathBuf,
    converter: Arc<RecordingConverter>,
    recorder: TelemetryRecorder,
    run_for: Duration,
) {
    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            watch_segments(dir, &*converter, fast_options(), recorder, cancel).await;
        }
    });
    tokio::time::sleep(run_for).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("watcher did not stop after cancellation")
        .unwrap();
}

#[tokio::test]
async fn both_segments_in_one_scan_processed_in_order() {
    let dir = tempfile::tempdir().unwrap();
    write_segment(dir.path(), "segment_00000.wav", 256);
    write_segment(dir.path(), "segment_00001.wav", 256);

    let converter = Arc::new(RecordingConverter::new());
    let recorder = TelemetryRecorder::new();
    run_watcher(
        dir.path().to_path_buf(),
        converter.clone(),
        recorder.clone(),
        Duration::from_millis(100),
    )
    .await;

    assert_eq!(
        converter.calls(),
        vec!["segment_00000.wav", "segment_00001.wav"]
    );
    assert_eq!(recorder.snapshot().delivered, 2);
}

#[tokio::test]
async fn processed_segments_never_resubmitted() {
    let dir = tempfile::tempdir().unwrap();
    write_segment(dir.path(), "segment_00000.wav", 256);

    let converter = Arc::new(RecordingConverter::new());
    let recorder = TelemetryRecorder::new();
    // Several poll cycles worth of time; the file is converted once.
    run_watcher(
        dir.path().to_path_buf(),
        converter.clone(),
        recorder.clone(),
        Duration::from_millis(150),
    )
    .await;

    assert_eq!(converter.calls(), vec!["segment_00000.wav"]);
    assert_eq!(recorder.snapshot().discovered, 1);
}

#[tokio::test]
async fn failure_on_one_segment_does_not_block_the_next() {
    let dir = tempfile::tempdir().unwrap();
    write_segment(dir.path(), "segment_00000.wav", 256);
    write_segment(dir.path(), "segment_00001.wav", 256);

    let converter = Arc::new(RecordingConverter::failing_on(&["segment_00000.wav"]));
    let recorder = TelemetryRecorder::new();
    run_watcher(
        dir.path().to_path_buf(),
        converter.clone(),
        recorder.clone(),
        Duration::from_millis(100),
    )
    .await;

    // Both were attempted, in order, and the failed one was not retried.
    assert_eq!(
        converter.calls(),
        vec!["segment_00000.wav", "segment_00001.wav"]
    );
    let snap = recorder.snapshot();
    assert_eq!(snap.skipped_error, 1);
    assert_eq!(snap.delivered, 1);
}

#[tokio::test]
async fn empty_directory_is_quiet() {
    let dir = tempfile::tempdir().unwrap();
    let converter = Arc::new(RecordingConverter::new());
    let recorder = TelemetryRecorder::new();
    run_watcher(
        dir.path().to_path_buf(),
        converter.clone(),
        recorder.clone(),
        Duration::from_millis(80),
    )
    .await;

    assert!(converter.calls().is_empty());
    assert_eq!(recorder.snapshot(), Default::default());
}

#[tokio::test]
async fn numeric_index_order_beats_lexicographic() {
    let dir = tempfile::tempdir().unwrap();
    write_segment(dir.path(), "segment_1000.wav", 256);
    write_segment(dir.path(), "segment_999.wav", 256);

    let converter = Arc::new(RecordingConverter::new());
    run_watcher(
        dir.path().to_path_buf(),
        converter.clone(),
        TelemetryRecorder::new(),
        Duration::from_millis(100),
    )
    .await;

    assert_eq!(
        converter.calls(),
        vec!["segment_999.wav", "segment_1000.wav"]
    );
}

#[tokio::test]
async fn too_small_segments_skip_the_chain() {
    let dir = tempfile::tempdir().unwrap();
    write_segment(dir.path(), "segment_00000.wav", 8); // below 64-byte floor
    // The successor marks segment_00000 as final rather than in-flight.
    write_segment(dir.path(), "segment_00001.wav", 256);

    let converter = Arc::new(RecordingConverter::new());
    let recorder = TelemetryRecorder::new();
    run_watcher(
        dir.path().to_path_buf(),
        converter.clone(),
        recorder.clone(),
        Duration::from_millis(100),
    )
    .await;

    assert_eq!(converter.calls(), vec!["segment_00001.wav"]);
    let snap = recorder.snapshot();
    assert_eq!(snap.skipped_too_small, 1);
    assert_eq!(snap.delivered, 1);
    // Both marked processed: two discoveries, no rescans converting later.
    assert_eq!(snap.discovered, 2);
}

#[tokio::test]
async fn growing_segment_is_converted_once_complete() {
    let dir = tempfile::tempdir().unwrap();
    // The segmenter starts each file near-empty and fills it over the
    // whole window; the watcher must revisit, not drop it.
    write_segment(dir.path(), "segment_00000.wav", 16);

    let converter = Arc::new(RecordingConverter::new());
    let recorder = TelemetryRecorder::new();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        let converter = converter.clone();
        let dir = dir.path().to_path_buf();
        let recorder = recorder.clone();
        async move {
            watch_segments(dir, &*converter, fast_options(), recorder, cancel).await;
        }
    });

    // Let at least one scan see the file while it is still small.
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(converter.calls().is_empty());
    write_segment(dir.path(), "segment_00000.wav", 4096);
    tokio::time::sleep(Duration::from_millis(100)).await;

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(converter.calls(), vec!["segment_00000.wav"]);
    let snap = recorder.snapshot();
    assert_eq!(snap.delivered, 1);
    assert_eq!(snap.skipped_too_small, 0);
}

#[tokio::test]
async fn lone_small_segment_waits_for_its_successor() {
    let dir = tempfile::tempdir().unwrap();
    write_segment(dir.path(), "segment_00000.wav", 8);

    let converter = Arc::new(RecordingConverter::new());
    let recorder = TelemetryRecorder::new();
    run_watcher(
        dir.path().to_path_buf(),
        converter.clone(),
        recorder.clone(),
        Duration::from_millis(100),
    )
    .await;

    // Never judged while it might still be filling.
    assert!(converter.calls().is_empty());
    let snap = recorder.snapshot();
    assert_eq!(snap.discovered, 0);
    assert_eq!(snap.skipped_too_small, 0);
}

#[tokio::test]
async fn foreign_files_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    write_segment(dir.path(), "concat.mp3", 256);
    write_segment(dir.path(), "notes.txt", 256);
    write_segment(dir.path(), "segment_00000.wav", 256);

    let converter = Arc::new(RecordingConverter::new());
    run_watcher(
        dir.path().to_path_buf(),
        converter.clone(),
        TelemetryRecorder::new(),
        Duration::from_millis(100),
    )
    .await;

    assert_eq!(converter.calls(), vec!["segment_00000.wav"]);
}

#[tokio::test]
async fn late_arrivals_are_picked_up_in_order() {
    let dir = tempfile::tempdir().unwrap();
    write_segment(dir.path(), "segment_00000.wav", 256);

    let converter = Arc::new(RecordingConverter::new());
    let recorder = TelemetryRecorder::new();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        let converter = converter.clone();
        let dir = dir.path().to_path_buf();
        let recorder = recorder.clone();
        async move {
            watch_segments(dir, &*converter, fast_options(), recorder, cancel).await;
        }
    });

    // Let the first cycle run, then drop in the next segment.
    tokio::time::sleep(Duration::from_millis(60)).await;
    write_segment(dir.path(), "segment_00001.wav", 256);
    tokio::time::sleep(Duration::from_millis(100)).await;

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        converter.calls(),
        vec!["segment_00000.wav", "segment_00001.wav"]
    );
}

#[tokio::test]
async fn cancellation_stops_an_idle_watcher() {
    let dir = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();
    let converter = Arc::new(RecordingConverter::new());
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        let converter = converter.clone();
        let dir = dir.path().to_path_buf();
        async move {
            watch_segments(
                dir,
                &*converter,
                WatcherOptions {
                    poll_interval: Duration::from_secs(60),
                    min_segment_bytes: 64,
                },
                TelemetryRecorder::new(),
                cancel,
            )
            .await;
        }
    });

    // The watcher is asleep on its 60s poll; cancellation must cut it.
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("cancellation did not interrupt the poll sleep")
        .unwrap();
}
