//! Capture adapter: stream-fetch CLI piped into the transcoder,
//! producing fixed-length PCM WAV segments on disk.
//!
//! A channel has exactly one capture no matter how many language
//! pipelines dub it; [`CaptureRegistry`] shares the running pair and
//! stops it when the last pipeline lets go.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Running capture for one channel. Dropping the handle kills the
/// children (`kill_on_drop`); `stop` does it eagerly.
pub struct CaptureHandle {
    children: Vec<Child>,
}

impl CaptureHandle {
    fn new(children: Vec<Child>) -> Self {
        Self { children }
    }

    /// Handle owning no children; stands in for a real capture where
    /// spawning the external tools is not wanted.
    pub fn inert() -> Self {
        Self {
            children: Vec::new(),
        }
    }

    pub fn stop(&mut self) {
        for child in &mut self.children {
            if let Err(e) = child.start_kill() {
                debug!("capture child already gone: {}", e);
            }
        }
    }
}

struct CaptureEntry {
    handle: CaptureHandle,
    pipelines: usize,
}

/// One capture per channel, refcounted across language pipelines. The
/// first `acquire` spawns, later ones reuse the running pair; the last
/// `release` stops it. Two pipelines segmenting the same channel would
/// otherwise overwrite each other's `segment_%05d.wav` files.
#[derive(Default)]
pub struct CaptureRegistry {
    channels: Mutex<HashMap<String, CaptureEntry>>,
}

impl CaptureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the channel's capture, spawning it if absent.
    pub async fn acquire<F>(&self, channel: &str, spawn: F) -> Result<()>
    where
        F: FnOnce() -> Result<CaptureHandle>,
    {
        let mut channels = self.channels.lock().await;
        match channels.get_mut(channel) {
            Some(entry) => {
                entry.pipelines += 1;
                debug!(channel, pipelines = entry.pipelines, "capture reused");
            }
            None => {
                let handle = spawn()?;
                channels.insert(
                    channel.to_string(),
                    CaptureEntry {
                        handle,
                        pipelines: 1,
                    },
                );
            }
        }
        Ok(())
    }

    /// Leave the channel's capture; the last pipeline out stops it.
    pub async fn release(&self, channel: &str) {
        let mut channels = self.channels.lock().await;
        let idle = match channels.get_mut(channel) {
            Some(entry) => {
                entry.pipelines -= 1;
                entry.pipelines == 0
            }
            None => false,
        };
        if idle {
            if let Some(mut entry) = channels.remove(channel) {
                debug!(channel, "capture stopped");
                entry.handle.stop();
            }
        }
    }

    pub async fn stop_all(&self) {
        let mut channels = self.channels.lock().await;
        for (channel, mut entry) in channels.drain() {
            debug!(channel = %channel, "capture stopped");
            entry.handle.stop();
        }
    }

    pub async fn active(&self, channel: &str) -> bool {
        self.channels.lock().await.contains_key(channel)
    }
}

/// Launch the capture chain for a channel: streamlink pulls the live
/// stream to stdout, ffmpeg slices it into `segment_%05d.wav` files
/// under `out_dir`.
pub fn start_capture(channel: &str, out_dir: &Path, segment_seconds: u32) -> Result<CaptureHandle> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating segment dir {}", out_dir.display()))?;

    let mut streamlink = spawn_streamlink(channel)?;

    let stdout = streamlink
        .stdout
        .take()
        .context("streamlink stdout missing")?;
    if let Some(stderr) = streamlink.stderr.take() {
        tokio::spawn(drain_stderr("streamlink", stderr));
    }

    let mut ffmpeg = spawn_segmenter(stdout, out_dir, segment_seconds)?;
    if let Some(stderr) = ffmpeg.stderr.take() {
        tokio::spawn(drain_stderr("ffmpeg", stderr));
    }

    info!(channel, dir = %out_dir.display(), "capture started");
    Ok(CaptureHandle::new(vec![streamlink, ffmpeg]))
}

fn spawn_streamlink(channel: &str) -> Result<Child> {
    Command::new("streamlink")
        .arg(format!("twitch.tv/{}", channel))
        // audio_only when the stream offers it, otherwise the smallest
        // video rendition that still carries audio.
        .arg("audio_only,worst")
        .arg("--stdout")
        .args(["--hls-live-edge", "1"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .context("failed to spawn streamlink")
}

fn spawn_segmenter(input: ChildStdout, out_dir: &Path, segment_seconds: u32) -> Result<Child> {
    let stdin: Stdio = input
        .try_into()
        .context("converting streamlink stdout for ffmpeg stdin")?;

    let pattern = out_dir.join("segment_%05d.wav");

    Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error"])
        .args(["-i", "pipe:0"])
        .arg("-vn")
        .args(["-acodec", "pcm_s16le"])
        .args(["-ar", "48000"])
        .args(["-ac", "2"])
        .args(["-f", "segment"])
        .args(["-segment_time", &segment_seconds.to_string()])
        .args(["-reset_timestamps", "1"])
        .arg(pattern)
        .stdin(stdin)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .context("failed to spawn segmenting ffmpeg")
}

/// Log child stderr lines instead of discarding them; "No playable
/// streams found" would otherwise vanish silently.
async fn drain_stderr(tool: &'static str, stderr: tokio::process::ChildStderr) {
    use tokio::io::AsyncBufReadExt;
    let mut lines = tokio::io::BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if !line.is_empty() {
            warn!(tool, "{}", line);
        }
    }
}
