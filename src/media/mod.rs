//! Transcoder invocations, the accumulated timeline and HLS publishing.

pub mod accumulator;
pub mod ffmpeg;
pub mod playlist;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

/// Media operations the conversion chain needs. Production is ffmpeg;
/// tests substitute a stub so no transcoder binary is required.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Re-encode any audio clip to the common container: mono 16 kHz MP3.
    async fn normalize_to_mp3(&self, input: &Path, output: &Path) -> Result<()>;

    /// Write one second of silent MP3 so concatenation never starts from
    /// a missing file.
    async fn seed_silence(&self, output: &Path) -> Result<()>;

    /// Concat-demux `existing` + `clip` into `output` without re-encoding.
    async fn concat(&self, existing: &Path, clip: &Path, output: &Path) -> Result<()>;

    /// Package one clip as a single AAC MPEG-TS segment.
    async fn remux_to_ts(&self, clip: &Path, output: &Path) -> Result<()>;

    /// Duration of a WAV clip in seconds.
    fn clip_duration_secs(&self, wav: &Path) -> Result<f32>;
}
