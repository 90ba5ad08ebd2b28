//! ffmpeg argument templates and the async runner.
//!
//! Argument builders are pure functions so the exact invocations are
//! unit-testable without executing the binary.

use std::path::Path;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::MediaEngine;

pub fn normalize_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-i".into(),
        input.display().to_string(),
        "-q:a".into(),
        "5".into(),
        "-ac".into(),
        "1".into(),
        "-ar".into(),
        "16000".into(),
        output.display().to_string(),
    ]
}

pub fn silence_args(output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-f".into(),
        "lavfi".into(),
        "-i".into(),
        "anullsrc=r=16000:cl=mono".into(),
        "-t".into(),
        "1".into(),
        "-q:a".into(),
        "9".into(),
        output.display().to_string(),
    ]
}

pub fn concat_args(existing: &Path, clip: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-i".into(),
        format!("concat:{}|{}", existing.display(), clip.display()),
        "-c".into(),
        "copy".into(),
        output.display().to_string(),
    ]
}

pub fn ts_args(clip: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-i".into(),
        clip.display().to_string(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        "128k".into(),
        "-vn".into(),
        "-f".into(),
        "mpegts".into(),
        output.display().to_string(),
    ]
}

async fn run_ffmpeg(args: Vec<String>) -> Result<()> {
    debug!(args = ?args, "ffmpeg");
    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error"])
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .context("failed to run ffmpeg")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("ffmpeg exited with {}: {}", output.status, stderr.trim());
    }
    Ok(())
}

pub struct FfmpegEngine;

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn normalize_to_mp3(&self, input: &Path, output: &Path) -> Result<()> {
        run_ffmpeg(normalize_args(input, output)).await
    }

    async fn seed_silence(&self, output: &Path) -> Result<()> {
        run_ffmpeg(silence_args(output)).await
    }

    async fn concat(&self, existing: &Path, clip: &Path, output: &Path) -> Result<()> {
        run_ffmpeg(concat_args(existing, clip, output)).await
    }

    async fn remux_to_ts(&self, clip: &Path, output: &Path) -> Result<()> {
        run_ffmpeg(ts_args(clip, output)).await
    }

    fn clip_duration_secs(&self, wav: &Path) -> Result<f32> {
        let reader = hound::WavReader::open(wav)
            .with_context(|| format!("opening {}", wav.display()))?;
        let spec = reader.spec();
        Ok(reader.duration() as f32 / spec.sample_rate as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn normalize_downmixes_to_mono_16k() {
        let args = normalize_args(&PathBuf::from("in.wav"), &PathBuf::from("out.mp3"));
        let joined = args.join(" ");
        assert!(joined.contains("-ac 1"));
        assert!(joined.contains("-ar 16000"));
        assert!(joined.ends_with("out.mp3"));
    }

    #[test]
    fn concat_uses_demuxer_without_reencode() {
        let args = concat_args(
            &PathBuf::from("concat.mp3"),
            &PathBuf::from("clip.mp3"),
            &PathBuf::from("concat.mp3.tmp"),
        );
        assert!(args.contains(&"concat:concat.mp3|clip.mp3".to_string()));
        assert!(args.contains(&"copy".to_string()));
    }

    #[test]
    fn ts_remux_is_audio_only_aac() {
        let args = ts_args(&PathBuf::from("clip.mp3"), &PathBuf::from("00001.ts"));
        let joined = args.join(" ");
        assert!(joined.contains("-c:a aac"));
        assert!(joined.contains("-vn"));
        assert!(joined.contains("-f mpegts"));
    }

    #[test]
    fn silence_seed_is_one_second() {
        let args = silence_args(&PathBuf::from("concat.mp3"));
        let joined = args.join(" ");
        assert!(joined.contains("anullsrc=r=16000:cl=mono"));
        assert!(joined.contains("-t 1"));
    }

    #[test]
    fn wav_duration_from_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("half_second.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..8_000 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let dur = FfmpegEngine.clip_duration_secs(&path).unwrap();
        assert!((dur - 0.5).abs() < 1e-4);
    }
}
