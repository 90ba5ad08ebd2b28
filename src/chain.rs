//! Per-segment conversion chain: transcribe, translate, synthesize,
//! normalize, accumulate, publish.
//!
//! Every failure is segment-local: the chain reports an explicit
//! [`SegmentOutcome`] and the watcher moves on. The feed is best-effort;
//! a vendor outage degrades to gaps, never to a dead loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::media::accumulator::Accumulator;
use crate::media::playlist::{Playlist, PlaylistEntry, PLAYLIST_NAME};
use crate::media::MediaEngine;
use crate::segment::{parse_segment_index, SegmentOutcome};
use crate::services::{Synthesizer, Transcriber, Translator};
use crate::telemetry::{SegmentEvent, TelemetryRecorder};
use crate::watcher::SegmentConverter;

#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Forced transcription language hint.
    pub source_lang: String,
    /// Dub target language.
    pub target_lang: String,
    /// Nominal segment length, used as the playlist target duration.
    pub segment_seconds: u32,
}

pub struct ConversionChain {
    transcriber: Arc<dyn Transcriber>,
    /// Absent translator or target == source means pass-through text.
    translator: Option<Arc<dyn Translator>>,
    /// Absent synthesizer means segments are abandoned as
    /// `SkippedMissingConfig`.
    synthesizer: Option<Arc<dyn Synthesizer>>,
    media: Arc<dyn MediaEngine>,
    accumulator: Accumulator,
    processed_dir: PathBuf,
    hls_dir: PathBuf,
    config: ChainConfig,
    recorder: TelemetryRecorder,
}

impl ConversionChain {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        translator: Option<Arc<dyn Translator>>,
        synthesizer: Option<Arc<dyn Synthesizer>>,
        media: Arc<dyn MediaEngine>,
        processed_dir: PathBuf,
        hls_dir: PathBuf,
        config: ChainConfig,
        recorder: TelemetryRecorder,
    ) -> Self {
        Self {
            transcriber,
            translator,
            synthesizer,
            media,
            accumulator: Accumulator::new(&processed_dir),
            processed_dir,
            hls_dir,
            config,
            recorder,
        }
    }

    /// Create working directories and seed the accumulator. Called once
    /// before the watcher starts.
    pub async fn init(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.processed_dir)
            .await
            .with_context(|| format!("creating {}", self.processed_dir.display()))?;
        tokio::fs::create_dir_all(&self.hls_dir)
            .await
            .with_context(|| format!("creating {}", self.hls_dir.display()))?;
        self.accumulator.ensure_seeded(self.media.as_ref()).await
    }

    /// Normalize the clip, append it to the accumulator and publish one
    /// HLS segment + playlist entry.
    async fn publish(&self, clip_wav: &Path) -> Result<f32> {
        let duration = self.media.clip_duration_secs(clip_wav)?;

        let clip_mp3 = clip_wav.with_extension("mp3");
        self.media.normalize_to_mp3(clip_wav, &clip_mp3).await?;

        self.accumulator.append(self.media.as_ref(), &clip_mp3).await?;

        let playlist_path = self.hls_dir.join(PLAYLIST_NAME);
        let mut playlist =
            Playlist::load_or_new(&playlist_path, self.config.segment_seconds).await?;
        let ts_name = Playlist::segment_name(playlist.next_sequence());
        self.media
            .remux_to_ts(&clip_mp3, &self.hls_dir.join(&ts_name))
            .await?;
        playlist.push(PlaylistEntry {
            duration_secs: duration,
            uri: ts_name,
        });
        playlist.write_atomic(&playlist_path).await?;

        Ok(duration)
    }
}

#[async_trait]
impl SegmentConverter for ConversionChain {
    async fn convert(&self, segment: &Path) -> Result<SegmentOutcome> {
        let name = segment
            .file_name()
            .and_then(|n| n.to_str())
            .context("segment path has no utf-8 file name")?;
        let index = parse_segment_index(name).unwrap_or_default();

        // 1. Transcribe with the forced source-language hint.
        let text = match self
            .transcriber
            .transcribe(segment, &self.config.source_lang)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(segment = name, "transcription failed: {}", e);
                return Ok(SegmentOutcome::SkippedError);
            }
        };
        if text.is_empty() {
            return Ok(SegmentOutcome::SkippedSilence);
        }
        self.recorder
            .record(SegmentEvent::Transcribed { chars: text.len() });

        // 2. Translate; pass-through when the target matches the source
        //    or no translator is configured.
        let same_lang = self
            .config
            .target_lang
            .eq_ignore_ascii_case(&self.config.source_lang);
        let translated = match (&self.translator, same_lang) {
            (Some(translator), false) => {
                match translator.translate(&text, &self.config.target_lang).await {
                    Ok(translated) => {
                        self.recorder.record(SegmentEvent::Translated {
                            chars: translated.len(),
                        });
                        translated
                    }
                    Err(e) => {
                        warn!(segment = name, "translation failed: {}", e);
                        return Ok(SegmentOutcome::SkippedError);
                    }
                }
            }
            _ => text,
        };

        // 3. Synthesize into the processed dir.
        let Some(synthesizer) = &self.synthesizer else {
            return Ok(SegmentOutcome::SkippedMissingConfig);
        };
        let stem = name.trim_end_matches(".wav");
        let clip_wav = self
            .processed_dir
            .join(format!("{}_{}.wav", stem, self.config.target_lang));
        if let Err(e) = synthesizer
            .synthesize(&translated, &self.config.target_lang, &clip_wav)
            .await
        {
            warn!(segment = name, "synthesis failed: {}", e);
            return Ok(SegmentOutcome::SkippedError);
        }

        // 4-6. Normalize, accumulate, publish.
        match self.publish(&clip_wav).await {
            Ok(duration) => {
                self.recorder.record(SegmentEvent::Synthesized {
                    duration_secs: duration,
                });
                info!(segment = name, index, duration, "segment delivered");
                Ok(SegmentOutcome::Delivered)
            }
            Err(e) => {
                warn!(segment = name, "publishing failed: {}", e);
                Ok(SegmentOutcome::SkippedError)
            }
        }
    }
}
