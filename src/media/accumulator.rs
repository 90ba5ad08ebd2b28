//! The growing `concat.mp3` timeline: every delivered clip appended in
//! arrival order. Appends go through a temp file and an atomic rename so
//! a crashed transcoder never leaves a truncated accumulator behind.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use super::MediaEngine;

pub const ACCUMULATOR_NAME: &str = "concat.mp3";

pub struct Accumulator {
    path: PathBuf,
}

impl Accumulator {
    pub fn new(processed_dir: &Path) -> Self {
        Self {
            path: processed_dir.join(ACCUMULATOR_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the initial silent accumulator if none exists yet; the
    /// concat demuxer needs a non-empty left-hand input.
    pub async fn ensure_seeded(&self, media: &dyn MediaEngine) -> Result<()> {
        if tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(());
        }
        media.seed_silence(&self.path).await?;
        info!(path = %self.path.display(), "seeded accumulator");
        Ok(())
    }

    /// Append one normalized clip: old + clip -> temp, then replace.
    pub async fn append(&self, media: &dyn MediaEngine, clip: &Path) -> Result<()> {
        let tmp = self.path.with_extension("mp3.tmp");
        media.concat(&self.path, clip, &tmp).await?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}
