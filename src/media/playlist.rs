//! EVENT-type HLS playlist, maintained incrementally.
//!
//! Each delivered clip becomes one `.ts` segment plus one `#EXTINF`
//! entry. The playlist is append-only from a player's point of view
//! (`EXT-X-PLAYLIST-TYPE:EVENT`); on disk it is rewritten whole to a
//! temp file and renamed over `index.m3u8` so readers never observe a
//! partial manifest.

use std::path::Path;

use anyhow::{bail, Context, Result};

pub const PLAYLIST_NAME: &str = "index.m3u8";
pub const HLS_VERSION: u32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistEntry {
    pub duration_secs: f32,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    pub target_duration: u32,
    pub entries: Vec<PlaylistEntry>,
}

impl Playlist {
    pub fn new(target_duration: u32) -> Self {
        Self {
            target_duration,
            entries: Vec::new(),
        }
    }

    /// Sequence number the next delivered clip should use; doubles as
    /// the `.ts` filename stem (`00042.ts`).
    pub fn next_sequence(&self) -> u64 {
        self.entries.len() as u64
    }

    pub fn segment_name(sequence: u64) -> String {
        format!("{:05}.ts", sequence)
    }

    pub fn push(&mut self, entry: PlaylistEntry) {
        self.entries.push(entry);
    }

    /// Ordered list of segment URIs, as a player would see them.
    pub fn segment_uris(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.uri.as_str()).collect()
    }

    pub fn render(&self) -> String {
        let max_entry = self
            .entries
            .iter()
            .map(|e| e.duration_secs.ceil() as u32)
            .max()
            .unwrap_or(0);
        let target = self.target_duration.max(max_entry);

        let mut out = String::new();
        out.push_str("#EXTM3U\n");
        out.push_str(&format!("#EXT-X-VERSION:{}\n", HLS_VERSION));
        out.push_str(&format!("#EXT-X-TARGETDURATION:{}\n", target));
        out.push_str("#EXT-X-MEDIA-SEQUENCE:0\n");
        out.push_str("#EXT-X-PLAYLIST-TYPE:EVENT\n");
        for entry in &self.entries {
            out.push_str(&format!("#EXTINF:{:.3},\n", entry.duration_secs));
            out.push_str(&entry.uri);
            out.push('\n');
        }
        out
    }

    pub fn parse(input: &str) -> Result<Self> {
        let mut lines = input.lines().map(str::trim).filter(|l| !l.is_empty());
        match lines.next() {
            Some("#EXTM3U") => {}
            other => bail!("not an m3u8 playlist, first line {:?}", other),
        }

        let mut target_duration = 0;
        let mut entries = Vec::new();
        let mut pending_duration: Option<f32> = None;

        for line in lines {
            if let Some(value) = line.strip_prefix("#EXT-X-TARGETDURATION:") {
                target_duration = value
                    .parse()
                    .with_context(|| format!("bad target duration {:?}", value))?;
            } else if let Some(value) = line.strip_prefix("#EXTINF:") {
                let duration = value
                    .trim_end_matches(',')
                    .parse()
                    .with_context(|| format!("bad EXTINF {:?}", value))?;
                pending_duration = Some(duration);
            } else if !line.starts_with('#') {
                let duration = pending_duration
                    .take()
                    .with_context(|| format!("segment {:?} without EXTINF", line))?;
                entries.push(PlaylistEntry {
                    duration_secs: duration,
                    uri: line.to_string(),
                });
            }
        }

        Ok(Self {
            target_duration,
            entries,
        })
    }

    /// Read an existing playlist or start a fresh one.
    pub async fn load_or_new(path: &Path, target_duration: u32) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => Self::parse(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new(target_duration)),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    /// Write whole manifest to a temp file, then rename over the target.
    pub async fn write_atomic(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("m3u8.tmp");
        tokio::fs::write(&tmp, self.render())
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Playlist {
        let mut p = Playlist::new(10);
        p.push(PlaylistEntry {
            duration_secs: 9.8,
            uri: "00000.ts".into(),
        });
        p.push(PlaylistEntry {
            duration_secs: 10.2,
            uri: "00001.ts".into(),
        });
        p
    }

    #[test]
    fn render_has_event_header() {
        let rendered = sample().render();
        assert!(rendered.starts_with("#EXTM3U\n"));
        assert!(rendered.contains("#EXT-X-VERSION:3"));
        assert!(rendered.contains("#EXT-X-PLAYLIST-TYPE:EVENT"));
        // 10.2s entry bumps target duration to 11.
        assert!(rendered.contains("#EXT-X-TARGETDURATION:11"));
    }

    #[test]
    fn parse_inverts_render() {
        let p = sample();
        let parsed = Playlist::parse(&p.render()).unwrap();
        assert_eq!(parsed.segment_uris(), vec!["00000.ts", "00001.ts"]);
        assert!((parsed.entries[0].duration_secs - 9.8).abs() < 1e-3);
    }

    #[test]
    fn render_is_deterministic() {
        let p = sample();
        assert_eq!(p.render(), p.render());
        let reparsed = Playlist::parse(&p.render()).unwrap();
        assert_eq!(reparsed.render(), p.render());
    }

    #[test]
    fn sequence_and_names() {
        let mut p = Playlist::new(10);
        assert_eq!(p.next_sequence(), 0);
        p.push(PlaylistEntry {
            duration_secs: 10.0,
            uri: Playlist::segment_name(0),
        });
        assert_eq!(p.next_sequence(), 1);
        assert_eq!(Playlist::segment_name(42), "00042.ts");
    }

    #[test]
    fn parse_rejects_non_playlist() {
        assert!(Playlist::parse("hello\nworld").is_err());
    }

    #[tokio::test]
    async fn load_missing_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PLAYLIST_NAME);
        let p = Playlist::load_or_new(&path, 10).await.unwrap();
        assert!(p.entries.is_empty());
        assert_eq!(p.target_duration, 10);
    }

    #[tokio::test]
    async fn atomic_write_then_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PLAYLIST_NAME);
        let p = sample();
        p.write_atomic(&path).await.unwrap();
        let reloaded = Playlist::load_or_new(&path, 10).await.unwrap();
        assert_eq!(reloaded.segment_uris(), p.segment_uris());
        // No temp file left behind.
        assert!(!path.with_extension("m3u8.tmp").exists());
    }
}
