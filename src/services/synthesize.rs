//! ElevenLabs text-to-speech client.
//!
//! Requests raw 16 kHz PCM and writes the clip as a mono WAV, the format
//! the rest of the chain (duration probe, normalize step) expects.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use super::{error_for_status, Synthesizer, VendorError};

const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";
/// Stock multilingual voice used when no cloned voice applies.
const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";
const MODEL_ID: &str = "eleven_multilingual_v2";

pub const SYNTH_SAMPLE_RATE: u32 = 16_000;

#[derive(Clone)]
pub struct ElevenLabsClient {
    client: Client,
    base_url: String,
    api_key: String,
    /// Cloned reference voice, used only for `clone_lang` targets.
    clone_voice_id: Option<String>,
    clone_lang: String,
}

impl ElevenLabsClient {
    pub fn new(api_key: String, clone_voice_id: Option<String>, clone_lang: &str) -> Self {
        Self::with_base_url(api_key, clone_voice_id, clone_lang, ELEVENLABS_BASE_URL)
    }

    pub fn with_base_url(
        api_key: String,
        clone_voice_id: Option<String>,
        clone_lang: &str,
        base_url: &str,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            clone_voice_id,
            clone_lang: clone_lang.to_string(),
        }
    }

    fn voice_for(&self, lang: &str) -> &str {
        match &self.clone_voice_id {
            Some(id) if lang.eq_ignore_ascii_case(&self.clone_lang) => id,
            _ => DEFAULT_VOICE_ID,
        }
    }
}

#[async_trait]
impl Synthesizer for ElevenLabsClient {
    async fn synthesize(&self, text: &str, lang: &str, out_wav: &Path) -> Result<(), VendorError> {
        let voice = self.voice_for(lang);
        let url = format!(
            "{}/v1/text-to-speech/{}?output_format=pcm_16000",
            self.base_url, voice
        );

        let resp = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&json!({
                "text": text,
                "model_id": MODEL_ID,
            }))
            .send()
            .await?;
        let resp = error_for_status(resp).await?;

        let pcm = resp.bytes().await?;
        if pcm.len() < 2 {
            return Err(VendorError::Malformed("empty audio body".into()));
        }

        write_pcm_wav(out_wav, &pcm, SYNTH_SAMPLE_RATE)?;
        debug!(voice, lang, bytes = pcm.len(), clip = %out_wav.display(), "synthesized");
        Ok(())
    }
}

/// Wrap raw little-endian s16 PCM in a mono WAV container.
fn write_pcm_wav(path: &Path, pcm: &[u8], sample_rate: u32) -> Result<(), VendorError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for chunk in pcm.chunks_exact(2) {
        writer.write_sample(i16::from_le_bytes([chunk[0], chunk[1]]))?;
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_voice_only_for_clone_lang() {
        let client = ElevenLabsClient::new("key".into(), Some("cloned-id".into()), "en");
        assert_eq!(client.voice_for("en"), "cloned-id");
        assert_eq!(client.voice_for("EN"), "cloned-id");
        assert_eq!(client.voice_for("fr"), DEFAULT_VOICE_ID);
    }

    #[test]
    fn default_voice_without_clone_id() {
        let client = ElevenLabsClient::new("key".into(), None, "en");
        assert_eq!(client.voice_for("en"), DEFAULT_VOICE_ID);
    }

    #[test]
    fn pcm_wav_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        let samples: Vec<i16> = vec![0, 1000, -1000, i16::MAX];
        let pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();

        write_pcm_wav(&path, &pcm, SYNTH_SAMPLE_RATE).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, SYNTH_SAMPLE_RATE);
        assert_eq!(reader.spec().channels, 1);
        let read: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(read, samples);
    }
}
