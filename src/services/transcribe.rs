//! OpenAI-compatible Whisper transcription client.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{error_for_status, Transcriber, VendorError};

#[derive(Clone)]
pub struct WhisperClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl WhisperClient {
    /// `api_key` is optional: self-hosted OpenAI-compatible servers
    /// accept unauthenticated requests.
    pub fn new(base_url: &str, api_key: Option<String>, model: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Transcriber for WhisperClient {
    async fn transcribe(&self, wav: &Path, language: &str) -> Result<String, VendorError> {
        let bytes = tokio::fs::read(wav).await?;

        let part = multipart::Part::bytes(bytes)
            .file_name("segment.wav")
            .mime_str("audio/wav")?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("language", language.to_string());

        let url = format!("{}/audio/transcriptions", self.base_url);
        let mut req = self.client.post(&url).multipart(form);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let resp = error_for_status(req.send().await?).await?;
        let parsed: TranscriptionResponse = resp.json().await?;
        let text = parsed.text.trim().to_string();
        debug!(segment = %wav.display(), chars = text.len(), "transcribed");
        Ok(text)
    }
}
