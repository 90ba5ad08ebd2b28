//! Hosted vendor clients: speech-to-text, translation, speech synthesis.
//!
//! Each step sits behind a trait so the conversion chain can run against
//! stubs in tests. Production impls are thin reqwest clients.

pub mod synthesize;
pub mod transcribe;
pub mod translate;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VendorError {
    #[error("http transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("api status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("wav encode: {0}")]
    Wav(#[from] hound::Error),
}

/// Speech-to-text over one segment file.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// `language` is a forced source-language hint, not auto-detection.
    async fn transcribe(&self, wav: &Path, language: &str) -> Result<String, VendorError>;
}

/// Text translation into the pipeline's target language.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, VendorError>;
}

/// Text-to-speech; writes the synthesized clip as a WAV at `out_wav`.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, lang: &str, out_wav: &Path) -> Result<(), VendorError>;
}

pub(crate) async fn error_for_status(resp: reqwest::Response) -> Result<reqwest::Response, VendorError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(VendorError::Api {
        status: status.as_u16(),
        body,
    })
}
