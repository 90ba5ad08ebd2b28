//! DeepL translation client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{error_for_status, Translator, VendorError};

const DEEPL_BASE_URL: &str = "https://api-free.deepl.com";

#[derive(Clone)]
pub struct DeepLClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct TranslateResponse {
    translations: Vec<Translation>,
}

#[derive(Deserialize)]
struct Translation {
    text: String,
}

impl DeepLClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEEPL_BASE_URL)
    }

    pub fn with_base_url(api_key: String, base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl Translator for DeepLClient {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, VendorError> {
        let url = format!("{}/v2/translate", self.base_url);
        // Omitting source_lang asks DeepL to auto-detect.
        let target = target_lang.to_uppercase();
        let params = [("text", text), ("target_lang", target.as_str())];

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
            .form(&params)
            .send()
            .await?;
        let resp = error_for_status(resp).await?;

        let parsed: TranslateResponse = resp.json().await?;
        parsed
            .translations
            .into_iter()
            .next()
            .map(|t| t.text)
            .ok_or_else(|| VendorError::Malformed("empty translations array".into()))
    }
}
