use std::path::PathBuf;

/// Environment lookup seam so config resolution is testable without
/// mutating process-wide env vars.
pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

pub const ENV_DEEPL_API_KEY: &str = "DEEPL_API_KEY";
pub const ENV_ELEVENLABS_API_KEY: &str = "ELEVENLABS_API_KEY";
pub const ENV_ELEVENLABS_VOICE_ID: &str = "ELEVENLABS_VOICE_ID";
pub const ENV_WHISPER_BASE_URL: &str = "WHISPER_BASE_URL";
pub const ENV_WHISPER_API_KEY: &str = "WHISPER_API_KEY";
pub const ENV_WHISPER_MODEL: &str = "WHISPER_MODEL";
pub const ENV_SOURCE_LANG: &str = "SOURCE_LANG";
pub const ENV_SEGMENT_SECONDS: &str = "SEGMENT_SECONDS";
pub const ENV_POLL_INTERVAL_MS: &str = "POLL_INTERVAL_MS";
pub const ENV_MIN_SEGMENT_BYTES: &str = "MIN_SEGMENT_BYTES";
pub const ENV_BIND_ADDR: &str = "BIND_ADDR";

pub const DEFAULT_WHISPER_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_WHISPER_MODEL: &str = "whisper-1";
pub const DEFAULT_SOURCE_LANG: &str = "pt";
pub const DEFAULT_SEGMENT_SECONDS: u32 = 10;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_MIN_SEGMENT_BYTES: u64 = 8 * 1024;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

/// Language whose synthesis uses the cloned reference voice.
pub const VOICE_CLONE_LANG: &str = "en";

/// Service configuration, resolved once at startup.
///
/// Missing vendor keys are soft: the corresponding step degrades at
/// runtime instead of failing startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub deepl_api_key: Option<String>,
    pub elevenlabs_api_key: Option<String>,
    pub elevenlabs_voice_id: Option<String>,

    pub whisper_base_url: String,
    pub whisper_api_key: Option<String>,
    pub whisper_model: String,

    pub source_lang: String,
    pub segment_seconds: u32,
    pub poll_interval_ms: u64,
    pub min_segment_bytes: u64,

    pub segments_root: PathBuf,
    pub hls_root: PathBuf,
    pub web_root: PathBuf,
    pub bind_addr: String,
}

impl AppConfig {
    pub fn from_env(env: &impl Env) -> Self {
        Self {
            deepl_api_key: resolve_optional(env, ENV_DEEPL_API_KEY),
            elevenlabs_api_key: resolve_optional(env, ENV_ELEVENLABS_API_KEY),
            elevenlabs_voice_id: resolve_optional(env, ENV_ELEVENLABS_VOICE_ID),

            whisper_base_url: env
                .var(ENV_WHISPER_BASE_URL)
                .unwrap_or_else(|| DEFAULT_WHISPER_BASE_URL.to_string()),
            whisper_api_key: resolve_optional(env, ENV_WHISPER_API_KEY),
            whisper_model: env
                .var(ENV_WHISPER_MODEL)
                .unwrap_or_else(|| DEFAULT_WHISPER_MODEL.to_string()),

            source_lang: env
                .var(ENV_SOURCE_LANG)
                .unwrap_or_else(|| DEFAULT_SOURCE_LANG.to_string()),
            segment_seconds: parse_or(env, ENV_SEGMENT_SECONDS, DEFAULT_SEGMENT_SECONDS),
            poll_interval_ms: parse_or(env, ENV_POLL_INTERVAL_MS, DEFAULT_POLL_INTERVAL_MS),
            min_segment_bytes: parse_or(env, ENV_MIN_SEGMENT_BYTES, DEFAULT_MIN_SEGMENT_BYTES),

            segments_root: PathBuf::from("audio_segments"),
            hls_root: PathBuf::from("hls"),
            web_root: PathBuf::from("web/dist"),
            bind_addr: env
                .var(ENV_BIND_ADDR)
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        }
    }

    /// Directory the capture adapter writes raw segments into.
    pub fn segment_dir(&self, channel: &str) -> PathBuf {
        self.segments_root.join(channel)
    }

    /// Directory synthesized clips and the accumulator live in. Keyed
    /// by language as well: two dubs of one channel must not interleave
    /// their timelines.
    pub fn processed_dir(&self, channel: &str, lang: &str) -> PathBuf {
        self.segment_dir(channel).join("processed").join(lang)
    }

    /// Public HLS output directory for one channel/language pair.
    pub fn hls_dir(&self, channel: &str, lang: &str) -> PathBuf {
        self.hls_root.join(channel).join(lang)
    }
}

fn resolve_optional(env: &impl Env, key: &str) -> Option<String> {
    env.var(key).filter(|v| !v.trim().is_empty())
}

fn parse_or<T: std::str::FromStr + Copy>(env: &impl Env, key: &str, default: T) -> T {
    env.var(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
