//! HTTP façade: start/stop pipelines, health, stats, live event stream,
//! static HLS + web client mounts.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::capture::{start_capture, CaptureRegistry};
use crate::chain::{ChainConfig, ConversionChain};
use crate::config::{AppConfig, VOICE_CLONE_LANG};
use crate::media::ffmpeg::FfmpegEngine;
use crate::services::synthesize::ElevenLabsClient;
use crate::services::transcribe::WhisperClient;
use crate::services::translate::DeepLClient;
use crate::services::{Synthesizer, Translator};
use crate::telemetry::TelemetryRecorder;
use crate::watcher::{watch_segments, WatcherOptions};

pub type PipelineKey = (String, String);

/// One running watcher; the channel's capture is shared through the
/// [`CaptureRegistry`] and not owned here.
pub struct PipelineHandle {
    pub run_id: Uuid,
    pub recorder: TelemetryRecorder,
    cancel: CancellationToken,
    watcher: JoinHandle<()>,
}

impl PipelineHandle {
    fn shutdown(self) {
        self.cancel.cancel();
        self.watcher.abort();
    }
}

pub struct AppState {
    pub config: AppConfig,
    pipelines: Mutex<HashMap<PipelineKey, PipelineHandle>>,
    captures: CaptureRegistry,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            pipelines: Mutex::new(HashMap::new()),
            captures: CaptureRegistry::new(),
        }
    }

    pub async fn active_keys(&self) -> Vec<String> {
        let pipelines = self.pipelines.lock().await;
        let mut keys: Vec<String> = pipelines
            .keys()
            .map(|(channel, lang)| format!("{}/{}", channel, lang))
            .collect();
        keys.sort();
        keys
    }

    pub async fn shutdown_all(&self) {
        let mut pipelines = self.pipelines.lock().await;
        for ((channel, lang), handle) in pipelines.drain() {
            info!(channel, lang, "stopping pipeline");
            handle.shutdown();
        }
        self.captures.stop_all().await;
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let web_root = state.config.web_root.clone();
    // External players need CORS and must never cache a live EVENT
    // manifest.
    let hls = Router::new()
        .fallback_service(ServeDir::new(state.config.hls_root.clone()))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(CorsLayer::permissive());

    Router::new()
        .route("/start/{channel}/{lang}", post(start_pipeline))
        .route("/stop/{channel}/{lang}", post(stop_pipeline))
        .route("/stop/{channel}", post(stop_channel))
        .route("/health", get(health))
        .route("/stats/{channel}/{lang}", get(stats))
        .route("/events/{channel}/{lang}", get(events))
        .nest("/hls", hls)
        .fallback_service(ServeDir::new(web_root))
        .with_state(state)
}

#[derive(Serialize)]
struct StartResponse {
    status: &'static str,
    run_id: Uuid,
    playlist: String,
}

async fn start_pipeline(
    State(state): State<Arc<AppState>>,
    Path((channel, lang)): Path<(String, String)>,
) -> impl IntoResponse {
    let mut pipelines = state.pipelines.lock().await;
    let key = (channel.clone(), lang.clone());
    if pipelines.contains_key(&key) {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": "pipeline already running" })),
        );
    }

    let config = &state.config;
    let segment_dir = config.segment_dir(&channel);
    let processed_dir = config.processed_dir(&channel, &lang);
    let hls_dir = config.hls_dir(&channel, &lang);

    // One capture per channel, shared across language pipelines.
    let acquired = state
        .captures
        .acquire(&channel, || {
            start_capture(&channel, &segment_dir, config.segment_seconds)
        })
        .await;
    if let Err(e) = acquired {
        error!(channel, "capture failed to start: {:#}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("capture failed: {e}") })),
        );
    }

    let recorder = TelemetryRecorder::new();
    let chain = build_chain(config, &lang, processed_dir, hls_dir, recorder.clone());
    if let Err(e) = chain.init().await {
        error!(channel, lang, "chain init failed: {:#}", e);
        state.captures.release(&channel).await;
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("init failed: {e}") })),
        );
    }

    let cancel = CancellationToken::new();
    let options = WatcherOptions {
        poll_interval: std::time::Duration::from_millis(config.poll_interval_ms),
        min_segment_bytes: config.min_segment_bytes,
    };
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        let recorder = recorder.clone();
        async move {
            watch_segments(segment_dir, &chain, options, recorder, cancel).await;
        }
    });

    let run_id = Uuid::new_v4();
    pipelines.insert(
        key,
        PipelineHandle {
            run_id,
            recorder,
            cancel,
            watcher,
        },
    );
    info!(channel, lang, %run_id, "pipeline started");

    (
        StatusCode::OK,
        Json(
            serde_json::to_value(StartResponse {
                status: "ok",
                run_id,
                playlist: format!("/hls/{}/{}/index.m3u8", channel, lang),
            })
            .unwrap_or_default(),
        ),
    )
}

fn build_chain(
    config: &AppConfig,
    lang: &str,
    processed_dir: std::path::PathBuf,
    hls_dir: std::path::PathBuf,
    recorder: TelemetryRecorder,
) -> ConversionChain {
    let transcriber = Arc::new(WhisperClient::new(
        &config.whisper_base_url,
        config.whisper_api_key.clone(),
        &config.whisper_model,
    ));
    let translator: Option<Arc<dyn Translator>> = config
        .deepl_api_key
        .clone()
        .map(|key| Arc::new(DeepLClient::new(key)) as Arc<dyn Translator>);
    let synthesizer: Option<Arc<dyn Synthesizer>> =
        config.elevenlabs_api_key.clone().map(|key| {
            Arc::new(ElevenLabsClient::new(
                key,
                config.elevenlabs_voice_id.clone(),
                VOICE_CLONE_LANG,
            )) as Arc<dyn Synthesizer>
        });

    ConversionChain::new(
        transcriber,
        translator,
        synthesizer,
        Arc::new(FfmpegEngine),
        processed_dir,
        hls_dir,
        ChainConfig {
            source_lang: config.source_lang.clone(),
            target_lang: lang.to_string(),
            segment_seconds: config.segment_seconds,
        },
        recorder,
    )
}

async fn stop_pipeline(
    State(state): State<Arc<AppState>>,
    Path((channel, lang)): Path<(String, String)>,
) -> impl IntoResponse {
    let mut pipelines = state.pipelines.lock().await;
    match pipelines.remove(&(channel.clone(), lang.clone())) {
        Some(handle) => {
            info!(channel, lang, "pipeline stopped");
            handle.shutdown();
            state.captures.release(&channel).await;
            (StatusCode::OK, Json(json!({ "status": "stopped" })))
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no such pipeline" })),
        ),
    }
}

/// Stop every language pipeline for a channel.
async fn stop_channel(
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
) -> impl IntoResponse {
    let mut pipelines = state.pipelines.lock().await;
    let keys: Vec<PipelineKey> = pipelines
        .keys()
        .filter(|(ch, _)| *ch == channel)
        .cloned()
        .collect();
    if keys.is_empty() {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no such pipeline" })),
        );
    }
    let stopped = keys.len();
    for key in keys {
        if let Some(handle) = pipelines.remove(&key) {
            info!(channel = %key.0, lang = %key.1, "pipeline stopped");
            handle.shutdown();
            state.captures.release(&key.0).await;
        }
    }
    (StatusCode::OK, Json(json!({ "status": "stopped", "count": stopped })))
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let active = state.active_keys().await;
    Json(json!({ "status": "ok", "active": active }))
}

async fn stats(
    State(state): State<Arc<AppState>>,
    Path((channel, lang)): Path<(String, String)>,
) -> impl IntoResponse {
    let pipelines = state.pipelines.lock().await;
    match pipelines.get(&(channel, lang)) {
        Some(handle) => {
            let snapshot = handle.recorder.snapshot();
            (
                StatusCode::OK,
                Json(serde_json::to_value(snapshot).unwrap_or_default()),
            )
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no such pipeline" })),
        ),
    }
}

/// Server-sent stream of the pipeline's telemetry events. Carries
/// indices, counts and skip reasons only, never transcript text.
async fn events(
    State(state): State<Arc<AppState>>,
    Path((channel, lang)): Path<(String, String)>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let recorder = {
        let pipelines = state.pipelines.lock().await;
        match pipelines.get(&(channel, lang)) {
            Some(handle) => handle.recorder.clone(),
            None => {
                return Err((
                    StatusCode::NOT_FOUND,
                    Json(json!({ "error": "no such pipeline" })),
                ))
            }
        }
    };

    let stream = BroadcastStream::new(recorder.subscribe())
        .filter_map(|event| event.ok())
        .map(|event| Event::default().json_data(&event));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
