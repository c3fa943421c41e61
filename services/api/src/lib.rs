//! HTTP surface of the lyra music generator: a welcome page, static service
//! metadata, and three routes that run (or re-serve) a generation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;

use generator::{AssetKind, Assets, GenerateError};

pub const DEFAULT_PORT: u16 = 5500;

/// Fixed output artifact, overwritten on every generation.
const MIDI_FILENAME: &str = "generatedMIDI.mid";

pub struct AppState {
    data_dir: PathBuf,
    midi_path: PathBuf,
    /// Loaded (corpus, weights) pairs, keyed by selection.
    assets: Mutex<HashMap<AssetKind, Arc<Assets>>>,
    /// Serializes writes to and reads of the shared output file.
    midi_lock: Mutex<()>,
}

impl AppState {
    pub fn new(data_dir: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            midi_path: out_dir.into().join(MIDI_FILENAME),
            assets: Mutex::new(HashMap::new()),
            midi_lock: Mutex::new(()),
        }
    }

    async fn assets_for(&self, kind: AssetKind) -> Result<Arc<Assets>, GenerateError> {
        let mut cache = self.assets.lock().await;
        if let Some(assets) = cache.get(&kind) {
            return Ok(Arc::clone(assets));
        }
        let assets = Arc::new(Assets::load(kind, &self.data_dir)?);
        cache.insert(kind, Arc::clone(&assets));
        Ok(assets)
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/data", get(data))
        .route("/midi", get(midi))
        .route("/generate", get(generate))
        .route("/download", post(download))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index() -> &'static str {
    "Welcome to the lyra AI music generator\n(The server is up and running!)"
}

#[derive(Serialize)]
struct ServiceData {
    name: &'static str,
    description: &'static str,
    version: &'static str,
}

async fn data() -> Json<ServiceData> {
    Json(ServiceData {
        name: "lyra",
        description: "AI music generator",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Re-serve the most recently generated file.
async fn midi(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let _guard = state.midi_lock.lock().await;
    match tokio::fs::read(&state.midi_path).await {
        Ok(bytes) => Ok(midi_attachment(bytes)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(ApiError::NoMidiYet),
        Err(err) => Err(ApiError::Io(err)),
    }
}

/// Generation with the default (C-major) selection.
async fn generate(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    run_generation(&state, AssetKind::default()).await
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    /// Accepted for interface compatibility; generation does not use it.
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub scale: Option<String>,
}

async fn download(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DownloadRequest>,
) -> Result<Response, ApiError> {
    let kind = AssetKind::from_scale(req.scale.as_deref().unwrap_or_default());
    tracing::info!(key = ?req.key, scale = ?req.scale, ?kind, "download request");
    run_generation(&state, kind).await
}

async fn run_generation(state: &AppState, kind: AssetKind) -> Result<Response, ApiError> {
    let assets = state.assets_for(kind).await?;
    let bytes = generator::generate_midi(&assets, &mut rand::thread_rng())?;

    let _guard = state.midi_lock.lock().await;
    if let Some(parent) = state.midi_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(&state.midi_path, &bytes).await?;
    Ok(midi_attachment(bytes))
}

fn midi_attachment(bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "audio/midi"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"generatedMIDI.mid\"",
            ),
        ],
        bytes,
    )
        .into_response()
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("no MIDI file has been generated yet")]
    NoMidiYet,
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NoMidiYet => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
