use std::convert::Infallible;

use axum::extract::State;
use axum::http::header;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::info;

use kanjo_core::ReceiptResult;
use kanjo_export::write_csv;
use kanjo_storage::RemoteFile;

use crate::errors::AppError;
use crate::state::AppState;

/// Capacity of the batch event channel; the pipeline blocks once the
/// client falls this far behind.
const EVENT_BUFFER: usize = 32;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ── Auth ──────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct AuthUrlResponse {
    pub auth_url: String,
    pub state: String,
}

pub async fn auth_url(
    State(state): State<AppState>,
) -> Result<Json<AuthUrlResponse>, AppError> {
    let (auth_url, state_token) = state.auth.authorize_url().await?;
    Ok(Json(AuthUrlResponse { auth_url, state: state_token }))
}

#[derive(Deserialize)]
pub struct TokenRequest {
    pub code: String,
    pub state: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
}

pub async fn auth_callback(
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let access_token = state.auth.exchange_code(&payload.code, &payload.state).await?;
    Ok(Json(TokenResponse { access_token }))
}

// ── File browsing ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ListFilesRequest {
    pub access_token: String,
    pub path: String,
}

#[derive(Serialize)]
pub struct ListFilesResponse {
    pub files: Vec<RemoteFile>,
}

pub async fn list_files(
    State(state): State<AppState>,
    Json(payload): Json<ListFilesRequest>,
) -> Result<Json<ListFilesResponse>, AppError> {
    let files = state
        .dropbox
        .list_folder(&payload.access_token, &payload.path)
        .await?;
    Ok(Json(ListFilesResponse { files }))
}

#[derive(Deserialize)]
pub struct DownloadRequest {
    pub access_token: String,
    pub file_path: String,
}

#[derive(Serialize)]
pub struct DownloadResponse {
    pub file_name: String,
    pub data_base64: String,
    pub media_type: String,
}

pub async fn download_file(
    State(state): State<AppState>,
    Json(payload): Json<DownloadRequest>,
) -> Result<Json<DownloadResponse>, AppError> {
    use kanjo_storage::FileStore;

    let (bytes, file_name) = state
        .dropbox
        .download(&payload.access_token, &payload.file_path)
        .await?;
    let media_type = media_type_for(&file_name).to_string();
    Ok(Json(DownloadResponse {
        file_name,
        data_base64: base64::engine::general_purpose::STANDARD.encode(&bytes),
        media_type,
    }))
}

fn media_type_for(file_name: &str) -> &'static str {
    match file_name.rsplit_once('.').map(|(_, ext)| ext.to_lowercase()).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("tiff") => "image/tiff",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

// ── Processing ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct OcrRequest {
    pub file_path: String,
    pub access_token: String,
}

pub async fn process_single(
    State(state): State<AppState>,
    Json(payload): Json<OcrRequest>,
) -> Result<Json<ReceiptResult>, AppError> {
    let result = state
        .pipeline
        .process_single(&payload.access_token, &payload.file_path)
        .await?;
    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct BatchOcrRequest {
    pub file_paths: Vec<String>,
    pub access_token: String,
}

/// Stream batch progress as named server-sent events. The pipeline runs
/// in a spawned task writing to a bounded channel; dropping the
/// connection drops the receiver, which the pipeline notices and stops.
pub async fn process_batch(
    State(state): State<AppState>,
    Json(payload): Json<BatchOcrRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(files = payload.file_paths.len(), "Starting batch");

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        pipeline
            .run_batch(&payload.access_token, &payload.file_paths, tx)
            .await;
    });

    let stream = ReceiverStream::new(rx)
        .map(|ev| Ok::<_, Infallible>(Event::default().event(ev.name()).data(ev.payload())));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

// ── Export ────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CsvExportRequest {
    pub results: Vec<ReceiptResult>,
}

pub async fn export_csv(
    Json(payload): Json<CsvExportRequest>,
) -> Result<impl IntoResponse, AppError> {
    let bytes = write_csv(&payload.results)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=shift_jis"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"receipts.csv\"",
            ),
        ],
        bytes,
    ))
}
