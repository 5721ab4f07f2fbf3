use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use futures_util::stream;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use facestream_core::shared::multipart;
use facestream_core::video::domain::snapshot_store::SnapshotStore;

/// Chunks buffered between a client's frame loop and its HTTP body.
const CHUNK_BUFFER: usize = 2;
const MAX_UPLOAD_BYTES: usize = 8 * 1024 * 1024;

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
  <head><title>facestream</title></head>
  <body>
    <h1>Live camera</h1>
    <img src="/video_feed" alt="live camera feed">
  </body>
</html>
"#;

pub type ChunkStream = Box<dyn Iterator<Item = Vec<u8>>>;
pub type ChunkStreamResult = Result<ChunkStream, Box<dyn std::error::Error>>;

/// Builds a fresh chunk stream for one viewer. Called on that viewer's
/// frame-loop thread.
pub type StreamFactory = Arc<dyn Fn() -> ChunkStreamResult + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    streams: StreamFactory,
    store: Arc<dyn SnapshotStore>,
}

impl AppState {
    pub fn new(streams: StreamFactory, store: Arc<dyn SnapshotStore>) -> Self {
        Self { streams, store }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index).fallback(not_found))
        .route("/video_feed", get(video_feed).fallback(not_found))
        .route("/upload", post(upload).fallback(not_found))
        .route("/healthz", get(healthz).fallback(not_found))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        log::info!("Serving on http://{addr}");
    }
    axum::serve(listener, router(state)).await
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}

async fn video_feed(State(state): State<AppState>) -> Response {
    let (tx, rx) = mpsc::channel::<Vec<u8>>(CHUNK_BUFFER);
    let streams = state.streams.clone();
    let spawned = std::thread::Builder::new()
        .name("stream-client".into())
        .spawn(move || drive_stream(streams, tx));
    if let Err(e) = spawned {
        log::error!("Failed to start stream thread: {e}");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Error starting stream").into_response();
    }

    let chunks = stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|chunk| (Ok::<_, Infallible>(Bytes::from(chunk)), rx))
    });
    (
        [(header::CONTENT_TYPE, multipart::stream_content_type())],
        Body::from_stream(chunks),
    )
        .into_response()
}

/// Runs one viewer's frame loop until the camera stream ends or the
/// viewer goes away. Dropping the stream releases the camera connection.
fn drive_stream(streams: StreamFactory, tx: mpsc::Sender<Vec<u8>>) {
    let chunks = match streams() {
        Ok(chunks) => chunks,
        Err(e) => {
            log::error!("Could not set up stream: {e}");
            return;
        }
    };
    for chunk in chunks {
        if tx.blocking_send(chunk).is_err() {
            log::info!("Viewer disconnected");
            return;
        }
    }
    log::info!("Camera stream ended");
}

async fn upload(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let store = state.store.clone();
    let saved = tokio::task::spawn_blocking(move || {
        store
            .save(&body, content_type.as_deref())
            .map_err(|e| e.to_string())
    })
    .await;

    match saved {
        Ok(Ok(_)) => (
            StatusCode::OK,
            [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
            "Image uploaded successfully",
        )
            .into_response(),
        Ok(Err(e)) => {
            log::error!("Upload error: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error saving image").into_response()
        }
        Err(e) => {
            log::error!("Upload task failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error saving image").into_response()
        }
    }
}
