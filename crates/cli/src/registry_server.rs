use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::TcpListener;

use facestream_core::registry::device_registry::{
    BootReport, DeviceRegistry, FaceSampleUpload, Registration,
};

const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest {
    device_id: String,
}

/// JSON API the camera firmware and its setup page talk to. Every response
/// carries permissive CORS headers and any `OPTIONS` request is a 200.
pub fn router(registry: Arc<DeviceRegistry>) -> Router {
    Router::new()
        .route("/status", get(status).fallback(not_found))
        .route("/bootCount", get(boot_count).fallback(not_found))
        .route("/register", post(register).fallback(not_found))
        .route("/data", post(data).fallback(not_found))
        .route("/face-sample", post(face_sample).fallback(not_found))
        .route("/verify", post(verify).fallback(not_found))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn(cors))
        .with_state(registry)
}

pub async fn serve(listener: TcpListener, registry: Arc<DeviceRegistry>) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        log::info!("Device registry on http://{addr}");
    }
    axum::serve(listener, router(registry)).await
}

async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not Found")
}

async fn status(State(registry): State<Arc<DeviceRegistry>>) -> Response {
    respond(registry, None, |r| r.status().map_err(|e| e.to_string())).await
}

async fn boot_count(State(registry): State<Arc<DeviceRegistry>>) -> Response {
    respond(registry, None, |r| {
        r.boot_count()
            .map(|boot_count| serde_json::json!({ "bootCount": boot_count }))
            .map_err(|e| e.to_string())
    })
    .await
}

async fn register(State(registry): State<Arc<DeviceRegistry>>, body: Bytes) -> Response {
    respond(registry, Some("Registration failed"), move |r| {
        let registration: Registration = parse(&body)?;
        r.register(registration)
            .map(|device| device.redacted())
            .map_err(|e| e.to_string())
    })
    .await
}

async fn data(State(registry): State<Arc<DeviceRegistry>>, body: Bytes) -> Response {
    respond(registry, Some("Data update failed"), move |r| {
        let report: BootReport = parse(&body)?;
        r.record_boot(report)
            .map(|device| device.redacted())
            .map_err(|e| e.to_string())
    })
    .await
}

async fn face_sample(State(registry): State<Arc<DeviceRegistry>>, body: Bytes) -> Response {
    respond(registry, None, move |r| {
        let upload: FaceSampleUpload = parse(&body)?;
        r.add_face_sample(upload).map_err(|e| e.to_string())
    })
    .await
}

async fn verify(State(registry): State<Arc<DeviceRegistry>>, body: Bytes) -> Response {
    respond(registry, None, move |r| {
        let request: VerifyRequest = parse(&body)?;
        r.verify(&request.device_id).map_err(|e| e.to_string())
    })
    .await
}

/// Runs a registry operation off the async runtime and renders its result
/// as JSON, or as `500 {"error": ...}` prefixed with `context`.
async fn respond<T, F>(
    registry: Arc<DeviceRegistry>,
    context: Option<&'static str>,
    op: F,
) -> Response
where
    T: Serialize + Send + 'static,
    F: FnOnce(&DeviceRegistry) -> Result<T, String> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || op(&registry)).await {
        Ok(Ok(value)) => Json(value).into_response(),
        Ok(Err(e)) => {
            let message = match context {
                Some(context) => format!("{context}: {e}"),
                None => e,
            };
            log::warn!("Registry request failed: {message}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &message)
        }
        Err(e) => {
            log::error!("Registry task failed: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Registry task failed")
        }
    }
}

fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T, String> {
    serde_json::from_slice(body).map_err(|e| e.to_string())
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}
