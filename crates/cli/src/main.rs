mod registry_server;
mod server;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use facestream_core::annotation::infrastructure::box_annotator::BoxAnnotator;
use facestream_core::detection::domain::face_detector::FaceDetector;
use facestream_core::detection::infrastructure::cascade_face_detector::{
    CascadeConfig, CascadeFaceDetector,
};
use facestream_core::detection::infrastructure::correlation_tracker::CorrelationTracker;
use facestream_core::detection::infrastructure::tracking_face_detector::TrackingFaceDetector;
use facestream_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facestream_core::pipeline::stream_faces_use_case::StreamFacesUseCase;
use facestream_core::registry::device_registry::DeviceRegistry;
use facestream_core::registry::infrastructure::json_device_store::JsonDeviceStore;
use facestream_core::shared::constants::{
    CASCADE_MODEL_NAME, CASCADE_MODEL_URL, DEFAULT_BIND_ADDR, DEFAULT_CAMERA_URL,
    DEFAULT_JPEG_QUALITY, DEFAULT_REGISTRY_BIND_ADDR, DEFAULT_REGISTRY_FILE, DEFAULT_SCALE_FACTOR,
    DEFAULT_TRACKING_QUALITY_THRESHOLD, DEFAULT_UPLOAD_DIR,
};
use facestream_core::shared::model_resolver;
use facestream_core::video::infrastructure::directory_snapshot_store::DirectorySnapshotStore;
use facestream_core::video::infrastructure::http_mjpeg_reader::HttpMjpegReader;
use facestream_core::video::infrastructure::jpeg_encoder::JpegEncoder;

use server::{AppState, ChunkStreamResult, StreamFactory};

/// Re-streams a network camera as MJPEG with detected faces boxed in.
#[derive(Parser)]
#[command(name = "facestream")]
struct Cli {
    /// MJPEG stream to read frames from.
    #[arg(long, default_value = DEFAULT_CAMERA_URL)]
    url: String,

    /// Address to serve the annotated stream on.
    #[arg(long, default_value = DEFAULT_BIND_ADDR)]
    bind: SocketAddr,

    /// Detection mode: track (detect once, then follow) or cascade (detect every frame).
    #[arg(long, default_value = "track")]
    mode: String,

    /// Resize factor applied to each frame before detection.
    #[arg(long, default_value_t = DEFAULT_SCALE_FACTOR)]
    scale: f64,

    /// Tracking quality below which the face is considered lost.
    #[arg(long, default_value_t = DEFAULT_TRACKING_QUALITY_THRESHOLD)]
    quality_threshold: f64,

    /// JPEG quality of the re-encoded frames (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY)]
    jpeg_quality: u8,

    /// Smallest face the detector looks for, in pixels.
    #[arg(long, default_value_t = 20)]
    min_face_size: u32,

    /// Cascade model file (downloaded to the cache when omitted).
    #[arg(long)]
    model: Option<PathBuf>,

    /// Directory for images posted to /upload.
    #[arg(long, default_value = DEFAULT_UPLOAD_DIR)]
    upload_dir: PathBuf,

    /// Address to serve the device registry API on.
    #[arg(long, default_value = DEFAULT_REGISTRY_BIND_ADDR)]
    registry_bind: SocketAddr,

    /// JSON file holding registered devices and face samples.
    #[arg(long, default_value = DEFAULT_REGISTRY_FILE)]
    registry_file: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Track,
    Cascade,
}

/// Everything a viewer's stream needs, captured once at startup.
struct StreamSettings {
    url: String,
    mode: Mode,
    model_path: PathBuf,
    cascade: CascadeConfig,
    scale: f64,
    quality_threshold: f64,
    jpeg_quality: u8,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let model_path = match &cli.model {
        Some(path) => path.clone(),
        None => resolve_model()?,
    };
    let cascade = CascadeConfig {
        min_face_size: cli.min_face_size,
        ..CascadeConfig::default()
    };
    // Surface an unreadable model at startup.
    CascadeFaceDetector::new(&model_path, &cascade)?;

    let settings = StreamSettings {
        url: cli.url,
        mode: parse_mode(&cli.mode),
        model_path,
        cascade,
        scale: cli.scale,
        quality_threshold: cli.quality_threshold,
        jpeg_quality: cli.jpeg_quality,
    };
    log::info!(
        "Re-streaming {} in {:?} mode (scale {}, tracking quality {})",
        settings.url,
        settings.mode,
        settings.scale,
        settings.quality_threshold
    );
    let streams: StreamFactory = Arc::new(move || build_stream(&settings));
    let state = AppState::new(
        streams,
        Arc::new(DirectorySnapshotStore::new(&cli.upload_dir)),
    );

    let registry = Arc::new(DeviceRegistry::new(Box::new(JsonDeviceStore::new(
        &cli.registry_file,
    ))));
    log::info!("Device registry file: {}", cli.registry_file.display());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let (bind, registry_bind) = (cli.bind, cli.registry_bind);
    runtime.block_on(async move {
        let listener = TcpListener::bind(bind).await?;
        let registry_listener = TcpListener::bind(registry_bind).await?;
        tokio::try_join!(
            server::serve(listener, state),
            registry_server::serve(registry_listener, registry),
        )
        .map(|_| ())
    })?;
    Ok(())
}

/// Builds one viewer's pipeline. Each call gets its own camera connection,
/// detector and tracker.
fn build_stream(settings: &StreamSettings) -> ChunkStreamResult {
    let cascade: Box<dyn FaceDetector> = Box::new(CascadeFaceDetector::new(
        &settings.model_path,
        &settings.cascade,
    )?);
    let detector: Box<dyn FaceDetector> = match settings.mode {
        Mode::Cascade => cascade,
        Mode::Track => Box::new(TrackingFaceDetector::new(
            cascade,
            Box::new(CorrelationTracker::new()),
            settings.quality_threshold,
        )?),
    };

    let use_case = StreamFacesUseCase::new(
        Box::new(HttpMjpegReader::new()?),
        detector,
        Box::new(BoxAnnotator::default()),
        Box::new(JpegEncoder::new(settings.jpeg_quality)),
        settings.scale,
        Box::new(StdoutPipelineLogger::default()),
    );
    Ok(Box::new(use_case.into_stream(&settings.url)))
}

fn resolve_model() -> Result<PathBuf, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {CASCADE_MODEL_NAME}");
    let path = model_resolver::resolve(
        CASCADE_MODEL_NAME,
        CASCADE_MODEL_URL,
        None,
        Some(Box::new(download_progress)),
    )?;
    eprintln!();
    Ok(path)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !(cli.url.starts_with("http://") || cli.url.starts_with("https://")) {
        return Err(format!("Stream URL must be http:// or https://, got '{}'", cli.url).into());
    }
    if cli.mode != "track" && cli.mode != "cascade" {
        return Err(format!("Mode must be 'track' or 'cascade', got '{}'", cli.mode).into());
    }
    if !cli.scale.is_finite() || cli.scale <= 0.0 {
        return Err(format!("Scale must be a positive number, got {}", cli.scale).into());
    }
    if !cli.quality_threshold.is_finite() || cli.quality_threshold < 0.0 {
        return Err(format!(
            "Quality threshold must be zero or greater, got {}",
            cli.quality_threshold
        )
        .into());
    }
    if !(1..=100).contains(&cli.jpeg_quality) {
        return Err(format!(
            "JPEG quality must be between 1 and 100, got {}",
            cli.jpeg_quality
        )
        .into());
    }
    CascadeConfig {
        min_face_size: cli.min_face_size,
        ..CascadeConfig::default()
    }
    .validate()?;
    if cli.bind == cli.registry_bind && cli.bind.port() != 0 {
        return Err(format!("Stream and registry servers cannot share {}", cli.bind).into());
    }
    if let Some(model) = &cli.model {
        if !model.is_file() {
            return Err(format!("Model file not found: {}", model.display()).into());
        }
    }
    Ok(())
}

fn parse_mode(mode: &str) -> Mode {
    if mode == "cascade" {
        Mode::Cascade
    } else {
        Mode::Track
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}
