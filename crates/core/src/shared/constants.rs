/// Stream endpoint of the ESP32-CAM on the local network.
pub const DEFAULT_CAMERA_URL: &str = "http://192.168.1.123:81/stream";

/// Frames are upscaled before detection so small faces clear the minimum
/// detector window.
pub const DEFAULT_SCALE_FACTOR: f64 = 1.5;

/// Tracker quality (peak-to-sidelobe ratio) below which tracking is dropped.
pub const DEFAULT_TRACKING_QUALITY_THRESHOLD: f64 = 8.0;

pub const DEFAULT_JPEG_QUALITY: u8 = 95;

pub const CASCADE_MODEL_NAME: &str = "seeta_fd_frontal_v1.0.bin";
pub const CASCADE_MODEL_URL: &str =
    "https://github.com/atomashpolskiy/rustface/raw/master/model/seeta_fd_frontal_v1.0.bin";

pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Address the re-streaming server listens on.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";

/// Address the device registry listens on.
pub const DEFAULT_REGISTRY_BIND_ADDR: &str = "0.0.0.0:3000";

pub const DEFAULT_REGISTRY_FILE: &str = "devices.json";
