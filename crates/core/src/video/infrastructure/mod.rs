pub mod directory_snapshot_store;
pub mod http_mjpeg_reader;
pub mod jpeg_encoder;
pub mod mjpeg_parser;
