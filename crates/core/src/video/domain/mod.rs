pub mod frame_encoder;
pub mod frame_source;
pub mod snapshot_store;
pub mod stream_info;
