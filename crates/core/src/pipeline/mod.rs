pub mod pipeline_logger;
pub mod stream_faces_use_case;
