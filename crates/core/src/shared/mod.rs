pub mod constants;
pub mod frame;
pub mod model_resolver;
pub mod multipart;
pub mod region;
