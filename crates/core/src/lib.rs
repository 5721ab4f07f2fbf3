pub mod annotation;
pub mod detection;
pub mod pipeline;
pub mod registry;
pub mod shared;
pub mod video;
