pub mod device_registry;
pub mod domain;
pub mod infrastructure;
