pub mod device;
pub mod device_store;
