pub mod json_device_store;
