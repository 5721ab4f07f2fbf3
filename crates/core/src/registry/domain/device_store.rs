use super::device::Device;

/// Persists the full device list, oldest registration first.
pub trait DeviceStore: Send + Sync {
    /// Returns every stored device. An empty store yields an empty list.
    fn load(&self) -> Result<Vec<Device>, Box<dyn std::error::Error>>;

    fn save(&self, devices: &[Device]) -> Result<(), Box<dyn std::error::Error>>;
}
