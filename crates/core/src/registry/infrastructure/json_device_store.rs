use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::registry::domain::device::Device;
use crate::registry::domain::device_store::DeviceStore;

/// Keeps the device list as a pretty-printed JSON array in one file.
///
/// A missing file reads as an empty registry. Writes go to a sibling temp
/// file that is then renamed over the original.
pub struct JsonDeviceStore {
    path: PathBuf,
}

impl JsonDeviceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DeviceStore for JsonDeviceStore {
    fn load(&self) -> Result<Vec<Device>, Box<dyn std::error::Error>> {
        match fs::read_to_string(&self.path) {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, devices: &[Device]) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(devices)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        log::debug!("Saved {} devices to {}", devices.len(), self.path.display());
        Ok(())
    }
}
