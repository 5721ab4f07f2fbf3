use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::domain::device::{Device, EnrollmentProgress, FaceSample};
use super::domain::device_store::DeviceStore;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Device not found")]
    DeviceNotFound,
    #[error("Device not found or enrollment incomplete")]
    NotEnrolled,
    #[error("Device store failed: {0}")]
    Store(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub device_id: String,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootReport {
    pub device_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceSampleUpload {
    pub device_id: String,
    #[serde(default)]
    pub sample_id: Option<u64>,
    /// Base64-encoded face crop.
    pub face_data: String,
}

/// Setup state of the most recently created device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub first_boot: bool,
    pub is_registered: bool,
    pub face_enrolled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub verified: bool,
}

/// Device registration, boot counting and face enrollment over a
/// [`DeviceStore`].
///
/// Every operation loads, changes and saves the full list under one lock,
/// so concurrent requests never lose each other's writes. "Latest" means
/// the last record in the list: registering an id again replaces its old
/// record and moves it to the end.
pub struct DeviceRegistry {
    store: Box<dyn DeviceStore>,
    lock: Mutex<()>,
}

impl DeviceRegistry {
    pub fn new(store: Box<dyn DeviceStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    pub fn status(&self) -> Result<DeviceStatus, RegistryError> {
        let devices = self.load()?;
        Ok(match devices.last() {
            Some(device) => DeviceStatus {
                first_boot: device.first_boot,
                is_registered: device.is_registered,
                face_enrolled: device.is_enrolled(),
            },
            None => DeviceStatus {
                first_boot: true,
                is_registered: false,
                face_enrolled: false,
            },
        })
    }

    pub fn boot_count(&self) -> Result<u64, RegistryError> {
        Ok(self.load()?.last().map_or(0, |d| d.boot_count))
    }

    pub fn register(&self, registration: Registration) -> Result<Device, RegistryError> {
        self.update(|devices| {
            let mut device = Device::new(registration.device_id, now_millis());
            device.owner_name = registration.owner_name;
            device.password = registration.password;
            device.location = registration.location;
            device.first_boot = false;
            device.is_registered = true;
            device.face_data.face_id = Some(1);

            devices.retain(|d| d.device_id != device.device_id);
            devices.push(device.clone());
            log::info!("Registered device {}", device.device_id);
            Ok(device)
        })
    }

    /// Counts a boot, creating the device on its first report.
    pub fn record_boot(&self, report: BootReport) -> Result<Device, RegistryError> {
        self.update(|devices| {
            let index = match devices.iter().position(|d| d.device_id == report.device_id) {
                Some(index) => index,
                None => {
                    log::info!("New device {} reported its first boot", report.device_id);
                    devices.push(Device::new(report.device_id, now_millis()));
                    devices.len() - 1
                }
            };
            let device = &mut devices[index];
            device.record_boot();
            Ok(device.clone())
        })
    }

    pub fn add_face_sample(
        &self,
        upload: FaceSampleUpload,
    ) -> Result<EnrollmentProgress, RegistryError> {
        self.update(|devices| {
            let device = devices
                .iter_mut()
                .find(|d| d.device_id == upload.device_id)
                .ok_or(RegistryError::DeviceNotFound)?;
            let progress = device.add_face_sample(FaceSample {
                sample_id: upload.sample_id,
                timestamp: now_millis(),
                data: upload.face_data,
            });
            log::info!(
                "Device {}: {} face samples (enrollment complete: {})",
                device.device_id,
                progress.samples_collected,
                progress.enrollment_complete
            );
            Ok(progress)
        })
    }

    pub fn verify(&self, device_id: &str) -> Result<Verification, RegistryError> {
        let devices = self.load()?;
        match devices.iter().find(|d| d.device_id == device_id) {
            Some(device) if device.is_enrolled() => Ok(Verification { verified: true }),
            _ => Err(RegistryError::NotEnrolled),
        }
    }

    fn load(&self) -> Result<Vec<Device>, RegistryError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.store
            .load()
            .map_err(|e| RegistryError::Store(e.to_string()))
    }

    fn update<T>(
        &self,
        change: impl FnOnce(&mut Vec<Device>) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut devices = self
            .store
            .load()
            .map_err(|e| RegistryError::Store(e.to_string()))?;
        let result = change(&mut devices)?;
        self.store
            .save(&devices)
            .map_err(|e| RegistryError::Store(e.to_string()))?;
        Ok(result)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
