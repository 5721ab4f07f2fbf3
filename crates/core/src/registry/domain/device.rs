use serde::{Deserialize, Serialize};

/// Face samples a device must submit before its owner counts as enrolled.
pub const ENROLLMENT_SAMPLES: usize = 5;

/// A camera known to the registry, as stored and as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub device_id: String,
    /// Unix milliseconds at which the record was created.
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub first_boot: bool,
    pub is_registered: bool,
    pub boot_count: u64,
    #[serde(default)]
    pub face_data: FaceData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_id: Option<u32>,
    #[serde(default)]
    pub samples: Vec<FaceSample>,
    #[serde(default)]
    pub enrolled: bool,
    #[serde(default)]
    pub enrollment_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceSample {
    #[serde(default)]
    pub sample_id: Option<u64>,
    pub timestamp: u64,
    /// Base64 image data exactly as the device sent it.
    pub data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentProgress {
    pub samples_collected: usize,
    pub enrollment_complete: bool,
}

impl Device {
    /// A device seen for the first time through a boot report.
    pub fn new(device_id: impl Into<String>, timestamp: u64) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp,
            owner_name: None,
            password: None,
            location: None,
            first_boot: true,
            is_registered: false,
            boot_count: 0,
            face_data: FaceData::default(),
        }
    }

    /// Bumps the boot counter. Every boot after the first clears `first_boot`.
    pub fn record_boot(&mut self) {
        self.boot_count += 1;
        if self.boot_count > 1 {
            self.first_boot = false;
        }
    }

    pub fn add_face_sample(&mut self, sample: FaceSample) -> EnrollmentProgress {
        self.face_data.samples.push(sample);
        if self.face_data.samples.len() >= ENROLLMENT_SAMPLES {
            self.face_data.enrolled = true;
            self.face_data.enrollment_complete = true;
        }
        self.enrollment_progress()
    }

    pub fn enrollment_progress(&self) -> EnrollmentProgress {
        EnrollmentProgress {
            samples_collected: self.face_data.samples.len(),
            enrollment_complete: self.face_data.enrollment_complete,
        }
    }

    pub fn is_enrolled(&self) -> bool {
        self.face_data.enrollment_complete
    }

    /// Copy safe to hand back to clients.
    pub fn redacted(&self) -> Device {
        Device {
            password: None,
            ..self.clone()
        }
    }
}
