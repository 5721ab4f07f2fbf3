use std::path::PathBuf;

/// Persists still images pushed to the server by a camera.
pub trait SnapshotStore: Send + Sync {
    /// Stores `data` and returns where it was written.
    fn save(
        &self,
        data: &[u8],
        content_type: Option<&str>,
    ) -> Result<PathBuf, Box<dyn std::error::Error>>;
}
