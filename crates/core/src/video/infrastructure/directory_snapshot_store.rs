use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::video::domain::snapshot_store::SnapshotStore;

/// Writes uploaded snapshots into a directory as
/// `<unix-millis>-<seq>.<ext>`.
///
/// The directory is created on first write. The extension follows the
/// declared content type and defaults to `jpg`, matching what the camera
/// firmware posts.
pub struct DirectorySnapshotStore {
    dir: PathBuf,
    seq: AtomicU64,
}

impl DirectorySnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            seq: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn next_file_name(&self, content_type: Option<&str>) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        format!("{millis}-{seq}.{}", extension_for(content_type))
    }
}

impl SnapshotStore for DirectorySnapshotStore {
    fn save(
        &self,
        data: &[u8],
        content_type: Option<&str>,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(self.next_file_name(content_type));
        std::fs::write(&path, data)?;
        log::info!("Stored {} byte snapshot at {}", data.len(), path.display());
        Ok(path)
    }
}

fn extension_for(content_type: Option<&str>) -> &'static str {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|m| m.trim().to_ascii_lowercase());
    match mime.as_deref() {
        Some("image/png") => "png",
        Some("image/bmp") => "bmp",
        Some("image/webp") => "webp",
        Some("application/octet-stream") => "bin",
        _ => "jpg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_save_creates_directory_and_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirectorySnapshotStore::new(tmp.path().join("uploads"));
        let path = store.save(&[0xFF, 0xD8, 0xFF, 0xD9], Some("image/jpeg")).unwrap();
        assert!(path.starts_with(store.dir()));
        assert_eq!(path.extension().unwrap(), "jpg");
        assert_eq!(std::fs::read(&path).unwrap(), vec![0xFF, 0xD8, 0xFF, 0xD9]);
    }

    #[test]
    fn test_successive_saves_do_not_collide() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirectorySnapshotStore::new(tmp.path());
        let a = store.save(b"a", None).unwrap();
        let b = store.save(b"b", None).unwrap();
        assert_ne!(a, b);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_empty_upload_is_stored_as_empty_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirectorySnapshotStore::new(tmp.path());
        let path = store.save(&[], Some("image/jpeg")).unwrap();
        assert_eq!(std::fs::metadata(path).unwrap().len(), 0);
    }

    #[test]
    fn test_unwritable_dir_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let store = DirectorySnapshotStore::new(blocker.join("sub"));
        assert!(store.save(b"data", None).is_err());
    }

    #[rstest]
    #[case(None, "jpg")]
    #[case(Some("image/jpeg"), "jpg")]
    #[case(Some("IMAGE/PNG"), "png")]
    #[case(Some("image/webp; charset=binary"), "webp")]
    #[case(Some("application/octet-stream"), "bin")]
    #[case(Some("text/plain"), "jpg")]
    fn test_extension_for(#[case] content_type: Option<&str>, #[case] expected: &str) {
        assert_eq!(extension_for(content_type), expected);
    }
}
