//! Upload persistence with randomized names.

use std::fs;
use std::path::{Path, PathBuf};

use rand::RngCore;

use crate::upload::sniff::sniff_mime;
use crate::upload::validator::{extension, validate, UploadCategory, UploadDescriptor, UploadRejection};

const STORED_NAME_BYTES: usize = 16;

/// A successfully persisted upload.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub original_name: String,
    pub stored_name: String,
    pub path: PathBuf,
    pub size: u64,
    pub mime: String,
}

/// Re-validate and persist an upload under a randomized filename.
///
/// Only the sanitized original extension survives into the stored name;
/// with 16 random bytes the collision probability is negligible. Files are
/// written with owner-only permissions on unix.
pub fn store(
    descriptor: &UploadDescriptor,
    category: UploadCategory,
    max_size: u64,
    dir: &Path,
) -> Result<StoredUpload, Vec<UploadRejection>> {
    validate(descriptor, category, max_size)?;

    let stored_name = randomized_name(&descriptor.original_name);
    let path = dir.join(&stored_name);

    let io_failure = |e: std::io::Error| {
        vec![UploadRejection::Transfer(format!(
            "could not persist file: {}",
            e
        ))]
    };

    fs::create_dir_all(dir).map_err(io_failure)?;
    fs::write(&path, &descriptor.bytes).map_err(io_failure)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).map_err(io_failure)?;
    }

    let mime = sniff_mime(&descriptor.bytes)
        .unwrap_or(descriptor.declared_mime.as_str())
        .to_string();

    Ok(StoredUpload {
        original_name: descriptor.original_name.clone(),
        stored_name,
        path,
        size: descriptor.size,
        mime,
    })
}

/// Random hex name preserving only the original extension.
fn randomized_name(original: &str) -> String {
    let mut bytes = [0u8; STORED_NAME_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let stem: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();

    let ext: String = extension(original)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    if ext.is_empty() {
        stem
    } else {
        format!("{}.{}", stem, ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::validator::TransferStatus;

    const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

    fn png_upload() -> UploadDescriptor {
        UploadDescriptor {
            original_name: "id-card.png".into(),
            declared_mime: "image/png".into(),
            size: PNG_MAGIC.len() as u64,
            bytes: PNG_MAGIC.to_vec(),
            transfer: TransferStatus::Ok,
        }
    }

    #[test]
    fn test_store_writes_randomized_name() {
        let dir = tempfile::tempdir().unwrap();
        let stored = store(&png_upload(), UploadCategory::Image, 1024, dir.path()).unwrap();

        assert!(stored.path.exists());
        assert!(stored.stored_name.ends_with(".png"));
        assert_ne!(stored.stored_name, "id-card.png");
        // 16 bytes hex + ".png"
        assert_eq!(stored.stored_name.len(), 32 + 4);
        assert_eq!(stored.mime, "image/png");
        assert_eq!(fs::read(&stored.path).unwrap(), PNG_MAGIC);
    }

    #[test]
    fn test_store_revalidates() {
        let dir = tempfile::tempdir().unwrap();
        let mut upload = png_upload();
        upload.bytes = vec![0x4D, 0x5A, 0x00, 0x00];
        upload.size = 4;

        let reasons = store(&upload, UploadCategory::Image, 1024, dir.path()).unwrap_err();
        assert!(!reasons.is_empty());
        // Nothing was written.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_names_do_not_collide() {
        let a = randomized_name("a.png");
        let b = randomized_name("a.png");
        assert_ne!(a, b);
    }

    #[test]
    fn test_extension_sanitized() {
        let name = randomized_name("evil.p/../../ng");
        assert!(!name.contains('/'));
        assert!(!name.contains(".."));
    }

    #[cfg(unix)]
    #[test]
    fn test_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let stored = store(&png_upload(), UploadCategory::Image, 1024, dir.path()).unwrap();
        let mode = fs::metadata(&stored.path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
