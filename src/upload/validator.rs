//! Multi-stage upload validation.
//!
//! # Responsibilities
//! - Check transfer status, size, extension, declared MIME, and sniffed
//!   content MIME against the category's allow-lists
//! - Accumulate every failed stage instead of stopping at the first
//!
//! # Design Decisions
//! - Validation is pure: no filesystem access, no logging
//! - The content sniff runs even when earlier stages fail, so a caller
//!   sees the complete picture in one round trip

use thiserror::Error;

use crate::upload::sniff::sniff_mime;

/// Allow-list category an upload is validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadCategory {
    Image,
    Document,
    Archive,
}

impl UploadCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadCategory::Image => "image",
            UploadCategory::Document => "document",
            UploadCategory::Archive => "archive",
        }
    }

    /// Extensions accepted for this category, lowercase without the dot.
    pub fn allowed_extensions(self) -> &'static [&'static str] {
        match self {
            UploadCategory::Image => &["jpg", "jpeg", "png", "gif", "webp"],
            UploadCategory::Document => &["pdf", "doc", "docx"],
            UploadCategory::Archive => &["zip"],
        }
    }

    /// MIME types accepted for this category, for both the declared value
    /// and the content sniff.
    pub fn allowed_mimes(self) -> &'static [&'static str] {
        match self {
            UploadCategory::Image => &["image/jpeg", "image/png", "image/gif", "image/webp"],
            UploadCategory::Document => &[
                "application/pdf",
                "application/msword",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                // docx containers sniff as plain zip.
                "application/zip",
            ],
            UploadCategory::Archive => &["application/zip", "application/x-zip-compressed"],
        }
    }
}

impl std::str::FromStr for UploadCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(UploadCategory::Image),
            "document" => Ok(UploadCategory::Document),
            "archive" => Ok(UploadCategory::Archive),
            _ => Err(()),
        }
    }
}

/// Transport-level outcome reported by the upload handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Ok,
    /// Body exceeded the transport's own limit.
    TooLarge,
    /// Connection dropped mid-body.
    Partial,
    /// No file arrived at all.
    Missing,
}

impl TransferStatus {
    fn describe(self) -> &'static str {
        match self {
            TransferStatus::Ok => "ok",
            TransferStatus::TooLarge => "body exceeded transport limit",
            TransferStatus::Partial => "transfer was interrupted",
            TransferStatus::Missing => "no file was received",
        }
    }
}

/// An upload as received from the transport, before any persistence.
#[derive(Debug, Clone)]
pub struct UploadDescriptor {
    pub original_name: String,
    pub declared_mime: String,
    pub size: u64,
    pub bytes: Vec<u8>,
    pub transfer: TransferStatus,
}

/// One failed validation stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadRejection {
    #[error("upload failed: {0}")]
    Transfer(String),

    #[error("file size {size} exceeds the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("file type .{0} is not allowed")]
    Extension(String),

    #[error("declared content type {0} is not allowed")]
    DeclaredMime(String),

    #[error("file content identified as {detected} is not an allowed type")]
    ContentMime { detected: String },
}

/// Run every validation stage, accumulating failures.
pub fn validate(
    descriptor: &UploadDescriptor,
    category: UploadCategory,
    max_size: u64,
) -> Result<(), Vec<UploadRejection>> {
    let mut reasons = Vec::new();

    if descriptor.transfer != TransferStatus::Ok {
        reasons.push(UploadRejection::Transfer(
            descriptor.transfer.describe().to_string(),
        ));
    }

    if descriptor.size > max_size {
        reasons.push(UploadRejection::TooLarge {
            size: descriptor.size,
            limit: max_size,
        });
    }

    let ext = extension(&descriptor.original_name);
    if !category.allowed_extensions().contains(&ext.as_str()) {
        reasons.push(UploadRejection::Extension(ext));
    }

    if !category
        .allowed_mimes()
        .contains(&descriptor.declared_mime.as_str())
    {
        reasons.push(UploadRejection::DeclaredMime(
            descriptor.declared_mime.clone(),
        ));
    }

    match sniff_mime(&descriptor.bytes) {
        Some(detected) if category.allowed_mimes().contains(&detected) => {}
        detected => reasons.push(UploadRejection::ContentMime {
            detected: detected.unwrap_or("unknown").to_string(),
        }),
    }

    if reasons.is_empty() {
        Ok(())
    } else {
        Err(reasons)
    }
}

/// Lowercased extension of `name`, empty when there is none.
pub fn extension(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
    const MAX: u64 = 1024;

    fn png_upload() -> UploadDescriptor {
        UploadDescriptor {
            original_name: "avatar.png".into(),
            declared_mime: "image/png".into(),
            size: PNG_MAGIC.len() as u64,
            bytes: PNG_MAGIC.to_vec(),
            transfer: TransferStatus::Ok,
        }
    }

    #[test]
    fn test_valid_image_passes() {
        assert!(validate(&png_upload(), UploadCategory::Image, MAX).is_ok());
    }

    #[test]
    fn test_executable_extension_rejected() {
        let mut upload = png_upload();
        upload.original_name = "tool.exe".into();

        let reasons = validate(&upload, UploadCategory::Image, MAX).unwrap_err();
        assert!(reasons
            .iter()
            .any(|r| matches!(r, UploadRejection::Extension(ext) if ext == "exe")));
        // The reason text mentions the file type.
        assert!(reasons.iter().any(|r| r.to_string().contains("file type")));
    }

    #[test]
    fn test_spoofed_content_caught_by_sniff() {
        // Declared PNG, real bytes are a DOS executable: stages a-d pass,
        // the content sniff must still reject.
        let mut upload = png_upload();
        upload.bytes = vec![0x4D, 0x5A, 0x90, 0x00];
        upload.size = 4;

        let reasons = validate(&upload, UploadCategory::Image, MAX).unwrap_err();
        assert_eq!(reasons.len(), 1);
        assert!(matches!(
            &reasons[0],
            UploadRejection::ContentMime { detected } if detected == "application/x-dosexec"
        ));
    }

    #[test]
    fn test_oversize_rejected() {
        let mut upload = png_upload();
        upload.size = MAX + 1;

        let reasons = validate(&upload, UploadCategory::Image, MAX).unwrap_err();
        assert!(reasons
            .iter()
            .any(|r| matches!(r, UploadRejection::TooLarge { .. })));
    }

    #[test]
    fn test_failures_accumulate() {
        // Wrong everything: transfer error, too large, bad extension, bad
        // declared MIME, unknown content.
        let upload = UploadDescriptor {
            original_name: "payload.exe".into(),
            declared_mime: "application/octet-stream".into(),
            size: MAX + 1,
            bytes: b"#!/bin/sh".to_vec(),
            transfer: TransferStatus::Partial,
        };

        let reasons = validate(&upload, UploadCategory::Image, MAX).unwrap_err();
        assert_eq!(reasons.len(), 5);
    }

    #[test]
    fn test_document_category() {
        let upload = UploadDescriptor {
            original_name: "thesis.pdf".into(),
            declared_mime: "application/pdf".into(),
            size: 10,
            bytes: b"%PDF-1.5\n".to_vec(),
            transfer: TransferStatus::Ok,
        };
        assert!(validate(&upload, UploadCategory::Document, MAX).is_ok());
        // The same file is not an acceptable image.
        assert!(validate(&upload, UploadCategory::Image, MAX).is_err());
    }

    #[test]
    fn test_extension_helper() {
        assert_eq!(extension("a.PNG"), "png");
        assert_eq!(extension("archive.tar.gz"), "gz");
        assert_eq!(extension("noext"), "");
        assert_eq!(extension(".hidden"), "");
    }
}
