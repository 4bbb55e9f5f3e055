//! Content-based MIME detection.
//!
//! Inspects leading magic bytes rather than trusting caller-declared
//! metadata. The table covers the types the validator accepts plus common
//! executable signatures, so a spoofed extension resolves to its real type.

struct Signature {
    magic: &'static [u8],
    mime: &'static str,
}

const SIGNATURES: &[Signature] = &[
    Signature {
        magic: &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
        mime: "image/png",
    },
    Signature {
        magic: &[0xFF, 0xD8, 0xFF],
        mime: "image/jpeg",
    },
    Signature {
        magic: b"GIF87a",
        mime: "image/gif",
    },
    Signature {
        magic: b"GIF89a",
        mime: "image/gif",
    },
    Signature {
        magic: b"%PDF-",
        mime: "application/pdf",
    },
    Signature {
        magic: &[0x50, 0x4B, 0x03, 0x04],
        mime: "application/zip",
    },
    Signature {
        magic: &[0x50, 0x4B, 0x05, 0x06],
        mime: "application/zip",
    },
    Signature {
        magic: &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1],
        mime: "application/msword",
    },
    Signature {
        magic: &[0x7F, 0x45, 0x4C, 0x46],
        mime: "application/x-executable",
    },
    Signature {
        magic: &[0x4D, 0x5A],
        mime: "application/x-dosexec",
    },
];

/// Identify the MIME type of `bytes` from magic signatures.
///
/// Returns `None` when no known signature matches.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    // RIFF containers need a second probe at offset 8.
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" {
        if &bytes[8..12] == b"WEBP" {
            return Some("image/webp");
        }
        return None;
    }

    SIGNATURES
        .iter()
        .find(|sig| bytes.starts_with(sig.magic))
        .map(|sig| sig.mime)
}
