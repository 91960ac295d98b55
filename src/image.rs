//! Image attachment loading and validation.
//!
//! The size and format gates run locally, before any network interaction;
//! a rejected file never reaches the transport client.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::gemini::Part;

/// Client-side limit for uploaded images.
pub const MAX_IMAGE_BYTES: u64 = 4 * 1024 * 1024;

/// Rejection message for the size gate.
pub const IMAGE_TOO_LARGE: &str = "El tamaño de la imagen debe ser inferior a 4MB.";

/// Rejection message for unsupported formats.
pub const IMAGE_UNSUPPORTED: &str = "Formato no compatible. Usa una imagen PNG, JPG o WEBP.";

const SUPPORTED_IMAGE_MIMES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

/// An accepted image, ready to become an inline-data request part.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageAttachment {
    /// Loads an image from disk, enforcing the 4 MiB size gate and the
    /// PNG/JPEG/WEBP format gate. Format detection uses magic bytes, not
    /// the file extension.
    pub fn load(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path)
            .map_err(|e| anyhow!("No se pudo abrir '{}': {}", path.display(), e))?;
        if metadata.len() > MAX_IMAGE_BYTES {
            bail!(IMAGE_TOO_LARGE);
        }

        let bytes = fs::read(path)
            .map_err(|e| anyhow!("No se pudo leer '{}': {}", path.display(), e))?;
        let mime_type = detect_image_mime(&bytes).ok_or_else(|| anyhow!(IMAGE_UNSUPPORTED))?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            file_name,
            mime_type,
            bytes,
        })
    }

    /// Base64 inline-data part for the request body. Encoding happens here,
    /// before the request is assembled.
    pub fn to_part(&self) -> Part {
        Part::Inline {
            mime_type: self.mime_type.clone(),
            data: BASE64.encode(&self.bytes),
        }
    }

    pub fn size_label(&self) -> String {
        format!("{:.0} KB", self.bytes.len() as f64 / 1024.0)
    }
}

fn detect_image_mime(bytes: &[u8]) -> Option<String> {
    let kind = infer::get(bytes)?;
    let mime = kind.mime_type();
    SUPPORTED_IMAGE_MIMES
        .contains(&mime)
        .then(|| mime.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0];

    fn file_with(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn accepts_a_png_by_magic_bytes() {
        let mut data = PNG_MAGIC.to_vec();
        data.extend_from_slice(&[0u8; 64]);
        let file = file_with(&data);

        let attachment = ImageAttachment::load(file.path()).unwrap();
        assert_eq!(attachment.mime_type, "image/png");
        assert_eq!(attachment.bytes, data);
    }

    #[test]
    fn accepts_a_jpeg_by_magic_bytes() {
        let mut data = JPEG_MAGIC.to_vec();
        data.extend_from_slice(&[0u8; 64]);
        let file = file_with(&data);

        let attachment = ImageAttachment::load(file.path()).unwrap();
        assert_eq!(attachment.mime_type, "image/jpeg");
    }

    #[test]
    fn rejects_oversized_files_with_the_literal_message() {
        let data = vec![0u8; (MAX_IMAGE_BYTES + 1) as usize];
        let file = file_with(&data);

        let err = ImageAttachment::load(file.path()).unwrap_err();
        assert_eq!(err.to_string(), IMAGE_TOO_LARGE);
    }

    #[test]
    fn rejects_unsupported_formats() {
        let file = file_with(b"esto no es una imagen");

        let err = ImageAttachment::load(file.path()).unwrap_err();
        assert_eq!(err.to_string(), IMAGE_UNSUPPORTED);
    }

    #[test]
    fn to_part_carries_mime_and_base64_payload() {
        let mut data = PNG_MAGIC.to_vec();
        data.extend_from_slice(b"pixels");
        let file = file_with(&data);
        let attachment = ImageAttachment::load(file.path()).unwrap();

        match attachment.to_part() {
            Part::Inline { mime_type, data: encoded } => {
                assert_eq!(mime_type, "image/png");
                assert_eq!(BASE64.decode(encoded).unwrap(), data);
            }
            Part::Text(_) => panic!("expected an inline part"),
        }
    }
}
