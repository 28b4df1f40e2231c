//! Inline images embedded into the rendered bill.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::ImageFormat;
use std::fs;
use std::path::{Path, PathBuf};

use super::validation::RequestLimits;
use super::GeneratorError;

/// Rendered width of the inline image.
pub const IMAGE_WIDTH_MM: u32 = 30;

/// OOXML drawing units per millimetre.
pub const EMU_PER_MM: u64 = 36_000;

/// A decoded image written into the workspace, sized for the document.
#[derive(Debug, Clone)]
pub struct InlineImage {
    path: PathBuf,
    extension: &'static str,
    mime_type: &'static str,
    width_emu: u64,
    height_emu: u64,
}

impl InlineImage {
    /// Decode `payload` and write it as `image.<ext>` inside `dir`.
    pub fn from_base64(
        payload: &str,
        dir: &Path,
        limits: &RequestLimits,
    ) -> Result<Self, GeneratorError> {
        let bytes = decode_payload(payload)?;
        if bytes.len() > limits.max_image_bytes {
            return Err(GeneratorError::InvalidImage(format!(
                "image is {} bytes, limit is {}",
                bytes.len(),
                limits.max_image_bytes
            )));
        }

        let format = image::guess_format(&bytes)
            .map_err(|e| GeneratorError::InvalidImage(e.to_string()))?;
        let (extension, mime_type) = match format {
            ImageFormat::Png => ("png", "image/png"),
            ImageFormat::Jpeg => ("jpeg", "image/jpeg"),
            ImageFormat::Gif => ("gif", "image/gif"),
            ImageFormat::Bmp => ("bmp", "image/bmp"),
            other => {
                return Err(GeneratorError::InvalidImage(format!(
                    "unsupported image format {:?}",
                    other
                )))
            }
        };

        let decoded = image::load_from_memory_with_format(&bytes, format)
            .map_err(|e| GeneratorError::InvalidImage(e.to_string()))?;
        let (width, height) = (decoded.width(), decoded.height());
        if width == 0 || height == 0 {
            return Err(GeneratorError::InvalidImage("image has no pixels".into()));
        }

        let path = dir.join(format!("image.{}", extension));
        fs::write(&path, &bytes).map_err(|e| GeneratorError::InvalidImage(e.to_string()))?;

        let width_emu = u64::from(IMAGE_WIDTH_MM) * EMU_PER_MM;
        let height_emu = width_emu * u64::from(height) / u64::from(width);

        Ok(Self {
            path,
            extension,
            mime_type,
            width_emu,
            height_emu: height_emu.max(1),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn extension(&self) -> &'static str {
        self.extension
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    /// Width and height in EMU.
    pub fn extent(&self) -> (u64, u64) {
        (self.width_emu, self.height_emu)
    }
}

/// Strip an optional `data:` URL header and whitespace, then decode.
fn decode_payload(payload: &str) -> Result<Vec<u8>, GeneratorError> {
    let data = match payload.split_once(";base64,") {
        Some((header, rest)) if header.starts_with("data:") => rest,
        _ => payload,
    };
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(GeneratorError::InvalidImage("image payload is empty".into()));
    }

    BASE64
        .decode(compact.as_bytes())
        .map_err(|e| GeneratorError::InvalidImage(e.to_string()))
}
