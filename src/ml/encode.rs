use std::io::Cursor;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{DynamicImage, ImageFormat};

use crate::error::{PipelineError, PipelineResult};
use crate::media::mimetype;

/// An image ready for transport: base64 payload plus its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: String,
    pub base64: String,
}

impl EncodedImage {
    /// Encodes an in-memory frame as JPEG.
    pub fn from_image(image: &DynamicImage) -> PipelineResult<Self> {
        // The JPEG encoder rejects alpha channels.
        let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
        let mut buffer = Vec::new();
        rgb.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)
            .map_err(|e| PipelineError::FrameUnreadable(format!("JPEG encoding failed: {e}")))?;

        Ok(Self::from_bytes("image/jpeg", &buffer))
    }

    /// Reads an already-extracted frame from disk without re-encoding it.
    pub fn from_file(path: &Path) -> PipelineResult<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| PipelineError::FrameUnreadable(format!("{}: {e}", path.display())))?;

        let mime_type = mimetype::detect_image_mime(&bytes).ok_or_else(|| {
            PipelineError::FrameUnreadable(format!("{} is not a recognised image", path.display()))
        })?;

        Ok(Self::from_bytes(mime_type, &bytes))
    }

    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            base64: BASE64.encode(bytes),
        }
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }
}
