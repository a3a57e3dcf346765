//! Upload format detection.
//!
//! Only the magic bytes are inspected; the declared content type of a
//! multipart part is not trusted.

use image::ImageFormat;

use crate::error::CoreError;

/// Image formats accepted as edit input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
}

impl ImageKind {
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

/// Detect the format of an uploaded image, rejecting anything but PNG/JPEG.
pub fn sniff(bytes: &[u8]) -> Result<ImageKind, CoreError> {
    if bytes.is_empty() {
        return Err(CoreError::Validation("Image is empty".to_string()));
    }
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => Ok(ImageKind::Png),
        Ok(ImageFormat::Jpeg) => Ok(ImageKind::Jpeg),
        Ok(other) => Err(CoreError::Validation(format!(
            "Invalid image format: {other:?}. Must be JPEG or PNG"
        ))),
        Err(_) => Err(CoreError::Validation(
            "Invalid image format: unrecognized data. Must be JPEG or PNG".to_string(),
        )),
    }
}
