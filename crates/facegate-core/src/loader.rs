//! In-memory image decoding for uploaded files.

use image::RgbImage;
use thiserror::Error;

/// Image extensions accepted for upload, lower-case.
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// Whether `filename` ends in an allowed image extension.
///
/// Only the segment after the last dot counts, compared case-insensitively.
/// A name without a dot is rejected.
pub fn allowed_file(filename: &str) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ALLOWED_EXTENSIONS
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image has zero width or height")]
    Empty,
}

/// Decode an encoded image (PNG, JPEG, GIF, ...) into 8-bit RGB.
///
/// The format is sniffed from the bytes, not from the upload's filename.
/// Animated GIFs yield their first frame.
pub fn load_image(bytes: &[u8]) -> Result<RgbImage, LoadError> {
    let decoded = image::load_from_memory(bytes)?;
    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(LoadError::Empty);
    }
    Ok(decoded.to_rgb8())
}
