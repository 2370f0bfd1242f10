//! Photo preprocessing and text recognition for serial plates

pub mod otsu;
pub mod recognition;

pub use otsu::{binarize, otsu_threshold};
pub use recognition::{CommandRecognizer, Recognition, RecognitionError, Recognizer, recognize_serial};

use std::io::Cursor;

use image::{ImageFormat, RgbaImage};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("image has no pixels")]
    Empty,
}

/// Decode a photo (PNG or JPEG) into RGBA pixels
pub fn decode(bytes: &[u8]) -> Result<RgbaImage, ImagingError> {
    let image = image::load_from_memory(bytes)?.to_rgba8();
    if image.width() == 0 || image.height() == 0 {
        return Err(ImagingError::Empty);
    }
    Ok(image)
}

/// Encode pixels as PNG (lossless, so the binarization survives)
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ImagingError> {
    let mut cursor = Cursor::new(Vec::new());
    image.write_to(&mut cursor, ImageFormat::Png)?;
    Ok(cursor.into_inner())
}
