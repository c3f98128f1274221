//! Image processor - decoding and dimension probing

use image::{DynamicImage, ImageReader};
use retouch_core::{Dimensions, PipelineError, SelectedFile};
use std::io::Cursor;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Empty file")]
    EmptyFile,

    #[error("Unrecognized image data: {0}")]
    Unreadable(String),

    #[error("Decode task failed: {0}")]
    TaskFailed(String),
}

impl From<DecodeError> for PipelineError {
    fn from(err: DecodeError) -> Self {
        PipelineError::Decode(err.to_string())
    }
}

/// Decode the full image, guessing the format from its content.
pub fn decode_image(data: &[u8]) -> Result<DynamicImage, DecodeError> {
    if data.is_empty() {
        return Err(DecodeError::EmptyFile);
    }

    let cursor = Cursor::new(data);
    let reader = ImageReader::new(cursor)
        .with_guessed_format()
        .map_err(|e| DecodeError::Unreadable(e.to_string()))?;
    reader
        .decode()
        .map_err(|e| DecodeError::Unreadable(e.to_string()))
}

/// Pixel dimensions from the image header, without decoding any pixel data.
pub fn read_dimensions(data: &[u8]) -> Result<Dimensions, DecodeError> {
    if data.is_empty() {
        return Err(DecodeError::EmptyFile);
    }

    let (width, height) = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| DecodeError::Unreadable(e.to_string()))?
        .into_dimensions()
        .map_err(|e| DecodeError::Unreadable(e.to_string()))?;
    Ok(Dimensions::new(width, height))
}

/// Pixel dimensions of `file`, read from its header the first time.
///
/// Only the header is trusted here; a truncated body still probes successfully. Use
/// [`verify_decodes`] once the dimensions are known to be acceptable.
pub fn probe_dimensions(file: &SelectedFile) -> Result<Dimensions, DecodeError> {
    if let Some(dims) = file.cached_dimensions() {
        return Ok(dims);
    }

    let dims = read_dimensions(file.data())?;

    tracing::debug!(
        file = %file.name(),
        dimensions = %dims,
        "Probed image dimensions"
    );

    Ok(file.remember_dimensions(dims))
}

/// Fully decode `file` on a blocking thread, failing on a corrupt or truncated body.
pub async fn verify_decodes(file: &SelectedFile) -> Result<(), DecodeError> {
    let data = file.data().clone();
    tokio::task::spawn_blocking(move || decode_image(&data).map(|_| ()))
        .await
        .map_err(|e| DecodeError::TaskFailed(e.to_string()))?
}
