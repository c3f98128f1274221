//! Aspect-preserving downsizing to the configured maximum dimensions.

use bytes::Bytes;
use image::imageops::FilterType;
use image::GenericImageView;
use retouch_core::{Dimensions, PipelineError, SelectedFile};

use super::encode::{EncodeFormat, HIGH_QUALITY};
use super::processor::{decode_image, probe_dimensions, DecodeError};

#[derive(Debug, thiserror::Error)]
pub enum ResizeError {
    #[error("Could not decode source image: {0}")]
    Decode(#[from] DecodeError),

    #[error("Cannot re-encode content type: {0}")]
    UnsupportedFormat(String),

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Resize task failed: {0}")]
    TaskFailed(String),
}

impl From<ResizeError> for PipelineError {
    fn from(err: ResizeError) -> Self {
        PipelineError::Resize(err.to_string())
    }
}

/// Compute the scaled size for `source`, or `None` when it already fits.
///
/// Uses a single scale factor `min(max_w / w, max_h / h)` so the aspect ratio is kept,
/// rounds to the nearest pixel, and clamps to `[1, max]` on each axis.
pub fn target_dimensions(source: Dimensions, max_width: u32, max_height: u32) -> Option<Dimensions> {
    if source.fits_within(max_width, max_height) {
        return None;
    }

    let scale = f64::min(
        max_width as f64 / source.width as f64,
        max_height as f64 / source.height as f64,
    );

    let width = ((source.width as f64 * scale).round() as u32).clamp(1, max_width.max(1));
    let height = ((source.height as f64 * scale).round() as u32).clamp(1, max_height.max(1));
    Some(Dimensions::new(width, height))
}

/// Downsizes images that exceed the maximum width or height.
#[derive(Debug, Clone, Copy)]
pub struct DimensionNormalizer {
    max_width: u32,
    max_height: u32,
}

impl DimensionNormalizer {
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width,
            max_height,
        }
    }

    /// Return `file` itself when it fits, otherwise a resized copy in the same format.
    pub async fn normalize(&self, file: &SelectedFile) -> Result<SelectedFile, ResizeError> {
        let source = probe_dimensions(file)?;

        let Some(target) = target_dimensions(source, self.max_width, self.max_height) else {
            tracing::debug!(dimensions = %source, "Image within bounds, skipping resize");
            return Ok(file.clone());
        };

        let format = EncodeFormat::from_content_type(file.content_type())
            .ok_or_else(|| ResizeError::UnsupportedFormat(file.content_type().to_string()))?;

        tracing::debug!(
            from = %source,
            to = %target,
            format = ?format,
            "Resizing image"
        );

        let data = file.data().clone();
        let (encoded, actual) = tokio::task::spawn_blocking(move || {
            let img = decode_image(&data)?;
            let resized = img.resize_exact(target.width, target.height, FilterType::Lanczos3);
            let (width, height) = resized.dimensions();
            let encoded = format
                .encode(&resized, HIGH_QUALITY)
                .map_err(|e| ResizeError::Encode(e.to_string()))?;
            Ok::<_, ResizeError>((encoded, Dimensions::new(width, height)))
        })
        .await
        .map_err(|e| ResizeError::TaskFailed(e.to_string()))??;

        Ok(file.derive(format.to_mime_type(), Bytes::from(encoded), actual))
    }
}
