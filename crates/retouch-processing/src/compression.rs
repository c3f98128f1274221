use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use retouch_core::{Dimensions, PipelineError, SelectedFile};

use crate::image::{decode_image, DecodeError, EncodeFormat};

/// JPEG qualities tried, best first, before dimensions are touched.
const QUALITY_STEPS: [u8; 8] = [90, 80, 70, 60, 50, 40, 30, 20];

/// Quality used once the encoder starts shrinking dimensions.
const FLOOR_QUALITY: u8 = 20;

/// Each shrink step keeps this fraction of the previous edge length.
const SHRINK_FACTOR: f64 = 0.85;

/// Smallest edge the encoder will shrink to before giving up.
const MIN_EDGE: u32 = 16;

#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    #[error("Could not decode source image: {0}")]
    Decode(#[from] DecodeError),

    #[error("Cannot compress content type: {0}")]
    UnsupportedFormat(String),

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Could not fit under {target} bytes (smallest attempt: {smallest} bytes)")]
    BudgetUnreachable { target: usize, smallest: usize },

    #[error("Compression task failed: {0}")]
    TaskFailed(String),
}

impl From<CompressionError> for PipelineError {
    fn from(err: CompressionError) -> Self {
        PipelineError::Compression(err.to_string())
    }
}

/// Re-encodes images that exceed a byte budget.
///
/// Output is always at or under the budget; when no candidate fits the call fails
/// instead of returning the closest miss.
#[derive(Debug, Clone, Copy)]
pub struct SizeBudgetCompressor {
    target_bytes: usize,
    bounds: Dimensions,
}

impl SizeBudgetCompressor {
    /// Every candidate fits inside `bounds`; a zero edge disables the cap.
    pub fn new(target_bytes: usize, bounds: Dimensions) -> Self {
        Self {
            target_bytes,
            bounds,
        }
    }

    pub fn target_bytes(&self) -> usize {
        self.target_bytes
    }

    /// Return `file` itself when it is within budget, otherwise a smaller re-encode.
    pub async fn compress(&self, file: &SelectedFile) -> Result<SelectedFile, CompressionError> {
        if file.size() <= self.target_bytes {
            tracing::debug!(
                size = file.size(),
                target = self.target_bytes,
                "File within byte budget, skipping compression"
            );
            return Ok(file.clone());
        }

        let format = EncodeFormat::from_content_type(file.content_type())
            .ok_or_else(|| CompressionError::UnsupportedFormat(file.content_type().to_string()))?;

        let data = file.data().clone();
        let budget = *self;
        let (encoded, dims) = tokio::task::spawn_blocking(move || -> Result<_, CompressionError> {
            let img = decode_image(&data)?;
            budget.fit(img, format)
        })
        .await
        .map_err(|e| CompressionError::TaskFailed(e.to_string()))??;

        tracing::info!(
            original = file.size(),
            compressed = encoded.len(),
            dimensions = %dims,
            "Compressed image to fit byte budget"
        );

        Ok(file.derive(format.to_mime_type(), Bytes::from(encoded), dims))
    }

    /// Search for the largest acceptable encoding of `img`.
    fn fit(
        &self,
        img: DynamicImage,
        format: EncodeFormat,
    ) -> Result<(Vec<u8>, Dimensions), CompressionError> {
        let mut img = self.cap_dimensions(img);
        let mut smallest = usize::MAX;

        if format.is_lossy() {
            for quality in QUALITY_STEPS {
                let candidate = self.encode(&img, format, quality)?;
                tracing::debug!(quality, size = candidate.len(), "Compression attempt");
                if candidate.len() <= self.target_bytes {
                    return Ok((candidate, dimensions_of(&img)));
                }
                smallest = smallest.min(candidate.len());
            }
        } else {
            let candidate = self.encode(&img, format, FLOOR_QUALITY)?;
            if candidate.len() <= self.target_bytes {
                return Ok((candidate, dimensions_of(&img)));
            }
            smallest = smallest.min(candidate.len());
        }

        while let Some(next) = shrink(dimensions_of(&img)) {
            img = img.resize_exact(next.width, next.height, FilterType::Triangle);
            let candidate = self.encode(&img, format, FLOOR_QUALITY)?;
            tracing::debug!(dimensions = %next, size = candidate.len(), "Compression attempt");
            if candidate.len() <= self.target_bytes {
                return Ok((candidate, next));
            }
            smallest = smallest.min(candidate.len());
        }

        Err(CompressionError::BudgetUnreachable {
            target: self.target_bytes,
            smallest,
        })
    }

    fn cap_dimensions(&self, img: DynamicImage) -> DynamicImage {
        let Dimensions { width, height } = self.bounds;
        if width == 0 || height == 0 || dimensions_of(&img).fits_within(width, height) {
            return img;
        }
        // `resize` keeps the aspect ratio and fits inside the bounding box.
        img.resize(width, height, FilterType::Lanczos3)
    }

    fn encode(
        &self,
        img: &DynamicImage,
        format: EncodeFormat,
        quality: u8,
    ) -> Result<Vec<u8>, CompressionError> {
        format
            .encode(img, quality)
            .map_err(|e| CompressionError::Encode(e.to_string()))
    }
}

fn dimensions_of(img: &DynamicImage) -> Dimensions {
    let (width, height) = img.dimensions();
    Dimensions::new(width, height)
}

/// Next smaller size, or `None` once either edge would drop below [`MIN_EDGE`].
fn shrink(current: Dimensions) -> Option<Dimensions> {
    let width = (current.width as f64 * SHRINK_FACTOR).floor() as u32;
    let height = (current.height as f64 * SHRINK_FACTOR).floor() as u32;
    if width < MIN_EDGE || height < MIN_EDGE {
        return None;
    }
    Some(Dimensions::new(width, height))
}
