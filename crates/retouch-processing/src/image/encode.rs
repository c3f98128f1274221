//! Output format selection and re-encoding.

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, ImageError, ImageFormat};
use std::io::Cursor;

/// Quality used whenever a lossy format is re-encoded without a byte budget (0.9 on a 0-1 scale).
pub const HIGH_QUALITY: u8 = 90;

/// Formats the client can re-encode into. Always the same format the file arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl EncodeFormat {
    /// Detect the encoder from a declared content type.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" => Some(EncodeFormat::Jpeg),
            "image/png" => Some(EncodeFormat::Png),
            "image/gif" => Some(EncodeFormat::Gif),
            "image/webp" => Some(EncodeFormat::WebP),
            _ => None,
        }
    }

    /// Whether a quality setting changes the output size.
    pub fn is_lossy(self) -> bool {
        matches!(self, EncodeFormat::Jpeg)
    }

    pub fn to_mime_type(self) -> &'static str {
        match self {
            EncodeFormat::Jpeg => "image/jpeg",
            EncodeFormat::Png => "image/png",
            EncodeFormat::Gif => "image/gif",
            EncodeFormat::WebP => "image/webp",
        }
    }

    pub fn to_image_format(self) -> ImageFormat {
        match self {
            EncodeFormat::Jpeg => ImageFormat::Jpeg,
            EncodeFormat::Png => ImageFormat::Png,
            EncodeFormat::Gif => ImageFormat::Gif,
            EncodeFormat::WebP => ImageFormat::WebP,
        }
    }

    /// Encode `img`. `quality` (1-100) only applies to lossy formats.
    pub fn encode(self, img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImageError> {
        let mut buffer = Vec::new();
        match self {
            EncodeFormat::Jpeg => {
                let rgb = img.to_rgb8();
                let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
                rgb.write_with_encoder(encoder)?;
            }
            EncodeFormat::Png => {
                let mut cursor = Cursor::new(&mut buffer);
                match img.color() {
                    ColorType::Rgb32F | ColorType::Rgba32F => {
                        DynamicImage::ImageRgba8(img.to_rgba8())
                            .write_to(&mut cursor, ImageFormat::Png)?;
                    }
                    _ => img.write_to(&mut cursor, ImageFormat::Png)?,
                }
            }
            EncodeFormat::Gif | EncodeFormat::WebP => {
                let mut cursor = Cursor::new(&mut buffer);
                DynamicImage::ImageRgba8(img.to_rgba8())
                    .write_to(&mut cursor, self.to_image_format())?;
            }
        }
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};

    fn sample() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(32, 24, Rgba([10, 200, 30, 255])))
    }

    #[test]
    fn test_from_content_type() {
        assert_eq!(
            EncodeFormat::from_content_type("image/jpeg"),
            Some(EncodeFormat::Jpeg)
        );
        assert_eq!(
            EncodeFormat::from_content_type("IMAGE/PNG; charset=binary"),
            Some(EncodeFormat::Png)
        );
        assert_eq!(EncodeFormat::from_content_type("image/tiff"), None);
        assert_eq!(EncodeFormat::from_content_type("text/plain"), None);
    }

    #[test]
    fn test_only_jpeg_is_lossy() {
        assert!(EncodeFormat::Jpeg.is_lossy());
        assert!(!EncodeFormat::Png.is_lossy());
        assert!(!EncodeFormat::WebP.is_lossy());
    }

    #[test]
    fn test_encode_each_format_decodes_back() {
        let img = sample();
        for format in [
            EncodeFormat::Jpeg,
            EncodeFormat::Png,
            EncodeFormat::Gif,
            EncodeFormat::WebP,
        ] {
            let bytes = format.encode(&img, HIGH_QUALITY).unwrap();
            let decoded = image::load_from_memory(&bytes).unwrap();
            assert_eq!(decoded.dimensions(), (32, 24), "{:?}", format);
        }
    }
}
