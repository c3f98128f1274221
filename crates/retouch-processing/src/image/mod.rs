//! Image module
//!
//! This module provides the raster side of the pipeline:
//! - Decoding and dimension probing (processor)
//! - Format selection and re-encoding (encode)
//! - Aspect-preserving downsizing (resize)

pub mod encode;
pub mod processor;
pub mod resize;

pub use encode::EncodeFormat;
pub use processor::{decode_image, probe_dimensions, read_dimensions, verify_decodes, DecodeError};
pub use resize::{DimensionNormalizer, ResizeError};
