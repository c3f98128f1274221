//! Retouch Processing Library
//!
//! Everything the client does to a file before it is sent:
//! - Constraint checks (validator)
//! - Dimension probing and downsizing (image)
//! - Byte-budget compression (compression)
//! - Output file naming (naming)

pub mod compression;
pub mod image;
pub mod naming;
pub mod validator;

pub use compression::{CompressionError, SizeBudgetCompressor};
pub use crate::image::{probe_dimensions, verify_decodes, DecodeError, DimensionNormalizer, EncodeFormat, ResizeError};
pub use naming::unique_name;
pub use validator::FileConstraintChecker;
