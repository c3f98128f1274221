use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::OnceLock;

/// Pixel dimensions of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn fits_within(&self, max_width: u32, max_height: u32) -> bool {
        self.width <= max_width && self.height <= max_height
    }
}

impl Display for Dimensions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An image picked by the user, or produced by a stage from one.
///
/// The payload is never edited in place. A stage that needs to change it builds a new
/// `SelectedFile` with [`SelectedFile::derive`], which keeps the original name.
/// Pixel dimensions are filled in lazily by the first decode probe and then cached.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    name: String,
    content_type: String,
    data: Bytes,
    dimensions: OnceLock<Dimensions>,
}

impl SelectedFile {
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data: data.into(),
            dimensions: OnceLock::new(),
        }
    }

    /// Build the successor of this file with new bytes and already-known dimensions.
    pub fn derive(&self, content_type: impl Into<String>, data: Bytes, dims: Dimensions) -> Self {
        let dimensions = OnceLock::new();
        let _ = dimensions.set(dims);
        Self {
            name: self.name.clone(),
            content_type: content_type.into(),
            data,
            dimensions,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared MIME type, as reported by whoever selected the file.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Dimensions if a probe has already run.
    pub fn cached_dimensions(&self) -> Option<Dimensions> {
        self.dimensions.get().copied()
    }

    /// Record probed dimensions. The first recorded value wins.
    pub fn remember_dimensions(&self, dims: Dimensions) -> Dimensions {
        *self.dimensions.get_or_init(|| dims)
    }
}
