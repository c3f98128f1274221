use bytes::Bytes;
use serde::Serialize;

/// A processed image returned by the edit service, ready to be saved.
#[derive(Debug, Clone)]
pub struct EditOutcome {
    pub blob: Bytes,
    pub filename: String,
    /// Content type reported by the server, if any.
    pub content_type: Option<String>,
}

/// Serializable summary of an outcome (no payload).
#[derive(Debug, Clone, Serialize)]
pub struct EditSummary {
    pub filename: String,
    pub size_bytes: usize,
    pub content_type: Option<String>,
}

impl EditOutcome {
    pub fn summary(&self) -> EditSummary {
        EditSummary {
            filename: self.filename.clone(),
            size_bytes: self.blob.len(),
            content_type: self.content_type.clone(),
        }
    }
}
