use retouch_core::EditOutcome;
use std::io;
use std::path::{Path, PathBuf};

/// Write the processed image to `dir/<filename>`, creating `dir` if needed.
///
/// Only the final component of the outcome's filename is used.
pub async fn save_to(outcome: &EditOutcome, dir: impl AsRef<Path>) -> io::Result<PathBuf> {
    let file_name = Path::new(&outcome.filename)
        .file_name()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid output filename: {:?}", outcome.filename),
            )
        })?;

    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, &outcome.blob).await?;

    tracing::info!(
        path = %path.display(),
        size = outcome.blob.len(),
        "Saved edited image"
    );

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn outcome(filename: &str) -> EditOutcome {
        EditOutcome {
            blob: Bytes::from_static(b"edited"),
            filename: filename.to_string(),
            content_type: Some("image/png".to_string()),
        }
    }

    #[tokio::test]
    async fn test_save_creates_dir_and_writes_blob() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("out");

        let path = save_to(&outcome("photo_abc.png"), &dir).await.unwrap();

        assert_eq!(path, dir.join("photo_abc.png"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"edited");
    }

    #[tokio::test]
    async fn test_save_drops_directory_components() {
        let temp = tempfile::tempdir().unwrap();
        let path = save_to(&outcome("../escape.png"), temp.path()).await.unwrap();
        assert_eq!(path, temp.path().join("escape.png"));
    }

    #[tokio::test]
    async fn test_save_rejects_empty_name() {
        let temp = tempfile::tempdir().unwrap();
        let err = save_to(&outcome(".."), temp.path()).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
