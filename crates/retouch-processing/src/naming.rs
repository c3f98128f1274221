use std::path::Path;
use uuid::Uuid;

/// Collision-resistant name for an edited file.
///
/// Keeps the base name and the final extension of `original` (directories dropped) and
/// puts a fresh random id between them: `photo.jpg` becomes `photo_<id>.jpg`. Names
/// without a usable extension (`README`, `.env`, `trailing.`) get `<name>_<id>`.
pub fn unique_name(original: &str) -> String {
    let file_name = Path::new(original)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(original);
    let id = Uuid::new_v4().simple();

    match file_name.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() && !ext.is_empty() => {
            format!("{}_{}.{}", base, id, ext)
        }
        _ => format!("{}_{}", file_name, id),
    }
}
