use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::ApiError;

/// Multipart field names that carry the input file.
pub const FILE_FIELDS: [&str; 2] = ["arquivo", "file"];

/// Reduce a client-supplied file name to a safe basename.
fn sanitize_file_name(original: &str) -> String {
    let basename = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = basename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_owned()
    } else {
        cleaned.to_owned()
    }
}

/// Write uploaded bytes under `uploads_dir` and return the absolute path.
///
/// Stored names are prefixed with a fresh UUID so concurrent uploads never collide.
pub async fn store_upload(
    uploads_dir: &Path,
    original_name: Option<&str>,
    bytes: &[u8],
) -> Result<PathBuf, ApiError> {
    tokio::fs::create_dir_all(uploads_dir)
        .await
        .map_err(|e| ApiError::Unexpected(format!("failed to create uploads directory: {e}")))?;

    let name = format!(
        "{}_{}",
        Uuid::new_v4(),
        sanitize_file_name(original_name.unwrap_or_default())
    );
    let path = uploads_dir.join(name);
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| ApiError::Unexpected(format!("failed to write upload: {e}")))?;

    // Automations run from their own working directory.
    let absolute = tokio::fs::canonicalize(&path).await?;
    tracing::debug!(path = %absolute.display(), size = bytes.len(), "upload stored");
    Ok(absolute)
}
