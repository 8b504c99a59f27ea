use std::io;
use std::path::Path;

use jobgate_job_queue::JobRecord;
use uuid::Uuid;

use crate::error::ApiError;

/// Parse a task id path segment. Malformed ids cannot name a task.
pub fn parse_job_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::not_found(format!("invalid task id {raw}")))
}

async fn remove_dir_if_present(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

async fn remove_file_if_present(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Delete what a job left on disk: its working directory, its uploads, and an
/// artifact the automation wrote outside the working directory.
///
/// Failures are logged, never returned; the record is already gone.
pub async fn remove_job_files(record: &JobRecord) {
    let job_id = record.id();
    if let Err(e) = remove_dir_if_present(&record.descriptor.work_dir).await {
        tracing::warn!(%job_id, error = %e, "failed to remove job working directory");
    }
    if let Some(artifact) = &record.artifact {
        if !artifact.path.starts_with(&record.descriptor.work_dir) {
            if let Err(e) = remove_file_if_present(&artifact.path).await {
                tracing::warn!(%job_id, path = %artifact.path.display(), error = %e, "failed to remove job artifact");
            }
        }
    }
    for attachment in &record.descriptor.attachments {
        if let Err(e) = remove_file_if_present(attachment).await {
            tracing::warn!(%job_id, path = %attachment.display(), error = %e, "failed to remove job attachment");
        }
    }
}

/// Best-effort removal of an upload that never made it into a job.
pub async fn discard_upload(path: &Path) {
    if let Err(e) = remove_file_if_present(path).await {
        tracing::warn!(path = %path.display(), error = %e, "failed to discard upload");
    }
}
