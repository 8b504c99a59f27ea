use std::path::Path as FsPath;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Extension, Path};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use jobgate_job_queue::{Artifact, JobState};
use tokio_util::io::ReaderStream;

use super::dto::TaskStatusView;
use crate::handlers::utils::parse_job_id;
use crate::{error::ApiError, state::AppState};

/// `Content-Disposition` value for an artifact download.
///
/// Non-ASCII characters are dropped; a name left without a stem becomes
/// `resultado.<ext>`.
pub fn content_disposition(path: &FsPath, extension: &str) -> HeaderValue {
    let name: String = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_graphic() && *c != '"' && *c != '\\')
        .collect();
    let stem_is_empty = match name.rsplit_once('.') {
        Some((stem, _)) => stem.is_empty(),
        None => name.is_empty(),
    };
    let name = if stem_is_empty {
        format!("resultado.{extension}")
    } else {
        name
    };
    HeaderValue::from_str(&format!("attachment; filename=\"{name}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

async fn stream_artifact(artifact: &Artifact) -> Result<Response, ApiError> {
    let file = tokio::fs::File::open(&artifact.path).await.map_err(|e| {
        ApiError::Unexpected(format!(
            "failed to open artifact {}: {e}",
            artifact.path.display()
        ))
    })?;
    let length = file.metadata().await.ok().map(|m| m.len());

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, artifact.kind.content_type())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(&artifact.path, artifact.kind.extension()),
        );
    if let Some(len) = length {
        response = response.header(header::CONTENT_LENGTH, len);
    }
    response
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::Unexpected(format!("failed to build response: {e}")))
}

/// GET /status/{id}
/// Download the artifact of a finished task, or report its state.
pub async fn status(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Result<Response, ApiError> {
    let owner = state.require_owner(&headers, None).await?;
    let id = parse_job_id(&raw_id)?;

    let record = state.job_queue.get_status(id, &owner).await?;
    match (&record.state, &record.artifact) {
        (JobState::Succeeded, Some(artifact)) => {
            tracing::debug!(job_id = %id, path = %artifact.path.display(), "serving artifact");
            stream_artifact(artifact).await
        }
        _ => Ok(Json(TaskStatusView::from(&record)).into_response()),
    }
}
