use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::http::HeaderMap;
use axum::Json;

use super::dto::MessageResponse;
use crate::handlers::utils::{parse_job_id, remove_job_files};
use crate::{error::ApiError, state::AppState};

pub const DELETED_MESSAGE: &str = "Tarefa excluída com sucesso.";

/// DELETE /excluir/{id}
/// Remove a finished or queued task together with its files.
pub async fn delete(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let owner = state.require_owner(&headers, None).await?;
    let id = parse_job_id(&raw_id)?;

    let record = state.job_queue.delete_job(id, &owner).await?;
    remove_job_files(&record).await;
    tracing::info!(job_id = %id, %owner, state = %record.state, "task deleted");

    Ok(Json(MessageResponse::new(DELETED_MESSAGE)))
}
