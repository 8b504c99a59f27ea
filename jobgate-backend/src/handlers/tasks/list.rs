use std::sync::Arc;

use axum::extract::Extension;
use axum::http::HeaderMap;
use axum::Json;

use super::dto::TaskView;
use crate::{error::ApiError, state::AppState};

/// GET /minhas-tarefas
/// List the caller's tasks in submission order.
pub async fn list(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<TaskView>>, ApiError> {
    let owner = state.require_owner(&headers, None).await?;

    let items: Vec<TaskView> = state
        .job_queue
        .list_by_owner(&owner)
        .await
        .into_iter()
        .map(TaskView::from)
        .collect();

    Ok(Json(items))
}
