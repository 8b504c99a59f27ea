use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Extension, FromRequest, Multipart, Request};
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use jobgate_job_queue::{JobDescriptor, JobKind, JobQueueError};

use super::dto::{SubmitTaskDto, SubmitTaskResponse};
use super::upload::{store_upload, FILE_FIELDS};
use crate::error::{ApiError, INVALID_OPTION_MESSAGE};
use crate::handlers::utils::discard_upload;
use crate::state::AppState;

pub const STARTED_MESSAGE: &str = "Execução iniciada.";

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

/// Read text fields and the optional input file from a multipart form.
async fn collect_form(
    state: &AppState,
    multipart: &mut Multipart,
    dto: &mut SubmitTaskDto,
    upload: &mut Option<PathBuf>,
) -> Result<(), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_owned();
        if FILE_FIELDS.contains(&name.as_str()) {
            let file_name = field.file_name().map(str::to_owned);
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            if data.is_empty() {
                continue;
            }
            let stored = store_upload(&state.uploads_dir, file_name.as_deref(), &data).await?;
            if let Some(previous) = upload.replace(stored) {
                discard_upload(&previous).await;
            }
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            if !dto.set_field(&name, value) {
                tracing::debug!(field = %name, "ignoring unknown form field");
            }
        }
    }
    Ok(())
}

async fn read_multipart(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<(SubmitTaskDto, Option<PathBuf>), ApiError> {
    let mut dto = SubmitTaskDto::default();
    let mut upload = None;
    match collect_form(state, &mut multipart, &mut dto, &mut upload).await {
        Ok(()) => Ok((dto, upload)),
        Err(e) => {
            if let Some(path) = upload {
                discard_upload(&path).await;
            }
            Err(e)
        }
    }
}

/// Resolve the caller, validate the request, and enqueue the job.
async fn enqueue_task(
    state: &AppState,
    headers: &HeaderMap,
    dto: SubmitTaskDto,
    upload: Option<PathBuf>,
) -> Result<SubmitTaskResponse, ApiError> {
    let owner = state.require_owner(headers, dto.user_email.clone()).await?;

    let kind: JobKind = dto
        .opcao
        .as_deref()
        .ok_or_else(|| ApiError::bad_request(INVALID_OPTION_MESSAGE))?
        .parse()?;

    if !state.job_queue.supports(kind).await {
        return Err(JobQueueError::Unsupported(kind).into());
    }

    let arguments = dto
        .arguments(kind, upload.as_deref())
        .map_err(ApiError::Validation)?;

    let mut descriptor = JobDescriptor::new(kind, owner, arguments, &state.work_root);
    if let Some(path) = upload {
        descriptor = descriptor.with_attachment(path);
    }
    let job_id = descriptor.id;
    let owner = descriptor.owner.clone();

    let result = state.job_queue.enqueue(descriptor).await?;
    tracing::info!(%job_id, %kind, %owner, "task submitted");

    Ok(SubmitTaskResponse {
        id: result.job_id,
        mensagem: STARTED_MESSAGE.to_owned(),
    })
}

/// POST /executar
/// Submit an automation job. Accepts JSON or a multipart form with an input file.
pub async fn submit(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
) -> Result<(StatusCode, Json<SubmitTaskResponse>), ApiError> {
    let (dto, upload) = if is_multipart(&headers) {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        read_multipart(&state, multipart).await?
    } else {
        let Json(dto) = Json::<SubmitTaskDto>::from_request(request, &())
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        (dto, None)
    };

    let cleanup = upload.clone();
    match enqueue_task(&state, &headers, dto, upload).await {
        Ok(response) => Ok((StatusCode::ACCEPTED, Json(response))),
        Err(e) => {
            if let Some(path) = cleanup {
                discard_upload(&path).await;
            }
            Err(e)
        }
    }
}
