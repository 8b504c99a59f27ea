use axum::{http::StatusCode, response::IntoResponse, Json};
use jobgate_auth::AuthError;
use jobgate_job_queue::JobQueueError;
use serde_json::json;
use thiserror::Error;

use crate::validation::{self, ValidationIssue};

pub const NOT_FOUND_MESSAGE: &str = "Tarefa não encontrada.";
pub const FORBIDDEN_MESSAGE: &str = "Acesso negado para essa tarefa.";
pub const RUNNING_MESSAGE: &str = "Tarefa em execução não pode ser excluída.";
pub const INVALID_OPTION_MESSAGE: &str = "Opção inválida.";
const UNAUTHORIZED_MESSAGE: &str = "Falha na autenticação.";
const INTERNAL_MESSAGE: &str = "Erro interno do servidor.";

/// Top-level API error shared by all route handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication error: {0}")]
    Authentication(#[from] AuthError),
    #[error("job queue error: {0}")]
    JobQueue(#[from] JobQueueError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("validation error")]
    Validation(Vec<ValidationIssue>),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ApiError::JobQueue(err) => match err {
                JobQueueError::UnknownKind(_) | JobQueueError::Unsupported(_) => {
                    StatusCode::BAD_REQUEST
                }
                JobQueueError::NotFound(_) => StatusCode::NOT_FOUND,
                JobQueueError::Forbidden(_) => StatusCode::FORBIDDEN,
                JobQueueError::Running(_) | JobQueueError::Duplicate(_) => StatusCode::CONFLICT,
                JobQueueError::ExecutionFailed(_) | JobQueueError::ArtifactMissing(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Io(_) | ApiError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text sent to the client in the `mensagem` field.
    fn client_message(&self) -> String {
        match self {
            ApiError::Authentication(AuthError::MissingIdentity) => {
                AuthError::MissingIdentity.to_string()
            }
            ApiError::Authentication(_) => UNAUTHORIZED_MESSAGE.to_owned(),
            ApiError::JobQueue(err) => match err {
                JobQueueError::UnknownKind(_) => INVALID_OPTION_MESSAGE.to_owned(),
                JobQueueError::NotFound(_) => NOT_FOUND_MESSAGE.to_owned(),
                JobQueueError::Forbidden(_) => FORBIDDEN_MESSAGE.to_owned(),
                JobQueueError::Running(_) => RUNNING_MESSAGE.to_owned(),
                JobQueueError::ExecutionFailed(_) | JobQueueError::ArtifactMissing(_) => {
                    INTERNAL_MESSAGE.to_owned()
                }
                other => other.diagnostic(),
            },
            ApiError::NotFound(_) => NOT_FOUND_MESSAGE.to_owned(),
            ApiError::BadRequest(message) => message.clone(),
            ApiError::Validation(issues) => validation::summary(issues),
            ApiError::Io(_) | ApiError::Unexpected(_) => INTERNAL_MESSAGE.to_owned(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "request rejected");
        }

        let mut payload = json!({ "mensagem": self.client_message() });
        if let ApiError::Validation(issues) = &self {
            payload["validation"] = validation::to_payload(issues);
        }

        (status, Json(payload)).into_response()
    }
}
