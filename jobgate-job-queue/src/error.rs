//! Error types for the job queue system.

use thiserror::Error;
use uuid::Uuid;

use crate::types::JobKind;

/// Errors that may occur while interacting with the job queue.
#[derive(Debug, Error)]
pub enum JobQueueError {
    #[error("unknown job kind: {0}")]
    UnknownKind(String),

    #[error("job kind {0} is not available")]
    Unsupported(JobKind),

    #[error("job {0} was already enqueued")]
    Duplicate(Uuid),

    #[error("job not found: {0}")]
    NotFound(Uuid),

    #[error("job {0} belongs to another owner")]
    Forbidden(Uuid),

    #[error("job {0} is running and cannot be removed")]
    Running(Uuid),

    #[error("job execution failed: {0}")]
    ExecutionFailed(String),

    #[error("job produced no artifact: {0}")]
    ArtifactMissing(String),
}

impl JobQueueError {
    /// Diagnostic text recorded on a failed job.
    ///
    /// Runner failures carry their message verbatim so callers polling the job see
    /// the process output rather than the error prefix.
    pub fn diagnostic(&self) -> String {
        match self {
            Self::ExecutionFailed(message) | Self::ArtifactMissing(message) => message.clone(),
            Self::Unsupported(kind) => format!("Opção {kind} ainda não disponível."),
            other => other.to_string(),
        }
    }
}
