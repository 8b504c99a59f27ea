//! Job execution errors.

use std::path::PathBuf;

use jobgate_job_queue::JobQueueError;
use thiserror::Error;

/// Errors raised while preparing or launching an automation process.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("não foi possível preparar o diretório de trabalho {path}: {source}")]
    WorkDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("não foi possível iniciar {program}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    #[error("falha de E/S: {0}")]
    Io(#[from] std::io::Error),
}

impl From<JobError> for JobQueueError {
    fn from(err: JobError) -> Self {
        JobQueueError::ExecutionFailed(format!("Erro na execução: {err}"))
    }
}
