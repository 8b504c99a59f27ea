//! Executor that runs an external automation program.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use jobgate_job_queue::{
    async_trait, Artifact, JobDescriptor, JobExecutor, JobKind, JobOutput, JobQueueError,
};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::discovery;
use crate::error::JobError;

/// Environment variable through which the program learns its working directory.
pub const WORK_DIR_ENV: &str = "JOBGATE_WORK_DIR";

/// Maximum stdout or stderr size kept per stream (1 MiB). Older output is dropped.
const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

pub const SUCCESS_MESSAGE: &str = "Arquivo gerado com sucesso.";
pub const UNKNOWN_ERROR_MESSAGE: &str = "Erro desconhecido.";

/// Captured result of one process run.
#[derive(Debug)]
struct ProcessOutput {
    success: bool,
    code: Option<i32>,
    stdout: String,
    stderr: String,
}

/// Runs `program [args..] [job arguments..]` inside the job's working directory.
///
/// The run succeeds when the process exits with status 0 and an artifact with
/// the extension of the job kind can be found afterwards.
#[derive(Debug, Clone)]
pub struct AutomationExecutor {
    kind: JobKind,
    program: PathBuf,
    args: Vec<String>,
}

impl AutomationExecutor {
    pub fn new(kind: JobKind, program: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Fixed arguments placed before the job's own arguments.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    #[inline]
    pub fn program(&self) -> &Path {
        &self.program
    }

    async fn spawn(&self, job: &JobDescriptor) -> Result<ProcessOutput, JobError> {
        tokio::fs::create_dir_all(&job.work_dir)
            .await
            .map_err(|source| JobError::WorkDir {
                path: job.work_dir.clone(),
                source,
            })?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .args(&job.arguments)
            .current_dir(&job.work_dir)
            .env(WORK_DIR_ENV, &job.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| JobError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let stdout_task = tokio::spawn(read_stream(child.stdout.take(), "stdout"));
        let stderr_task = tokio::spawn(read_stream(child.stderr.take(), "stderr"));
        let status = child.wait().await?;
        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        Ok(ProcessOutput {
            success: status.success(),
            code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

#[async_trait]
impl JobExecutor for AutomationExecutor {
    fn kind(&self) -> JobKind {
        self.kind
    }

    async fn execute(&self, job: &JobDescriptor) -> Result<JobOutput, JobQueueError> {
        info!(
            job_id = %job.id,
            program = %self.program.display(),
            work_dir = %job.work_dir.display(),
            "launching automation"
        );

        let output = self.spawn(job).await?;
        debug!(job_id = %job.id, code = ?output.code, "automation exited");

        if !output.success {
            let detail = if output.stderr.trim().is_empty() {
                output.stdout.trim()
            } else {
                output.stderr.trim()
            };
            warn!(job_id = %job.id, code = ?output.code, "automation reported failure");
            return Err(JobQueueError::ExecutionFailed(format!(
                "Erro na execução: {detail}"
            )));
        }

        let kind = job.kind.artifact_kind();
        match discovery::locate_artifact(&job.work_dir, &output.stdout, kind)
            .await
            .map_err(JobError::from)?
        {
            Some(path) => Ok(JobOutput::new(Artifact::new(path, kind), SUCCESS_MESSAGE)),
            None => {
                let diagnostic = discovery::log_diagnostic(&job.work_dir)
                    .await
                    .map_err(JobError::from)?
                    .unwrap_or_else(|| UNKNOWN_ERROR_MESSAGE.to_owned());
                warn!(job_id = %job.id, %diagnostic, "automation produced no artifact");
                Err(JobQueueError::ArtifactMissing(diagnostic))
            }
        }
    }
}

/// Drain an output stream to EOF, keeping only its last [`MAX_OUTPUT_BYTES`].
///
/// The pipe stays open until the process closes it so a chatty program never
/// dies on a broken pipe.
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>, stream: &'static str) -> Vec<u8> {
    let mut buf = Vec::new();
    let Some(mut h) = handle else {
        return buf;
    };
    let mut chunk = [0u8; 8192];
    loop {
        match h.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.len() > 2 * MAX_OUTPUT_BYTES {
                    buf.drain(..buf.len() - MAX_OUTPUT_BYTES);
                }
            }
            Err(e) => {
                warn!(stream, error = %e, "failed to read automation output");
                break;
            }
        }
    }
    if buf.len() > MAX_OUTPUT_BYTES {
        buf.drain(..buf.len() - MAX_OUTPUT_BYTES);
    }
    buf
}
