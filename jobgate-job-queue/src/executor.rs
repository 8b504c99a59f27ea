//! Job executor trait for implementing job handlers.

use async_trait::async_trait;

use crate::error::JobQueueError;
use crate::types::{JobDescriptor, JobKind, JobOutput};

/// Trait for implementing job executors.
///
/// One executor is registered per [`JobKind`]. The dispatcher calls
/// [`JobExecutor::execute`] exactly once per job and never concurrently with
/// another execution.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Returns the job kind this executor handles.
    fn kind(&self) -> JobKind;

    /// Run the job and return the artifact it produced.
    ///
    /// Failures are recorded on the job; use [`JobQueueError::ExecutionFailed`]
    /// when the process itself reported an error and
    /// [`JobQueueError::ArtifactMissing`] when it exited cleanly without output.
    async fn execute(&self, job: &JobDescriptor) -> Result<JobOutput, JobQueueError>;
}
