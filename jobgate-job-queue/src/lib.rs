//! Single-flight job queue used by the jobgate backend.
//!
//! Jobs are submitted on behalf of an owner, run strictly one at a time in
//! submission order, and stay in the in-memory store until their owner deletes
//! them. Callers observe progress by polling.
//!
//! # Architecture
//!
//! - [`JobQueueClient`] - Enqueue, drain loop, status and ownership lookups
//! - [`JobStore`] - Mapping from job id to [`JobRecord`]
//! - [`JobExecutor`] - Trait for the process runner of one [`JobKind`]
//! - [`JobDescriptor`] - What to run and for whom
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use jobgate_job_queue::{
//!     async_trait, Artifact, JobDescriptor, JobExecutor, JobKind, JobOutput, JobQueueClient,
//!     JobQueueError,
//! };
//!
//! struct ReportExecutor;
//!
//! #[async_trait]
//! impl JobExecutor for ReportExecutor {
//!     fn kind(&self) -> JobKind {
//!         JobKind::ReportGeneration
//!     }
//!
//!     async fn execute(&self, job: &JobDescriptor) -> Result<JobOutput, JobQueueError> {
//!         let path = job.work_dir.join("report.xlsx");
//!         Ok(JobOutput::new(Artifact::new(path, job.kind.artifact_kind()), "done"))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = JobQueueClient::new();
//!     client.register_executor(ReportExecutor).await;
//!
//!     let job = JobDescriptor::new(
//!         JobKind::ReportGeneration,
//!         "ana@example.com",
//!         vec!["2024-01".into()],
//!         Path::new("./work"),
//!     );
//!     let result = client.enqueue(job).await.unwrap();
//!     println!("Enqueued job: {}", result.job_id);
//! }
//! ```

mod client;
mod error;
mod executor;
mod store;
mod types;

pub use client::JobQueueClient;
pub use error::JobQueueError;
pub use executor::JobExecutor;
pub use store::JobStore;
pub use types::{
    Artifact, ArtifactKind, EnqueueResult, JobDescriptor, JobKind, JobOutput, JobRecord,
    JobState, JobSummary, QUEUED_MESSAGE, RUNNING_MESSAGE,
};

// Re-export async_trait for convenience when implementing JobExecutor
pub use async_trait::async_trait;
