//! Concrete job executors for the jobgate backend.
//!
//! Every [`JobKind`](jobgate_job_queue::JobKind) is served by an external
//! automation program. [`AutomationExecutor`] launches it once per job inside
//! the job's working directory and turns its exit status, output, and files
//! into a [`JobOutput`](jobgate_job_queue::JobOutput) or a failure diagnostic.
//!
//! # Usage
//!
//! ```rust,no_run
//! use jobgate_job_queue::{JobKind, JobQueueClient};
//! use jobgate_jobs::{register_automations, AutomationExecutor};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = JobQueueClient::new();
//!     let invoices = AutomationExecutor::new(JobKind::InvoiceDownload, "/opt/automations/invoices");
//!     register_automations(&client, [invoices]).await;
//! }
//! ```

mod automation;
pub mod discovery;
mod error;

pub use automation::{AutomationExecutor, SUCCESS_MESSAGE, UNKNOWN_ERROR_MESSAGE, WORK_DIR_ENV};
pub use error::JobError;

use jobgate_job_queue::{JobExecutor, JobQueueClient};
use tracing::info;

/// Register the given automations with the job queue client.
///
/// Kinds left out stay administratively disabled.
pub async fn register_automations(
    client: &JobQueueClient,
    automations: impl IntoIterator<Item = AutomationExecutor>,
) {
    for automation in automations {
        info!(
            kind = %automation.kind(),
            program = %automation.program().display(),
            "automation registered"
        );
        client.register_executor(automation).await;
    }
}
