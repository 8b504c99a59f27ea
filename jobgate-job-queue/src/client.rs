//! Job queue client implementation.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::JobQueueError;
use crate::executor::JobExecutor;
use crate::store::JobStore;
use crate::types::{EnqueueResult, JobDescriptor, JobKind, JobOutput, JobRecord, JobState, JobSummary};

/// Everything the dispatcher mutates, kept behind a single lock.
#[derive(Debug, Default)]
struct QueueState {
    store: JobStore,
    /// Jobs waiting to run, oldest first.
    pending: VecDeque<JobDescriptor>,
    /// Set while a drain task owns execution.
    busy: bool,
}

/// Interface for enqueuing jobs and tracking their execution.
///
/// Jobs run one at a time in submission order. Enqueuing never waits for the
/// run: the first enqueue on an idle queue spawns a drain task that keeps
/// popping pending jobs until none are left.
#[derive(Clone)]
pub struct JobQueueClient {
    state: Arc<Mutex<QueueState>>,
    executors: Arc<RwLock<HashMap<JobKind, Arc<dyn JobExecutor>>>>,
}

impl fmt::Debug for JobQueueClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobQueueClient")
            .field("state", &"<Mutex<QueueState>>")
            .field(
                "executors",
                &"<RwLock<HashMap<JobKind, Arc<dyn JobExecutor>>>>",
            )
            .finish()
    }
}

impl Default for JobQueueClient {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueueClient {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            executors: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a job executor for a specific job kind.
    pub async fn register_executor<E: JobExecutor + 'static>(&self, executor: E) {
        let kind = executor.kind();
        let mut executors = self.executors.write().await;
        executors.insert(kind, Arc::new(executor));
    }

    /// Whether an executor is registered for `kind`.
    pub async fn supports(&self, kind: JobKind) -> bool {
        self.executors.read().await.contains_key(&kind)
    }

    /// Enqueue a job for asynchronous processing.
    ///
    /// Writes the Queued record before returning, so the job is visible to
    /// lookups immediately.
    pub async fn enqueue(&self, descriptor: JobDescriptor) -> Result<EnqueueResult, JobQueueError> {
        let job_id = descriptor.id;
        let kind = descriptor.kind;

        let start_drain = {
            let mut state = self.state.lock().await;
            if state.store.get(&job_id).is_some() {
                return Err(JobQueueError::Duplicate(job_id));
            }
            state.store.put(JobRecord::queued(descriptor.clone()));
            state.pending.push_back(descriptor);
            debug!(job_id = %job_id, pending = state.pending.len(), "job queued");
            !std::mem::replace(&mut state.busy, true)
        };

        info!(job_id = %job_id, kind = %kind, "job enqueued");

        if start_drain {
            let this = self.clone();
            tokio::spawn(async move { this.drain().await });
        }

        Ok(EnqueueResult { job_id })
    }

    /// Run pending jobs until the queue is empty, then release the busy flag.
    async fn drain(self) {
        loop {
            let job = {
                let mut state = self.state.lock().await;
                let Some(job) = state.pending.pop_front() else {
                    state.busy = false;
                    debug!("job queue idle");
                    return;
                };
                if let Some(record) = state.store.get_mut(&job.id) {
                    record.start();
                }
                job
            };

            info!(job_id = %job.id, kind = %job.kind, owner = %job.owner, "job started");
            let outcome = self.run(job.clone()).await;

            let mut state = self.state.lock().await;
            let Some(record) = state.store.get_mut(&job.id) else {
                warn!(job_id = %job.id, "job record disappeared while running; outcome dropped");
                continue;
            };
            match outcome {
                Ok(output) => {
                    info!(
                        job_id = %job.id,
                        artifact = %output.artifact.path.display(),
                        "job succeeded"
                    );
                    record.succeed(output);
                }
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "job failed");
                    record.fail(e.diagnostic());
                }
            }
        }
    }

    /// Invoke the executor registered for the job's kind.
    ///
    /// The executor runs in its own task so a panic fails the job instead of
    /// killing the drain loop.
    async fn run(&self, job: JobDescriptor) -> Result<JobOutput, JobQueueError> {
        let executor = {
            let executors = self.executors.read().await;
            executors.get(&job.kind).cloned()
        };
        let Some(executor) = executor else {
            return Err(JobQueueError::Unsupported(job.kind));
        };

        tokio::spawn(async move { executor.execute(&job).await })
            .await
            .unwrap_or_else(|e| {
                Err(JobQueueError::ExecutionFailed(format!(
                    "Execução interrompida: {e}"
                )))
            })
    }

    /// Look up a job on behalf of `requester`.
    pub async fn get_status(&self, id: Uuid, requester: &str) -> Result<JobRecord, JobQueueError> {
        let state = self.state.lock().await;
        let record = state.store.get(&id).ok_or(JobQueueError::NotFound(id))?;
        if !record.is_owned_by(requester) {
            return Err(JobQueueError::Forbidden(id));
        }
        Ok(record.clone())
    }

    /// Summaries of every job submitted by `owner`.
    pub async fn list_by_owner(&self, owner: &str) -> Vec<JobSummary> {
        let state = self.state.lock().await;
        state.store.list_by_owner(owner)
    }

    /// Remove a job's record on behalf of `requester`.
    ///
    /// Queued jobs are also dropped from the pending list. A running job cannot
    /// be removed because its process is never interrupted. The caller is
    /// responsible for removing the returned record's files.
    pub async fn delete_job(&self, id: Uuid, requester: &str) -> Result<JobRecord, JobQueueError> {
        let mut state = self.state.lock().await;
        let record = state.store.get(&id).ok_or(JobQueueError::NotFound(id))?;
        if !record.is_owned_by(requester) {
            return Err(JobQueueError::Forbidden(id));
        }
        if record.state == JobState::Running {
            return Err(JobQueueError::Running(id));
        }
        state.pending.retain(|job| job.id != id);
        let removed = state.store.delete(&id).ok_or(JobQueueError::NotFound(id))?;
        info!(job_id = %id, "job deleted");
        Ok(removed)
    }

    /// Get a job by id without an ownership check.
    pub async fn get_job(&self, id: Uuid) -> Option<JobRecord> {
        let state = self.state.lock().await;
        state.store.get(&id).cloned()
    }

    pub async fn running_count(&self) -> usize {
        self.state.lock().await.store.running_count()
    }

    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    pub async fn is_busy(&self) -> bool {
        self.state.lock().await.busy
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::types::{Artifact, ArtifactKind};

    const OWNER: &str = "ana@example.com";

    fn job(kind: JobKind, owner: &str) -> JobDescriptor {
        JobDescriptor::new(kind, owner, vec!["2024-01".into()], Path::new("/tmp/jobgate-tests"))
    }

    fn output_for(job: &JobDescriptor) -> JobOutput {
        let kind = job.kind.artifact_kind();
        JobOutput::new(
            Artifact::new(job.work_dir.join(format!("out.{}", kind.extension())), kind),
            "Arquivo gerado com sucesso.",
        )
    }

    /// Completes immediately and records the order in which jobs ran.
    struct RecordingExecutor {
        kind: JobKind,
        ran: Arc<std::sync::Mutex<Vec<Uuid>>>,
    }

    #[async_trait]
    impl JobExecutor for RecordingExecutor {
        fn kind(&self) -> JobKind {
            self.kind
        }

        async fn execute(&self, job: &JobDescriptor) -> Result<JobOutput, JobQueueError> {
            self.ran.lock().unwrap().push(job.id);
            Ok(output_for(job))
        }
    }

    /// Blocks each run until the test releases a permit.
    struct GatedExecutor {
        gate: Arc<Semaphore>,
        active: Arc<AtomicUsize>,
        max_active: Arc<AtomicUsize>,
        ran: Arc<std::sync::Mutex<Vec<Uuid>>>,
    }

    #[async_trait]
    impl JobExecutor for GatedExecutor {
        fn kind(&self) -> JobKind {
            JobKind::ReportGeneration
        }

        async fn execute(&self, job: &JobDescriptor) -> Result<JobOutput, JobQueueError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            self.ran.lock().unwrap().push(job.id);
            let permit = self.gate.acquire().await.expect("gate open");
            permit.forget();
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(output_for(job))
        }
    }

    struct FailingExecutor;

    #[async_trait]
    impl JobExecutor for FailingExecutor {
        fn kind(&self) -> JobKind {
            JobKind::InvoiceDownload
        }

        async fn execute(&self, _job: &JobDescriptor) -> Result<JobOutput, JobQueueError> {
            Err(JobQueueError::ExecutionFailed(
                "Erro na execução: credenciais inválidas".into(),
            ))
        }
    }

    struct PanickingExecutor;

    #[async_trait]
    impl JobExecutor for PanickingExecutor {
        fn kind(&self) -> JobKind {
            JobKind::BatchLookup
        }

        async fn execute(&self, _job: &JobDescriptor) -> Result<JobOutput, JobQueueError> {
            panic!("executor bug");
        }
    }

    async fn wait_for_state(client: &JobQueueClient, id: Uuid, want: JobState) -> JobRecord {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(record) = client.get_job(id).await {
                    if record.state == want {
                        return record;
                    }
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("job reached expected state in time")
    }

    async fn wait_idle(client: &JobQueueClient) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while client.is_busy().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("queue drained in time");
    }

    fn gated() -> (GatedExecutor, Arc<Semaphore>, Arc<AtomicUsize>, Arc<std::sync::Mutex<Vec<Uuid>>>) {
        let gate = Arc::new(Semaphore::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));
        let ran = Arc::new(std::sync::Mutex::new(Vec::new()));
        let executor = GatedExecutor {
            gate: gate.clone(),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: max_active.clone(),
            ran: ran.clone(),
        };
        (executor, gate, max_active, ran)
    }

    #[tokio::test]
    async fn status_right_after_enqueue_is_not_terminal() {
        let client = JobQueueClient::new();
        let ran = Arc::new(std::sync::Mutex::new(Vec::new()));
        client
            .register_executor(RecordingExecutor {
                kind: JobKind::ReportGeneration,
                ran,
            })
            .await;

        for _ in 0..10 {
            let result = client.enqueue(job(JobKind::ReportGeneration, OWNER)).await.unwrap();
            let record = client.get_status(result.job_id, OWNER).await.unwrap();
            assert!(
                matches!(record.state, JobState::Queued | JobState::Running),
                "unexpected state {:?}",
                record.state
            );
        }
        wait_idle(&client).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn only_one_job_runs_at_a_time() {
        let client = JobQueueClient::new();
        let (executor, gate, max_active, ran) = gated();
        client.register_executor(executor).await;

        let mut ids = Vec::new();
        for _ in 0..4 {
            ids.push(client.enqueue(job(JobKind::ReportGeneration, OWNER)).await.unwrap().job_id);
        }

        for (i, id) in ids.iter().enumerate() {
            wait_for_state(&client, *id, JobState::Running).await;
            assert_eq!(client.running_count().await, 1);
            for later in &ids[i + 1..] {
                let record = client.get_job(*later).await.unwrap();
                assert_eq!(record.state, JobState::Queued);
            }
            gate.add_permits(1);
            wait_for_state(&client, *id, JobState::Succeeded).await;
        }

        wait_idle(&client).await;
        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert_eq!(*ran.lock().unwrap(), ids);
    }

    #[tokio::test]
    async fn jobs_complete_in_submission_order() {
        let client = JobQueueClient::new();
        let ran = Arc::new(std::sync::Mutex::new(Vec::new()));
        client
            .register_executor(RecordingExecutor {
                kind: JobKind::ReportGeneration,
                ran: ran.clone(),
            })
            .await;

        let a = client.enqueue(job(JobKind::ReportGeneration, OWNER)).await.unwrap().job_id;
        let b = client.enqueue(job(JobKind::ReportGeneration, OWNER)).await.unwrap().job_id;
        let c = client.enqueue(job(JobKind::ReportGeneration, OWNER)).await.unwrap().job_id;
        wait_idle(&client).await;

        assert_eq!(*ran.lock().unwrap(), vec![a, b, c]);
        for id in [a, b, c] {
            let record = client.get_status(id, OWNER).await.unwrap();
            assert_eq!(record.state, JobState::Succeeded);
            assert_eq!(
                record.artifact.as_ref().map(|a| a.kind),
                Some(ArtifactKind::Spreadsheet)
            );
        }
    }

    #[tokio::test]
    async fn other_owners_are_forbidden() {
        let client = JobQueueClient::new();
        let id = client.enqueue(job(JobKind::InvoiceDownload, OWNER)).await.unwrap().job_id;

        assert!(matches!(
            client.get_status(id, "bruno@example.com").await,
            Err(JobQueueError::Forbidden(_))
        ));
        assert!(matches!(
            client.delete_job(id, "bruno@example.com").await,
            Err(JobQueueError::Forbidden(_))
        ));
        assert!(client.list_by_owner("bruno@example.com").await.is_empty());
        assert_eq!(client.list_by_owner(OWNER).await.len(), 1);
        wait_idle(&client).await;
        assert!(client.get_status(id, OWNER).await.is_ok());
    }

    #[tokio::test]
    async fn deleted_job_is_not_found() {
        let client = JobQueueClient::new();
        let ran = Arc::new(std::sync::Mutex::new(Vec::new()));
        client
            .register_executor(RecordingExecutor {
                kind: JobKind::ReportGeneration,
                ran,
            })
            .await;
        let id = client.enqueue(job(JobKind::ReportGeneration, OWNER)).await.unwrap().job_id;
        wait_for_state(&client, id, JobState::Succeeded).await;

        let removed = client.delete_job(id, OWNER).await.unwrap();
        assert_eq!(removed.id(), id);
        assert!(matches!(
            client.get_status(id, OWNER).await,
            Err(JobQueueError::NotFound(_))
        ));
        assert!(matches!(
            client.delete_job(id, OWNER).await,
            Err(JobQueueError::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn running_job_cannot_be_deleted_and_queued_job_never_runs() {
        let client = JobQueueClient::new();
        let (executor, gate, _max, ran) = gated();
        client.register_executor(executor).await;

        let first = client.enqueue(job(JobKind::ReportGeneration, OWNER)).await.unwrap().job_id;
        let second = client.enqueue(job(JobKind::ReportGeneration, OWNER)).await.unwrap().job_id;
        wait_for_state(&client, first, JobState::Running).await;

        assert!(matches!(
            client.delete_job(first, OWNER).await,
            Err(JobQueueError::Running(_))
        ));
        client.delete_job(second, OWNER).await.unwrap();
        assert_eq!(client.pending_len().await, 0);

        gate.add_permits(1);
        wait_for_state(&client, first, JobState::Succeeded).await;
        wait_idle(&client).await;
        assert_eq!(*ran.lock().unwrap(), vec![first]);
        assert!(client.get_job(second).await.is_none());
    }

    #[tokio::test]
    async fn runner_failure_is_recorded_verbatim() {
        let client = JobQueueClient::new();
        client.register_executor(FailingExecutor).await;
        let id = client.enqueue(job(JobKind::InvoiceDownload, OWNER)).await.unwrap().job_id;

        let record = wait_for_state(&client, id, JobState::Failed).await;
        assert_eq!(record.message, "Erro na execução: credenciais inválidas");
        assert!(record.artifact.is_none());
    }

    #[tokio::test]
    async fn kind_without_executor_fails_with_static_message() {
        let client = JobQueueClient::new();
        assert!(!client.supports(JobKind::ReportGeneration).await);
        let id = client.enqueue(job(JobKind::ReportGeneration, OWNER)).await.unwrap().job_id;

        let record = wait_for_state(&client, id, JobState::Failed).await;
        assert_eq!(record.message, "Opção report-generation ainda não disponível.");
    }

    #[tokio::test]
    async fn panicking_executor_fails_job_and_queue_keeps_draining() {
        let client = JobQueueClient::new();
        client.register_executor(PanickingExecutor).await;
        client.register_executor(FailingExecutor).await;

        let broken = client.enqueue(job(JobKind::BatchLookup, OWNER)).await.unwrap().job_id;
        let next = client.enqueue(job(JobKind::InvoiceDownload, OWNER)).await.unwrap().job_id;

        let record = wait_for_state(&client, broken, JobState::Failed).await;
        assert!(record.message.starts_with("Execução interrompida"));
        wait_for_state(&client, next, JobState::Failed).await;
        wait_idle(&client).await;
    }

    #[tokio::test]
    async fn duplicate_enqueue_is_rejected() {
        let client = JobQueueClient::new();
        let descriptor = job(JobKind::InvoiceDownload, OWNER);
        client.enqueue(descriptor.clone()).await.unwrap();
        assert!(matches!(
            client.enqueue(descriptor).await,
            Err(JobQueueError::Duplicate(_))
        ));
        wait_idle(&client).await;
    }

    #[tokio::test]
    async fn repeated_status_on_succeeded_job_is_stable() {
        let client = JobQueueClient::new();
        let ran = Arc::new(std::sync::Mutex::new(Vec::new()));
        client
            .register_executor(RecordingExecutor {
                kind: JobKind::ReportGeneration,
                ran,
            })
            .await;
        let id = client.enqueue(job(JobKind::ReportGeneration, OWNER)).await.unwrap().job_id;
        wait_for_state(&client, id, JobState::Succeeded).await;

        let first = client.get_status(id, OWNER).await.unwrap();
        let second = client.get_status(id, OWNER).await.unwrap();
        assert_eq!(first.state, second.state);
        assert_eq!(first.message, second.message);
        assert_eq!(first.artifact, second.artifact);
        assert_eq!(first.updated_at, second.updated_at);
    }
}
