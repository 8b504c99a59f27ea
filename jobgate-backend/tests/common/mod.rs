#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use jobgate_auth::{AuthenticatorTrait, HeaderAuthenticator};
use jobgate_backend::state::AppState;
use jobgate_job_queue::{
    async_trait, Artifact, JobDescriptor, JobExecutor, JobKind, JobOutput, JobQueueError,
    JobQueueClient, JobRecord,
};
use serde_json::Value;
use tokio::sync::Semaphore;
use tower::util::ServiceExt;
use uuid::Uuid;

pub const ANA: &str = "ana@example.com";
pub const BRUNO: &str = "bruno@example.com";

/// Test application: router, shared state, and the temp dir backing its storage.
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub dir: tempfile::TempDir,
}

impl TestApp {
    pub async fn new(executors: Vec<Arc<dyn JobExecutor>>) -> Self {
        Self::with_authenticator(Arc::new(HeaderAuthenticator), executors).await
    }

    pub async fn with_authenticator(
        authenticator: Arc<dyn AuthenticatorTrait>,
        executors: Vec<Arc<dyn JobExecutor>>,
    ) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let job_queue = JobQueueClient::new();
        for executor in executors {
            job_queue.register_executor(SharedExecutor(executor)).await;
        }
        let state = Arc::new(AppState::new(
            authenticator,
            job_queue,
            dir.path().join("uploads"),
            dir.path().join("work"),
        ));
        let router = jobgate_backend::build_router(state.clone());
        Self { router, state, dir }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.expect("oneshot")
    }

    pub async fn submit_json(&self, email: Option<&str>, body: Value) -> Response<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/executar")
            .header("content-type", "application/json");
        if let Some(email) = email {
            builder = builder.header("email", email);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    /// Submit and return the new task id, asserting 202.
    pub async fn submit_ok(&self, email: &str, body: Value) -> Uuid {
        let res = self.submit_json(Some(email), body).await;
        assert_eq!(res.status(), 202);
        let json = body_json(res).await;
        Uuid::parse_str(json["id"].as_str().expect("id")).expect("uuid")
    }

    pub async fn get(&self, uri: &str, email: Option<&str>) -> Response<Body> {
        self.call(Method::GET, uri, email).await
    }

    pub async fn delete(&self, uri: &str, email: Option<&str>) -> Response<Body> {
        self.call(Method::DELETE, uri, email).await
    }

    async fn call(&self, method: Method, uri: &str, email: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(email) = email {
            builder = builder.header("email", email);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// Wait until the job reaches a terminal state.
    pub async fn wait_terminal(&self, id: Uuid) -> JobRecord {
        for _ in 0..500 {
            if let Some(record) = self.state.job_queue.get_job(id).await {
                if record.state.is_terminal() {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} did not finish");
    }
}

pub async fn body_bytes(res: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .expect("body")
        .to_vec()
}

pub async fn body_json(res: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(res).await).expect("json body")
}

struct SharedExecutor(Arc<dyn JobExecutor>);

#[async_trait]
impl JobExecutor for SharedExecutor {
    fn kind(&self) -> JobKind {
        self.0.kind()
    }

    async fn execute(&self, job: &JobDescriptor) -> Result<JobOutput, JobQueueError> {
        self.0.execute(job).await
    }
}

/// Writes `<work_dir>/resultado.<ext>` containing the job arguments joined by `|`.
pub struct ArtifactStub {
    pub kind: JobKind,
    /// When set, each run waits for one permit before finishing.
    pub gate: Option<Arc<Semaphore>>,
}

impl ArtifactStub {
    pub fn shared(kind: JobKind) -> Arc<dyn JobExecutor> {
        Arc::new(ArtifactStub { kind, gate: None })
    }

    pub fn gated(kind: JobKind, gate: Arc<Semaphore>) -> Arc<dyn JobExecutor> {
        Arc::new(ArtifactStub {
            kind,
            gate: Some(gate),
        })
    }
}

#[async_trait]
impl JobExecutor for ArtifactStub {
    fn kind(&self) -> JobKind {
        self.kind
    }

    async fn execute(&self, job: &JobDescriptor) -> Result<JobOutput, JobQueueError> {
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| JobQueueError::ExecutionFailed(e.to_string()))?
                .forget();
        }
        let kind = job.kind.artifact_kind();
        tokio::fs::create_dir_all(&job.work_dir)
            .await
            .map_err(|e| JobQueueError::ExecutionFailed(e.to_string()))?;
        let path = job.work_dir.join(format!("resultado.{}", kind.extension()));
        tokio::fs::write(&path, job.arguments.join("|"))
            .await
            .map_err(|e| JobQueueError::ExecutionFailed(e.to_string()))?;
        Ok(JobOutput::new(Artifact::new(path, kind), "Arquivo gerado com sucesso."))
    }
}

/// Always fails with the given diagnostic.
pub struct FailingStub {
    pub kind: JobKind,
    pub message: String,
}

impl FailingStub {
    pub fn shared(kind: JobKind, message: &str) -> Arc<dyn JobExecutor> {
        Arc::new(FailingStub {
            kind,
            message: message.to_owned(),
        })
    }
}

#[async_trait]
impl JobExecutor for FailingStub {
    fn kind(&self) -> JobKind {
        self.kind
    }

    async fn execute(&self, _job: &JobDescriptor) -> Result<JobOutput, JobQueueError> {
        Err(JobQueueError::ArtifactMissing(self.message.clone()))
    }
}

/// Writes its artifact to a fixed output directory instead of the job's working directory.
pub struct ExternalArtifactStub {
    pub kind: JobKind,
    pub output_dir: std::path::PathBuf,
}

impl ExternalArtifactStub {
    pub fn shared(kind: JobKind, output_dir: &std::path::Path) -> Arc<dyn JobExecutor> {
        Arc::new(ExternalArtifactStub {
            kind,
            output_dir: output_dir.to_path_buf(),
        })
    }
}

#[async_trait]
impl JobExecutor for ExternalArtifactStub {
    fn kind(&self) -> JobKind {
        self.kind
    }

    async fn execute(&self, job: &JobDescriptor) -> Result<JobOutput, JobQueueError> {
        let kind = job.kind.artifact_kind();
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| JobQueueError::ExecutionFailed(e.to_string()))?;
        let path = self
            .output_dir
            .join(format!("Fatura-{}.{}", job.id, kind.extension()));
        tokio::fs::write(&path, job.arguments.join("|"))
            .await
            .map_err(|e| JobQueueError::ExecutionFailed(e.to_string()))?;
        Ok(JobOutput::new(Artifact::new(path, kind), "Arquivo gerado com sucesso."))
    }
}
