//! Core types for the job queue system.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::JobQueueError;

/// The automation a job runs. Closed set; each kind maps to one external executable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobKind {
    #[serde(rename = "invoice-download", alias = "1. Download PDF Católica")]
    InvoiceDownload,
    #[serde(rename = "report-generation", alias = "2. Relatório FIPE")]
    ReportGeneration,
    #[serde(rename = "batch-lookup")]
    BatchLookup,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [
        JobKind::InvoiceDownload,
        JobKind::ReportGeneration,
        JobKind::BatchLookup,
    ];

    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvoiceDownload => "invoice-download",
            Self::ReportGeneration => "report-generation",
            Self::BatchLookup => "batch-lookup",
        }
    }

    /// Type of file a successful run of this kind produces.
    #[inline]
    pub const fn artifact_kind(self) -> ArtifactKind {
        match self {
            Self::InvoiceDownload => ArtifactKind::Document,
            Self::ReportGeneration | Self::BatchLookup => ArtifactKind::Spreadsheet,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = JobQueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "invoice-download" | "1. Download PDF Católica" => Ok(Self::InvoiceDownload),
            "report-generation" | "2. Relatório FIPE" => Ok(Self::ReportGeneration),
            "batch-lookup" => Ok(Self::BatchLookup),
            other => Err(JobQueueError::UnknownKind(other.to_owned())),
        }
    }
}

/// Type tag of a produced artifact, used for download headers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Document,
    Spreadsheet,
}

impl ArtifactKind {
    /// File extension (without the dot) the executable is expected to produce.
    #[inline]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Document => "pdf",
            Self::Spreadsheet => "xlsx",
        }
    }

    #[inline]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Document => "application/pdf",
            Self::Spreadsheet => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

/// A file produced by a successful job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
}

impl Artifact {
    #[inline]
    pub fn new(path: impl Into<PathBuf>, kind: ArtifactKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Immutable description of what to run and for whom.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub id: Uuid,
    pub kind: JobKind,
    pub arguments: Vec<String>,
    pub owner: String,
    pub submitted_at: DateTime<Utc>,
    /// Per-job working directory (`<work_root>/<id>`), removed on deletion.
    pub work_dir: PathBuf,
    /// Local files received for this job (uploads), removed on deletion.
    pub attachments: Vec<PathBuf>,
}

impl JobDescriptor {
    /// Create a descriptor with a fresh id whose working directory lives under `work_root`.
    pub fn new(
        kind: JobKind,
        owner: impl Into<String>,
        arguments: Vec<String>,
        work_root: &Path,
    ) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            kind,
            arguments,
            owner: owner.into(),
            submitted_at: Utc::now(),
            work_dir: work_root.join(id.to_string()),
            attachments: Vec::new(),
        }
    }

    #[inline]
    pub fn with_attachment(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachments.push(path.into());
        self
    }
}

/// Result returned after a job has been enqueued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueResult {
    pub job_id: Uuid,
}

/// Lifecycle state of a job.
///
/// The serialized labels are the ones the existing frontend polls for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobState {
    #[serde(rename = "Pendente")]
    Queued,
    #[serde(rename = "Em execução")]
    Running,
    #[serde(rename = "Concluido")]
    Succeeded,
    #[serde(rename = "Falha")]
    Failed,
}

impl JobState {
    /// Returns true if this state represents a terminal state.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    #[inline]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Queued => "Pendente",
            Self::Running => "Em execução",
            Self::Succeeded => "Concluido",
            Self::Failed => "Falha",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What an executor hands back when a run produced its artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutput {
    pub artifact: Artifact,
    pub message: String,
}

impl JobOutput {
    #[inline]
    pub fn new(artifact: Artifact, message: impl Into<String>) -> Self {
        Self {
            artifact,
            message: message.into(),
        }
    }
}

pub const QUEUED_MESSAGE: &str = "Aguardando execução.";
pub const RUNNING_MESSAGE: &str = "Em execução...";

/// Mutable status record for one job.
///
/// `artifact` is only ever set by [`JobRecord::succeed`]; every other transition clears it.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub descriptor: JobDescriptor,
    pub state: JobState,
    pub message: String,
    pub artifact: Option<Artifact>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Create the initial Queued record for a descriptor.
    pub fn queued(descriptor: JobDescriptor) -> Self {
        Self {
            descriptor,
            state: JobState::Queued,
            message: QUEUED_MESSAGE.to_owned(),
            artifact: None,
            updated_at: Utc::now(),
        }
    }

    #[inline]
    pub fn id(&self) -> Uuid {
        self.descriptor.id
    }

    #[inline]
    pub fn owner(&self) -> &str {
        &self.descriptor.owner
    }

    #[inline]
    pub fn kind(&self) -> JobKind {
        self.descriptor.kind
    }

    #[inline]
    pub fn is_owned_by(&self, requester: &str) -> bool {
        self.descriptor.owner == requester
    }

    /// Mark the job as running.
    pub fn start(&mut self) {
        self.transition(JobState::Running, RUNNING_MESSAGE);
    }

    /// Mark the job as succeeded with the artifact it produced.
    pub fn succeed(&mut self, output: JobOutput) {
        self.transition(JobState::Succeeded, output.message);
        self.artifact = Some(output.artifact);
    }

    /// Mark the job as failed with a diagnostic message.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.transition(JobState::Failed, message);
    }

    fn transition(&mut self, state: JobState, message: impl Into<String>) {
        self.state = state;
        self.message = message.into();
        self.artifact = None;
        self.updated_at = Utc::now();
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id(),
            kind: self.kind(),
            state: self.state,
            message: self.message.clone(),
            submitted_at: self.descriptor.submitted_at,
            updated_at: self.updated_at,
        }
    }
}

/// Listing view of a job. Never exposes the artifact location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub id: Uuid,
    pub kind: JobKind,
    pub state: JobState,
    pub message: String,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
