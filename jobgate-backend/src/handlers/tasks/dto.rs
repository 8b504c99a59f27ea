use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use jobgate_job_queue::{JobKind, JobRecord, JobState, JobSummary};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::{require_text, ValidationIssue};

/// Body of `POST /executar`, sent as JSON or as multipart text fields.
#[derive(Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTaskDto {
    pub opcao: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    #[serde(alias = "mes")]
    pub period: Option<String>,
    pub user_email: Option<String>,
}

impl fmt::Debug for SubmitTaskDto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmitTaskDto")
            .field("opcao", &self.opcao)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("period", &self.period)
            .field("user_email", &self.user_email)
            .finish()
    }
}

impl SubmitTaskDto {
    /// Assign a multipart text field. Returns false for names the form does not know.
    pub fn set_field(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "opcao" => &mut self.opcao,
            "user" => &mut self.user,
            "password" => &mut self.password,
            "period" | "mes" => &mut self.period,
            "userEmail" => &mut self.user_email,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    /// Positional arguments for the automation of `kind`.
    ///
    /// `upload` is the local path of the file received with the request, if any.
    pub fn arguments(
        &self,
        kind: JobKind,
        upload: Option<&Path>,
    ) -> Result<Vec<String>, Vec<ValidationIssue>> {
        let mut issues = Vec::new();
        let args = match kind {
            JobKind::InvoiceDownload => {
                let user = require_text(&mut issues, "user", self.user.as_deref());
                // Passwords are passed through untrimmed.
                let password = self
                    .password
                    .as_deref()
                    .filter(|p| !p.trim().is_empty());
                if password.is_none() {
                    issues.push(ValidationIssue::missing("password"));
                }
                match (user, password) {
                    (Some(u), Some(p)) => vec![u.to_owned(), p.to_owned()],
                    _ => Vec::new(),
                }
            }
            JobKind::ReportGeneration => require_text(&mut issues, "period", self.period.as_deref())
                .map(|p| vec![p.to_owned()])
                .unwrap_or_default(),
            JobKind::BatchLookup => match upload {
                Some(path) => vec![path.to_string_lossy().into_owned()],
                None => {
                    issues.push(ValidationIssue::new(
                        "arquivo",
                        "required",
                        "Arquivo de entrada não enviado.",
                    ));
                    Vec::new()
                }
            },
        };

        if issues.is_empty() {
            Ok(args)
        } else {
            Err(issues)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTaskResponse {
    pub id: Uuid,
    pub mensagem: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub mensagem: String,
}

impl MessageResponse {
    pub fn new(mensagem: impl Into<String>) -> Self {
        Self {
            mensagem: mensagem.into(),
        }
    }
}

/// Entry of `GET /minhas-tarefas`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub id: Uuid,
    pub opcao: JobKind,
    pub status: JobState,
    pub mensagem: String,
    pub data_hora: DateTime<Utc>,
    pub atualizado_em: DateTime<Utc>,
}

impl From<JobSummary> for TaskView {
    fn from(summary: JobSummary) -> Self {
        Self {
            id: summary.id,
            opcao: summary.kind,
            status: summary.state,
            mensagem: summary.message,
            data_hora: summary.submitted_at,
            atualizado_em: summary.updated_at,
        }
    }
}

/// Body of `GET /status/{id}` for jobs without a downloadable artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusView {
    pub status: JobState,
    pub mensagem: String,
}

impl From<&JobRecord> for TaskStatusView {
    fn from(record: &JobRecord) -> Self {
        Self {
            status: record.state,
            mensagem: record.message.clone(),
        }
    }
}
