use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use axum::http::{header, HeaderMap};
use jobgate_auth::{AuthenticatorTrait, Credentials};
use jobgate_job_queue::JobQueueClient;

use crate::error::ApiError;

/// Header carrying the caller-declared identity.
pub const EMAIL_HEADER: &str = "email";

/// Shared application state passed to every route handler.
pub struct AppState {
    // Use an Arc-wrapped RwLock to allow swapping the inner Arc<T> atomically.
    authenticator: Arc<RwLock<Arc<dyn AuthenticatorTrait>>>,
    pub job_queue: JobQueueClient,
    /// Where uploaded request files are stored before a job consumes them.
    pub uploads_dir: PathBuf,
    /// Parent of the per-job working directories.
    pub work_root: PathBuf,
}

impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            authenticator: Arc::clone(&self.authenticator),
            job_queue: self.job_queue.clone(),
            uploads_dir: self.uploads_dir.clone(),
            work_root: self.work_root.clone(),
        }
    }
}

impl AppState {
    /// Build a fully initialised state container from its constituent parts.
    pub fn new(
        authenticator: Arc<dyn AuthenticatorTrait>,
        job_queue: JobQueueClient,
        uploads_dir: impl Into<PathBuf>,
        work_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            authenticator: Arc::new(RwLock::new(authenticator)),
            job_queue,
            uploads_dir: uploads_dir.into(),
            work_root: work_root.into(),
        }
    }

    /// Atomically get a clone of the current authenticator.
    pub fn authenticator(&self) -> Arc<dyn AuthenticatorTrait> {
        let guard = self
            .authenticator
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        guard.clone()
    }

    /// Atomically swap the authenticator, returning the previous one.
    pub fn swap_authenticator(
        &self,
        new: Arc<dyn AuthenticatorTrait>,
    ) -> Arc<dyn AuthenticatorTrait> {
        let mut guard = self
            .authenticator
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, new)
    }

    /// Resolve the identity of the caller.
    ///
    /// `body_email` is only consulted when the `email` header is absent.
    pub async fn require_owner(
        &self,
        headers: &HeaderMap,
        body_email: Option<String>,
    ) -> Result<String, ApiError> {
        let credentials = credentials_from_headers(headers).or_email(body_email);
        let ctx = self.authenticator().authenticate(&credentials).await?;
        Ok(ctx.require_owner()?.to_owned())
    }
}

fn header_str(headers: &HeaderMap, name: impl header::AsHeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

/// Pull the identity material out of request headers.
pub fn credentials_from_headers(headers: &HeaderMap) -> Credentials {
    Credentials::new(
        header_str(headers, header::AUTHORIZATION),
        header_str(headers, EMAIL_HEADER),
    )
}
