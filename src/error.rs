//! Crate-wide error type and its serializable classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::backoff::FailureClass;
use crate::cache::FetchError;
use crate::client::ServiceError;
use crate::config::ConfigError;
use crate::placement::PlacementError;
use crate::request::RequestError;
use crate::storage::StorageError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid request: {0}")]
    Validation(#[from] RequestError),

    #[error("invalid placement: {0}")]
    Placement(#[from] PlacementError),

    #[error("missing credential: set {0}")]
    MissingCredential(&'static str),

    #[error("transient service error: {0}")]
    TransientService(String),

    #[error("service rejected request: {0}")]
    PermanentService(String),

    #[error("gave up after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: u32, last_error: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("generation failed: {0}")]
    GenerationFailed(String),

    #[error("job was cancelled")]
    Cancelled,

    #[error(transparent)]
    FetchFailed(#[from] FetchError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A job that ended unsuccessfully, as recorded on the job
    #[error("{0}")]
    Job(JobError),
}

impl From<ServiceError> for Error {
    fn from(err: ServiceError) -> Self {
        match err.class() {
            FailureClass::Transient => Error::TransientService(err.to_string()),
            FailureClass::Permanent => Error::PermanentService(err.to_string()),
        }
    }
}

/// Stable error category, recorded on jobs and emitted by the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Placement,
    MissingCredential,
    TransientService,
    PermanentService,
    RetryExhausted,
    Timeout,
    GenerationFailed,
    Cancelled,
    FetchFailed,
    Storage,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Placement => "placement",
            ErrorKind::MissingCredential => "missing_credential",
            ErrorKind::TransientService => "transient_service",
            ErrorKind::PermanentService => "permanent_service",
            ErrorKind::RetryExhausted => "retry_exhausted",
            ErrorKind::Timeout => "timeout",
            ErrorKind::GenerationFailed => "generation_failed",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::FetchFailed => "fetch_failed",
            ErrorKind::Storage => "storage",
            ErrorKind::Config => "config",
        };
        f.write_str(name)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::Placement(_) => ErrorKind::Placement,
            Error::MissingCredential(_) => ErrorKind::MissingCredential,
            Error::TransientService(_) => ErrorKind::TransientService,
            Error::PermanentService(_) => ErrorKind::PermanentService,
            Error::RetryExhausted { .. } => ErrorKind::RetryExhausted,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::GenerationFailed(_) => ErrorKind::GenerationFailed,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::FetchFailed(_) => ErrorKind::FetchFailed,
            Error::Storage(_) => ErrorKind::Storage,
            Error::Config(_) => ErrorKind::Config,
            Error::Job(err) => err.kind,
        }
    }
}

/// Error snapshot stored on a job record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
}

impl JobError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&Error> for JobError {
    fn from(err: &Error) -> Self {
        match err {
            Error::Job(job) => job.clone(),
            _ => JobError::new(err.kind(), err.to_string()),
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
