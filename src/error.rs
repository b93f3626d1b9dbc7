use crate::reconcile::Action;
use crate::truenas::types::JobState;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("TrueNAS API error: HTTP {status} on {method} {path}: {message}")]
    Api {
        status: u16,
        method: String,
        path: String,
        message: String,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Schema error in {context}: field `{field}` {problem}")]
    Schema {
        context: String,
        field: String,
        problem: String,
    },

    #[error("Ambiguous certificate: {count} certificates named '{name}' (ids {ids:?})")]
    AmbiguousCertificate {
        name: String,
        count: usize,
        ids: Vec<i64>,
    },

    #[error("Job {job_id} finished in state {state}: {message}")]
    JobFailed {
        job_id: i64,
        state: JobState,
        message: String,
    },

    #[error("Job {job_id} timed out after {elapsed:?} (last state {last_state})")]
    JobTimeout {
        job_id: i64,
        last_state: JobState,
        elapsed: Duration,
    },

    #[error("Job {0} not reported by TrueNAS")]
    JobNotFound(i64),

    #[error("Activation failed: certificate {certificate_id} was {action} but could not be made active: {source}")]
    Activation {
        certificate_id: i64,
        action: Action,
        #[source]
        source: Box<SyncError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Process exit code for this error kind. Every variant gets its own code.
    pub fn exit_code(&self) -> i32 {
        match self {
            SyncError::Config(_) => 2,
            SyncError::Io(_) => 3,
            SyncError::Transport(_) => 10,
            SyncError::Api { .. } => 11,
            SyncError::Protocol(_) => 12,
            SyncError::Schema { .. } => 13,
            SyncError::AmbiguousCertificate { .. } => 20,
            SyncError::JobFailed { .. } => 30,
            SyncError::JobTimeout { .. } => 31,
            SyncError::JobNotFound(_) => 32,
            SyncError::Activation { .. } => 40,
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
