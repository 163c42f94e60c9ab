//! Line-delimited JSON transport: one request per stdin line, one response
//! per stdout line.

use serde::{Deserialize, Serialize};
use spindle_core::{Engine, EnqueueError, Job};
use thiserror::Error;
use tracing::{info, warn};

pub const MAX_ID_LEN: usize = 128;
pub const MAX_PAYLOAD_LEN: usize = 1 << 20;
pub const MAX_RETRIES: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub max_retries: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("id required")]
    EmptyId,

    #[error("id too long ({0} bytes, max {max})", max = MAX_ID_LEN)]
    IdTooLong(usize),

    #[error("payload too large ({0} bytes, max {max})", max = MAX_PAYLOAD_LEN)]
    PayloadTooLarge(usize),

    #[error("max_retries must be between 0 and {max}, got {0}", max = MAX_RETRIES)]
    MaxRetriesOutOfRange(i64),
}

impl EnqueueRequest {
    pub fn into_job(self) -> Result<Job, ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyId);
        }
        if self.id.len() > MAX_ID_LEN {
            return Err(ValidationError::IdTooLong(self.id.len()));
        }
        if self.payload.len() > MAX_PAYLOAD_LEN {
            return Err(ValidationError::PayloadTooLarge(self.payload.len()));
        }
        let max_retries = u32::try_from(self.max_retries)
            .ok()
            .filter(|n| i64::from(*n) <= MAX_RETRIES)
            .ok_or(ValidationError::MaxRetriesOutOfRange(self.max_retries))?;

        Ok(Job::new(self.id, self.payload).with_max_retries(max_retries))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Queued,
    /// Shutting down, not accepting work.
    Unavailable,
    /// Queue full, the caller may retry later.
    RetryLater,
    Invalid,
}

impl From<Result<(), EnqueueError>> for Status {
    fn from(res: Result<(), EnqueueError>) -> Self {
        match res {
            Ok(()) => Status::Queued,
            Err(EnqueueError::Closed) => Status::Unavailable,
            Err(EnqueueError::Full) => Status::RetryLater,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    fn invalid(id: Option<String>, error: impl ToString) -> Self {
        Self {
            id,
            status: Status::Invalid,
            error: Some(error.to_string()),
        }
    }
}

/// Parse, validate and submit one request line.
pub fn handle_line(engine: &Engine, line: &str) -> Response {
    let request: EnqueueRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "bad request");
            return Response::invalid(None, format!("bad request: {err}"));
        }
    };

    let id = request.id.clone();
    let job = match request.into_job() {
        Ok(job) => job,
        Err(err) => {
            warn!(job_id = %id, error = %err, "request rejected");
            return Response::invalid(Some(id).filter(|id| !id.is_empty()), err);
        }
    };

    let max_retries = job.max_retries;
    let result = engine.submit(job);
    match result {
        Ok(()) => info!(job_id = %id, max_retries, "enqueued"),
        Err(err) => warn!(job_id = %id, error = %err, "enqueue rejected"),
    }

    Response {
        id: Some(id),
        status: Status::from(result),
        error: None,
    }
}
