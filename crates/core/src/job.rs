//! Job lifecycle records held by the [`JobStore`](crate::store::JobStore).

use serde::Serialize;

use crate::types::{JobId, Timestamp};

/// Marker for a job that has been submitted and has not resolved yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadingEntry {
    pub job_id: JobId,
    /// When the job was submitted. Drives the poller's staleness check.
    pub started_at: Timestamp,
}

impl LoadingEntry {
    /// How long the job has been loading as of `now`.
    ///
    /// Clock skew that would produce a negative age is clamped to zero.
    pub fn age(&self, now: Timestamp) -> chrono::Duration {
        (now - self.started_at).max(chrono::Duration::zero())
    }
}

/// Terminal outcome of a job, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultEntry {
    /// The job produced an image at `payload`.
    Success { job_id: JobId, payload: String },
    /// The server reported an error for the job.
    Failure { job_id: JobId, message: String },
}

impl ResultEntry {
    pub fn success(job_id: JobId, payload: impl Into<String>) -> Self {
        Self::Success {
            job_id,
            payload: payload.into(),
        }
    }

    pub fn failure(job_id: JobId, message: impl Into<String>) -> Self {
        Self::Failure {
            job_id,
            message: message.into(),
        }
    }

    pub fn job_id(&self) -> &JobId {
        match self {
            Self::Success { job_id, .. } | Self::Failure { job_id, .. } => job_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}
