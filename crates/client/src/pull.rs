//! Pull-channel query helper shared by the poller and push sessions.
//!
//! Both the periodic stale-job poll and the one-shot query a session
//! issues after an `already_sent` notice go through
//! [`query_and_apply`], so the two paths interpret statuses identically.

use async_trait::async_trait;
use genbridge_core::job::ResultEntry;
use genbridge_core::reconciler::Reconciler;
use genbridge_core::store::Resolution;
use genbridge_core::types::JobId;

use crate::api::{ApiError, GenerationApi, JobStatus};

/// Message used when the pull channel reports an error without text.
const DEFAULT_ERROR_MESSAGE: &str = "Image generation failed";

/// Anything that can report a job's status on the pull channel.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self, job_id: &JobId) -> Result<JobStatus, ApiError>;
}

#[async_trait]
impl StatusSource for GenerationApi {
    async fn fetch_status(&self, job_id: &JobId) -> Result<JobStatus, ApiError> {
        GenerationApi::fetch_status(self, job_id).await
    }
}

/// What a single pull-channel query achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// A terminal status was handed to the reconciler.
    Applied(Resolution),
    /// The job is still running.
    Processing,
    /// The query failed or the answer was unusable. Logged only.
    Unavailable,
}

/// Query the pull channel once for `job_id` and apply any terminal status.
pub async fn query_and_apply(
    source: &dyn StatusSource,
    reconciler: &Reconciler,
    job_id: &JobId,
) -> PullOutcome {
    let status = match source.fetch_status(job_id).await {
        Ok(status) => status,
        Err(e) => {
            tracing::warn!(job_id = %job_id, error = %e, "Status query failed");
            return PullOutcome::Unavailable;
        }
    };

    let result = match status {
        JobStatus::Completed { result } => match result.filter(|r| !r.trim().is_empty()) {
            Some(image_url) => ResultEntry::success(job_id.clone(), image_url),
            None => {
                tracing::warn!(job_id = %job_id, "Completed status carried no result");
                return PullOutcome::Unavailable;
            }
        },
        JobStatus::Error { error } => ResultEntry::failure(
            job_id.clone(),
            error
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string()),
        ),
        JobStatus::Processing => {
            tracing::debug!(job_id = %job_id, "Job still processing");
            return PullOutcome::Processing;
        }
    };

    PullOutcome::Applied(reconciler.apply_result(result).await)
}
