//! The single authority that commits terminal job results.
//!
//! Push sessions and the status poller both report what they learn to
//! [`Reconciler::apply_result`]. The first report for a loading job wins;
//! later reports for the same job are silently dropped. Both callers may
//! run concurrently for the same job.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::events::JobEvent;
use crate::job::ResultEntry;
use crate::store::{JobStore, Resolution};

pub struct Reconciler {
    store: Arc<JobStore>,
    event_tx: broadcast::Sender<JobEvent>,
}

impl Reconciler {
    pub fn new(store: Arc<JobStore>, event_tx: broadcast::Sender<JobEvent>) -> Self {
        Self { store, event_tx }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Commit `result` if its job is still loading.
    ///
    /// Returns [`Resolution::NotLoading`] when the job has already been
    /// resolved by another channel; that is not an error.
    pub async fn apply_result(&self, result: ResultEntry) -> Resolution {
        let resolution = self.store.resolve(result.clone()).await;

        match resolution {
            Resolution::Committed => {
                match &result {
                    ResultEntry::Success { job_id, payload } => {
                        tracing::info!(job_id = %job_id, image_url = %payload, "Job completed");
                    }
                    ResultEntry::Failure { job_id, message } => {
                        tracing::warn!(job_id = %job_id, error = %message, "Job failed");
                    }
                }
                // No subscribers is fine.
                let _ = self.event_tx.send(JobEvent::Resolved { result });
            }
            Resolution::NotLoading => {
                tracing::debug!(
                    job_id = %result.job_id(),
                    "Ignoring result for job that is not loading",
                );
            }
        }

        resolution
    }
}
