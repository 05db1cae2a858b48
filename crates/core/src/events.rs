//! Job lifecycle events.
//!
//! Published on a [`tokio::sync::broadcast`] channel whenever a job is
//! submitted or reaches a terminal state, so presentation layers can
//! render the job list without polling the store.

use serde::Serialize;

use crate::job::ResultEntry;
use crate::types::{JobId, Timestamp};

/// Broadcast channel capacity for job events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// A job was accepted by the server and is now loading.
    Submitted { job_id: JobId, started_at: Timestamp },

    /// A job reached its terminal state. Emitted exactly once per job.
    Resolved { result: ResultEntry },
}
