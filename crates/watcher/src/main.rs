//! `genbridge-watcher` -- submit one image-generation job and follow it
//! to its terminal state.
//!
//! # Environment variables
//!
//! | Variable            | Required | Description                                |
//! |---------------------|----------|--------------------------------------------|
//! | `GENBRIDGE_API_URL` | yes      | HTTP base URL, e.g. `http://host:8000`     |
//! | `GENBRIDGE_WS_URL`  | yes      | WebSocket base URL, e.g. `ws://host:8000`  |
//! | `GENBRIDGE_USER_ID` | yes      | User the job is submitted for              |
//! | `RUST_LOG`          | no       | Log filter (default: `info` for genbridge crates) |

use std::sync::Arc;

use anyhow::Context;
use genbridge_client::config::TrackerConfig;
use genbridge_client::tracker::JobTracker;
use genbridge_core::events::JobEvent;
use genbridge_core::job::ResultEntry;
use genbridge_core::types::JobId;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USER_ID_ENV: &str = "GENBRIDGE_USER_ID";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "genbridge_watcher=info,genbridge_client=info,genbridge_core=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = TrackerConfig::from_env()?;
    let user_id = std::env::var(USER_ID_ENV)
        .with_context(|| format!("{USER_ID_ENV} environment variable is required"))?;

    let tracker = JobTracker::start(config, user_id).await?;
    let mut events = tracker.subscribe();

    let job_id = match tracker.submit().await {
        Ok(job_id) => job_id,
        Err(e) => {
            tracker.shutdown().await;
            return Err(e).context("Could not start image generation");
        }
    };

    let outcome = tokio::select! {
        result = wait_for_result(&tracker, &mut events, &job_id) => result,
        _ = tokio::signal::ctrl_c() => None,
    };

    match outcome {
        Some(ResultEntry::Success { payload, .. }) => {
            tracing::info!(job_id = %job_id, image_url = %payload, "Image ready");
        }
        Some(ResultEntry::Failure { message, .. }) => {
            tracing::warn!(job_id = %job_id, error = %message, "Image generation failed");
        }
        None => {
            tracing::info!(job_id = %job_id, "Stopped while job was still loading");
        }
    }

    tracker.shutdown().await;
    Ok(())
}

/// Wait for `job_id`'s resolution event.
///
/// Falls back to the store if events were dropped because this receiver
/// lagged behind.
async fn wait_for_result(
    tracker: &Arc<JobTracker>,
    events: &mut broadcast::Receiver<JobEvent>,
    job_id: &JobId,
) -> Option<ResultEntry> {
    loop {
        match events.recv().await {
            Ok(JobEvent::Resolved { result }) if result.job_id() == job_id => return Some(result),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Job event receiver lagged");
                if let Some(result) = tracker.store().result_for(job_id).await {
                    return Some(result);
                }
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}
