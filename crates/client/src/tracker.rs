//! Job tracker: submission, push sessions and polling behind one handle.
//!
//! [`JobTracker`] owns the job store and everything that writes to it.
//! [`JobTracker::start`] spawns the status poller; every successful
//! [`JobTracker::submit`] seeds the store and spawns that job's push
//! session. Lifecycle events are broadcast via a
//! [`tokio::sync::broadcast`] channel; call [`JobTracker::subscribe`] to
//! receive them.

use std::sync::Arc;

use chrono::Utc;
use genbridge_core::events::{JobEvent, EVENT_CHANNEL_CAPACITY};
use genbridge_core::reconciler::Reconciler;
use genbridge_core::store::{JobStore, StoreSnapshot};
use genbridge_core::types::JobId;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::api::{ApiError, GenerationApi};
use crate::client::PushClient;
use crate::config::TrackerConfig;
use crate::health::{ChannelHealth, PushStatus};
use crate::poller::StatusPoller;
use crate::session::{run_push_session, SessionContext};

/// Tracks the image-generation jobs of one user.
///
/// Created once via [`JobTracker::start`]; the returned `Arc` can be
/// cloned freely.
pub struct JobTracker {
    config: TrackerConfig,
    store: Arc<JobStore>,
    api: Arc<GenerationApi>,
    push_client: PushClient,
    session_ctx: SessionContext,
    event_tx: broadcast::Sender<JobEvent>,
    /// Master cancellation token, cancelled during shutdown.
    cancel: CancellationToken,
    sessions: TaskTracker,
    poller_handle: Mutex<Option<JoinHandle<()>>>,
}

impl JobTracker {
    /// Build the store, reconciler and clients, and start polling.
    pub async fn start(config: TrackerConfig, user_id: String) -> Result<Arc<Self>, TrackerError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(TrackerError::HttpClient)?;
        let api = Arc::new(GenerationApi::with_client(
            http,
            config.api_url.clone(),
            user_id.clone(),
        ));
        let push_client = PushClient::new(config.ws_url.clone(), user_id.clone());

        let store = Arc::new(JobStore::new());
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let reconciler = Arc::new(Reconciler::new(Arc::clone(&store), event_tx.clone()));
        let cancel = CancellationToken::new();

        let session_ctx = SessionContext {
            reconciler: Arc::clone(&reconciler),
            status_source: api.clone(),
            health: ChannelHealth::new(),
            ack_grace: config.ack_grace,
            error_grace: config.error_grace,
            cancel: cancel.child_token(),
        };

        let poller = StatusPoller::new(&config, Arc::clone(&reconciler), api.clone());
        let poller_handle = tokio::spawn(poller.run(cancel.child_token()));

        tracing::info!(
            user_id = %user_id,
            api_url = %config.api_url,
            ws_url = %config.ws_url,
            "Job tracker started",
        );

        Ok(Arc::new(Self {
            config,
            store,
            api,
            push_client,
            session_ctx,
            event_tx,
            cancel,
            sessions: TaskTracker::new(),
            poller_handle: Mutex::new(Some(poller_handle)),
        }))
    }

    /// Subscribe to job lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.event_tx.subscribe()
    }

    /// Watch the push channel health indicator.
    pub fn health(&self) -> watch::Receiver<PushStatus> {
        self.session_ctx.health.subscribe()
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        self.store.snapshot().await
    }

    /// Submit a new job, record it as loading, and open its push session.
    ///
    /// On failure no job record is created.
    pub async fn submit(&self) -> Result<JobId, TrackerError> {
        let job_id = self.api.submit().await.map_err(|e| {
            tracing::error!(error = %e, "Job submission failed");
            TrackerError::Submit(e)
        })?;

        let started_at = Utc::now();
        if !self.store.insert_loading(job_id.clone(), started_at).await {
            return Err(TrackerError::DuplicateJob(job_id));
        }

        tracing::info!(job_id = %job_id, "Job submitted");
        let _ = self.event_tx.send(JobEvent::Submitted {
            job_id: job_id.clone(),
            started_at,
        });

        self.spawn_session(job_id.clone());
        Ok(job_id)
    }

    /// Stop polling and close open push sessions.
    ///
    /// Waits up to the configured shutdown timeout for sessions and the
    /// poller to exit.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down job tracker");
        self.cancel.cancel();
        self.sessions.close();

        let timeout = self.config.shutdown_timeout;
        if tokio::time::timeout(timeout, self.sessions.wait())
            .await
            .is_err()
        {
            tracing::warn!(open = self.sessions.len(), "Push sessions did not stop in time");
        }

        if let Some(handle) = self.poller_handle.lock().await.take() {
            let _ = tokio::time::timeout(timeout, handle).await;
        }

        tracing::info!("Job tracker shut down complete");
    }

    // ---- private helpers ----

    /// Spawn the one-shot push session for `job_id`.
    fn spawn_session(&self, job_id: JobId) {
        let client = self.push_client.clone();
        let ctx = self.session_ctx.clone();

        self.sessions.spawn(async move {
            let outcome = run_push_session(&client, job_id.clone(), &ctx).await;
            tracing::debug!(job_id = %job_id, ?outcome, "Push session finished");
        });
    }
}

/// Errors surfaced to the caller of [`JobTracker`].
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(reqwest::Error),

    /// The service rejected or never answered the submission.
    #[error("Failed to submit job: {0}")]
    Submit(ApiError),

    /// The service returned an id that is already tracked.
    #[error("Job {0} is already tracked")]
    DuplicateJob(JobId),
}
