//! Compensating status poller.
//!
//! Push delivery can fail silently, so on a fixed cadence the poller
//! picks every job that has been loading longer than the staleness
//! threshold and asks the pull channel about it. Queries within a tick
//! run concurrently and never affect one another.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use genbridge_core::job::ResultEntry;
use genbridge_core::reconciler::Reconciler;
use genbridge_core::store::Resolution;
use genbridge_core::types::{JobId, Timestamp};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::TrackerConfig;
use crate::pull::{query_and_apply, PullOutcome, StatusSource};

/// Counters describing one poll tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Stale jobs queried this tick.
    pub selected: usize,
    /// Jobs this tick resolved through the pull channel.
    pub resolved: usize,
    /// Terminal answers that lost the race to the push channel.
    pub superseded: usize,
    /// Jobs the server reported as still processing.
    pub processing: usize,
    /// Queries that failed or returned something unusable.
    pub unavailable: usize,
    /// Jobs failed by the give-up policy.
    pub given_up: usize,
}

pub struct StatusPoller {
    reconciler: Arc<Reconciler>,
    source: Arc<dyn StatusSource>,
    poll_interval: Duration,
    stale_after: chrono::Duration,
    max_poll_attempts: Option<u32>,
    /// Unresolved status checks per job, for the give-up policy.
    attempts: HashMap<JobId, u32>,
}

impl StatusPoller {
    pub fn new(
        config: &TrackerConfig,
        reconciler: Arc<Reconciler>,
        source: Arc<dyn StatusSource>,
    ) -> Self {
        Self {
            reconciler,
            source,
            poll_interval: config.poll_interval,
            stale_after: config.stale_threshold(),
            max_poll_attempts: config.max_poll_attempts,
            attempts: HashMap::new(),
        }
    }

    /// Tick on the configured cadence until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_ms = self.poll_interval.as_millis() as u64,
            stale_after_secs = self.stale_after.num_seconds(),
            "Status poller started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Status poller stopped");
                    return;
                }
                _ = interval.tick() => {}
            }

            let report = self.tick(Utc::now()).await;
            if report.selected > 0 {
                tracing::debug!(?report, "Status poll tick");
            }
        }
    }

    /// Query every job that has been loading longer than the threshold
    /// as of `now`, and apply what the pull channel reports.
    pub async fn tick(&mut self, now: Timestamp) -> TickReport {
        let stale = self
            .reconciler
            .store()
            .stale_jobs(now, self.stale_after)
            .await;

        // Forget counters for jobs that resolved since the last tick.
        let still_stale: HashSet<&JobId> = stale.iter().collect();
        self.attempts.retain(|id, _| still_stale.contains(id));

        let mut report = TickReport {
            selected: stale.len(),
            ..TickReport::default()
        };
        if stale.is_empty() {
            return report;
        }

        let source = self.source.as_ref();
        let reconciler = self.reconciler.as_ref();
        let outcomes =
            futures::future::join_all(stale.iter().map(|id| query_and_apply(source, reconciler, id)))
                .await;

        for (job_id, outcome) in stale.iter().zip(outcomes) {
            match outcome {
                PullOutcome::Applied(Resolution::Committed) => {
                    report.resolved += 1;
                    self.attempts.remove(job_id);
                }
                PullOutcome::Applied(Resolution::NotLoading) => {
                    report.superseded += 1;
                    self.attempts.remove(job_id);
                }
                PullOutcome::Processing => {
                    report.processing += 1;
                    if self.record_attempt(job_id).await {
                        report.given_up += 1;
                    }
                }
                PullOutcome::Unavailable => {
                    report.unavailable += 1;
                    if self.record_attempt(job_id).await {
                        report.given_up += 1;
                    }
                }
            }
        }

        report
    }

    /// Count an unresolved check and apply the give-up policy.
    ///
    /// Returns `true` if this call failed the job.
    async fn record_attempt(&mut self, job_id: &JobId) -> bool {
        let attempts = self.attempts.entry(job_id.clone()).or_insert(0);
        *attempts += 1;

        // A job always gets at least one check.
        let Some(max) = self.max_poll_attempts.map(|m| m.max(1)) else {
            return false;
        };
        if *attempts < max {
            return false;
        }

        self.attempts.remove(job_id);
        tracing::warn!(job_id = %job_id, attempts = max, "Giving up on job");
        let failure =
            ResultEntry::failure(job_id.clone(), format!("no result after {max} status checks"));
        self.reconciler.apply_result(failure).await == Resolution::Committed
    }
}
