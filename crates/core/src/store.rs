//! In-memory job store shared by the submitter, push sessions and poller.
//!
//! [`JobStore`] is the only shared mutable state in the system. Every
//! operation takes the interior lock once and never awaits while holding
//! it, so callers always observe a job as either loading or resolved.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::job::{LoadingEntry, ResultEntry};
use crate::types::{JobId, Timestamp};

/// Outcome of a guarded [`JobStore::resolve`] transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The job was loading; its result is now installed.
    Committed,
    /// The job was not loading (already resolved or never submitted).
    /// The store is unchanged.
    NotLoading,
}

/// Point-in-time copy of the store contents.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreSnapshot {
    /// Outstanding jobs, oldest first.
    pub loading: Vec<LoadingEntry>,
    /// Terminal results in the order they were committed.
    pub results: Vec<ResultEntry>,
}

#[derive(Default)]
struct Inner {
    loading: HashMap<JobId, LoadingEntry>,
    results: Vec<ResultEntry>,
}

impl Inner {
    fn upsert_result(&mut self, entry: ResultEntry) {
        self.results.retain(|r| r.job_id() != entry.job_id());
        self.results.push(entry);
    }
}

/// Mapping from job id to lifecycle state.
///
/// Designed to be wrapped in `Arc` and injected into every component
/// that reads or writes job state.
#[derive(Default)]
pub struct JobStore {
    inner: RwLock<Inner>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly submitted job as loading.
    ///
    /// Returns `false` without changing anything if the id is already
    /// known, either loading or resolved.
    pub async fn insert_loading(&self, job_id: JobId, started_at: Timestamp) -> bool {
        let mut inner = self.inner.write().await;
        let known = inner.loading.contains_key(&job_id)
            || inner.results.iter().any(|r| r.job_id() == &job_id);
        if known {
            return false;
        }
        inner
            .loading
            .insert(job_id.clone(), LoadingEntry { job_id, started_at });
        true
    }

    /// Drop the loading marker for a job, returning it if present.
    pub async fn remove_loading(&self, job_id: &JobId) -> Option<LoadingEntry> {
        self.inner.write().await.loading.remove(job_id)
    }

    /// Install a result, replacing any earlier result for the same job.
    pub async fn upsert_result(&self, entry: ResultEntry) {
        self.inner.write().await.upsert_result(entry);
    }

    /// Single-writer guard for terminal transitions.
    ///
    /// If the job is loading, removes the loading marker and installs
    /// `entry` in one critical section. Otherwise leaves the store alone.
    pub async fn resolve(&self, entry: ResultEntry) -> Resolution {
        let mut inner = self.inner.write().await;
        if inner.loading.remove(entry.job_id()).is_none() {
            return Resolution::NotLoading;
        }
        inner.upsert_result(entry);
        Resolution::Committed
    }

    /// Ids of jobs that have been loading for longer than `threshold`,
    /// oldest first.
    pub async fn stale_jobs(&self, now: Timestamp, threshold: chrono::Duration) -> Vec<JobId> {
        let inner = self.inner.read().await;
        let mut stale: Vec<&LoadingEntry> = inner
            .loading
            .values()
            .filter(|entry| entry.age(now) > threshold)
            .collect();
        stale.sort_by_key(|entry| entry.started_at);
        stale.into_iter().map(|entry| entry.job_id.clone()).collect()
    }

    pub async fn is_loading(&self, job_id: &JobId) -> bool {
        self.inner.read().await.loading.contains_key(job_id)
    }

    pub async fn result_for(&self, job_id: &JobId) -> Option<ResultEntry> {
        self.inner
            .read()
            .await
            .results
            .iter()
            .find(|r| r.job_id() == job_id)
            .cloned()
    }

    pub async fn loading_count(&self) -> usize {
        self.inner.read().await.loading.len()
    }

    /// Copy out the loading set and result list under one read lock.
    pub async fn snapshot(&self) -> StoreSnapshot {
        let inner = self.inner.read().await;
        let mut loading: Vec<LoadingEntry> = inner.loading.values().cloned().collect();
        loading.sort_by_key(|entry| entry.started_at);
        StoreSnapshot {
            loading,
            results: inner.results.clone(),
        }
    }
}
