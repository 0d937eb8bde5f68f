//! In-memory batch store.
//!
//! # Locks
//! Two levels:
//! - the map `RwLock` guards membership (insert, remove, prune)
//! - each job's `Mutex` guards its state, progress and item records
//!
//! Lock order is always map -> job. Nobody takes the map lock while holding
//! a job lock, so the two levels cannot deadlock against each other.
//!
//! # Membership vs. transitions
//! Removal (`remove_if`, `prune_completed_before`) takes the map write lock
//! and then inspects the job. State transitions that must not race removal
//! (`update`) take the map read lock and then the job lock. Either side
//! therefore sees the other's result in full: a start never lands on a job
//! that was already removed, and a delete always judges the current state.
//!
//! Read paths (`get`, `all`) release the map lock before the caller locks a
//! job; they are snapshots of membership, nothing more.
//!
//! Jobs live in process memory only and are gone on restart.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::domain::{BatchId, BatchJob};
use crate::error::BatchError;

pub type SharedJob = Arc<Mutex<BatchJob>>;

#[derive(Debug, Default)]
pub struct BatchStore {
    jobs: RwLock<HashMap<BatchId, SharedJob>>,
}

impl BatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, job: BatchJob) -> SharedJob {
        let id = job.id;
        let shared = Arc::new(Mutex::new(job));
        self.jobs.write().await.insert(id, Arc::clone(&shared));
        shared
    }

    pub async fn get(&self, id: BatchId) -> Option<SharedJob> {
        self.jobs.read().await.get(&id).cloned()
    }

    pub async fn require(&self, id: BatchId) -> Result<SharedJob, BatchError> {
        self.get(id).await.ok_or(BatchError::NotFound(id))
    }

    /// Every stored job, in no particular order.
    pub async fn all(&self) -> Vec<SharedJob> {
        self.jobs.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Run `transition` on job `id` while membership is read-locked.
    ///
    /// A concurrent `remove_if` needs the write lock, so it either finishes
    /// before the lookup (and the caller sees `NotFound`) or waits until the
    /// transition is done and judges the job in its new state.
    pub async fn update<F, R>(
        &self,
        id: BatchId,
        transition: F,
    ) -> Result<(SharedJob, R), BatchError>
    where
        F: FnOnce(&mut BatchJob) -> Result<R, BatchError>,
    {
        let jobs = self.jobs.read().await;
        let shared = jobs.get(&id).cloned().ok_or(BatchError::NotFound(id))?;
        let outcome = {
            let mut job = shared.lock().await;
            transition(&mut job)?
        };
        drop(jobs);
        Ok((shared, outcome))
    }

    /// Remove `id` if `check` accepts the job. Membership stays locked
    /// during the check, so the job cannot change hands in between.
    pub async fn remove_if<F>(&self, id: BatchId, check: F) -> Result<BatchJob, BatchError>
    where
        F: FnOnce(&BatchJob) -> Result<(), BatchError>,
    {
        let mut jobs = self.jobs.write().await;
        let shared = jobs.get(&id).cloned().ok_or(BatchError::NotFound(id))?;
        let job = shared.lock().await;
        check(&job)?;
        let removed = job.clone();
        drop(job);
        jobs.remove(&id);
        Ok(removed)
    }

    /// Remove terminal jobs that completed before `cutoff`.
    pub async fn prune_completed_before(&self, cutoff: DateTime<Utc>) -> Vec<BatchId> {
        let mut jobs = self.jobs.write().await;
        let mut expired = Vec::new();
        for (id, shared) in jobs.iter() {
            let job = shared.lock().await;
            let done_before = job.completed_at.is_some_and(|at| at < cutoff);
            if job.state.is_terminal() && done_before {
                expired.push(*id);
            }
        }
        for id in &expired {
            jobs.remove(id);
        }
        expired
    }
}
