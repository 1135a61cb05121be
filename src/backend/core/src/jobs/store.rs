//! Job store interface and an in-memory implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{JobId, JobRecord, JobUpdate};
use crate::error::{Result, RunnerError};

/// Durable persistence for job records.
///
/// Implementations must apply each `update` atomically: readers never observe
/// only part of a `JobUpdate`.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Fetch a job snapshot.
    async fn get(&self, job_id: &JobId) -> Result<Option<JobRecord>>;

    /// Apply a partial update. Fails with `JobNotFound` if the job does not exist.
    async fn update(&self, job_id: &JobId, update: JobUpdate) -> Result<()>;
}

/// In-memory job store for testing and embedding.
#[derive(Debug, Default, Clone)]
pub struct InMemoryJobStore {
    jobs: Arc<RwLock<HashMap<JobId, JobRecord>>>,
    updates: Arc<RwLock<Vec<(JobId, JobUpdate)>>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub async fn insert(&self, record: JobRecord) -> JobId {
        let id = record.id.clone();
        self.jobs.write().await.insert(id.clone(), record);
        id
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Every update applied so far, in order.
    pub async fn update_log(&self) -> Vec<(JobId, JobUpdate)> {
        self.updates.read().await.clone()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn get(&self, job_id: &JobId) -> Result<Option<JobRecord>> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn update(&self, job_id: &JobId, update: JobUpdate) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let record = jobs
            .get_mut(job_id)
            .ok_or_else(|| RunnerError::job_not_found(job_id))?;
        record.apply(&update);
        self.updates.write().await.push((job_id.clone(), update));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::jobs::{JobParameters, JobStatus};

    #[tokio::test]
    async fn test_insert_get_update() {
        let store = InMemoryJobStore::new();
        assert!(store.is_empty().await);

        let id = store
            .insert(JobRecord::new("EmailSender", "send", JobParameters::default()))
            .await;
        assert_eq!(store.len().await, 1);

        store.update(&id, JobUpdate::running(0)).await.unwrap();
        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Running);
        assert_eq!(record.retry_count, 0);

        store.update(&id, JobUpdate::retry_count(1)).await.unwrap();
        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Running);
        assert_eq!(record.retry_count, 1);

        assert_eq!(store.update_log().await.len(), 2);
    }

    #[tokio::test]
    async fn test_update_missing_job() {
        let store = InMemoryJobStore::new();
        let err = store
            .update(&JobId::from("missing"), JobUpdate::completed())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::JobNotFound);
        assert!(store.get(&JobId::from("missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = InMemoryJobStore::new();
        let shared: Arc<dyn JobStore> = Arc::new(store.clone());

        let id = store
            .insert(JobRecord::new("Reports", "daily", JobParameters::default()))
            .await;
        shared.update(&id, JobUpdate::completed()).await.unwrap();

        assert_eq!(
            store.get(&id).await.unwrap().unwrap().status,
            JobStatus::Completed
        );
    }
}
