//! In-memory job store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::job::JobRecord;

use super::JobStore;

/// In-process job store backed by a `HashMap`.
///
/// `claim` removes under the write lock, so at most one concurrent caller
/// can win a given id.
#[derive(Debug, Default)]
pub struct MemoryStore {
    jobs: RwLock<HashMap<Uuid, JobRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create(&self, record: &JobRecord) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&record.id) {
            return Err(StoreError::DuplicateId(record.id));
        }
        jobs.insert(record.id, record.clone());
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn save(&self, record: &JobRecord) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&record.id) {
            Some(slot) => {
                *slot = record.clone();
                Ok(())
            }
            None => Err(StoreError::Unavailable {
                op: "save",
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("job {} no longer exists", record.id),
                ),
            }),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.jobs.write().await.remove(&id);
        Ok(())
    }

    async fn claim(&self, id: Uuid) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.jobs.write().await.remove(&id))
    }

    async fn expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<Uuid>, StoreError> {
        let jobs = self.jobs.read().await;
        Ok(jobs
            .values()
            .filter(|r| r.created_before(cutoff))
            .map(|r| r.id)
            .collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.jobs.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use chrono::Duration;

    use crate::options::ConvertOptions;

    use super::*;

    fn record() -> JobRecord {
        JobRecord::new(
            Uuid::new_v4(),
            PathBuf::from("/tmp/in.pdf"),
            ConvertOptions::default(),
        )
    }

    #[tokio::test]
    async fn create_then_load_roundtrips() {
        let store = MemoryStore::new();
        let r = record();
        store.create(&r).await.unwrap();
        let loaded = store.load(r.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, r.id);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_id() {
        let store = MemoryStore::new();
        let r = record();
        store.create(&r).await.unwrap();
        assert!(matches!(
            store.create(&r).await,
            Err(StoreError::DuplicateId(id)) if id == r.id
        ));
    }

    #[tokio::test]
    async fn save_of_deleted_record_fails() {
        let store = MemoryStore::new();
        let r = record();
        store.create(&r).await.unwrap();
        store.delete(r.id).await.unwrap();
        assert!(store.save(&r).await.is_err());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryStore::new();
        store.delete(Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn claim_returns_record_exactly_once() {
        let store = MemoryStore::new();
        let r = record();
        store.create(&r).await.unwrap();
        assert!(store.claim(r.id).await.unwrap().is_some());
        assert!(store.claim(r.id).await.unwrap().is_none());
        assert!(store.load(r.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_claims_yield_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let r = record();
        store.create(&r).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let id = r.id;
            handles.push(tokio::spawn(async move { store.claim(id).await.unwrap() }));
        }
        let mut winners = 0;
        for h in handles {
            if h.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn expired_filters_on_created_at() {
        let store = MemoryStore::new();
        let mut old = record();
        old.created_at = Utc::now() - Duration::hours(2);
        let fresh = record();
        store.create(&old).await.unwrap();
        store.create(&fresh).await.unwrap();

        let stale = store.expired(Utc::now() - Duration::hours(1)).await.unwrap();
        assert_eq!(stale, vec![old.id]);
    }
}
