//! Job record storage.
//!
//! The coordinator never talks to a concrete backend; everything goes
//! through [`JobStore`]. Two implementations ship here:
//!
//! * [`MemoryStore`] — in-process map, single-process deployments.
//! * [`FileStore`] — one JSON file per job, survives process recycling.
//!
//! The trait's central operation is [`JobStore::claim`]: an atomic
//! remove-and-return that gives poll its at-most-once payload delivery.
//! Two concurrent polls on a terminal record race on `claim`; exactly one
//! wins the payload, the loser observes absence.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::job::JobRecord;

/// Persistence contract for job records.
#[async_trait]
pub trait JobStore: Send + Sync + 'static {
    /// Insert a brand-new record. Fails with [`StoreError::DuplicateId`]
    /// if a record with the same id already exists.
    async fn create(&self, record: &JobRecord) -> Result<(), StoreError>;

    /// Fetch a record without removing it. `Ok(None)` means unknown id.
    async fn load(&self, id: Uuid) -> Result<Option<JobRecord>, StoreError>;

    /// Overwrite an existing record (runner writing the terminal state).
    /// Saving an unknown id is an error: the sweep may have reclaimed it.
    async fn save(&self, record: &JobRecord) -> Result<(), StoreError>;

    /// Remove a record. Deleting an absent id is not an error.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    /// Atomically remove and return a record. At most one concurrent
    /// caller gets `Some` for a given id.
    async fn claim(&self, id: Uuid) -> Result<Option<JobRecord>, StoreError>;

    /// Ids of records created strictly before `cutoff`, for the sweep.
    async fn expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<Uuid>, StoreError>;

    /// Number of records currently held.
    async fn count(&self) -> Result<usize, StoreError>;

    /// How many times a reader should re-check after observing a stale or
    /// missing record before trusting the result. Backends with immediate
    /// read-your-writes visibility return 0; backends where a writer's
    /// update may lag a reader (file store on networked filesystems)
    /// return a small positive number.
    fn staleness_retries(&self) -> u32 {
        0
    }
}
