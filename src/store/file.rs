//! File-backed job store.
//!
//! One JSON document per job at `<root>/<id>.json`. Writes go through a
//! temp file in the same directory followed by a rename, so a reader never
//! observes a half-written record. `claim` renames `<id>.json` to
//! `<id>.json.claimed` before reading it: the filesystem arbitrates, so at
//! most one concurrent claimer wins even across processes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use uuid::Uuid;

use tracing::warn;

use crate::error::StoreError;
use crate::job::JobRecord;

use super::JobStore;

/// Durable job store writing one JSON file per record.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (and create if absent) a store rooted at `root`.
    ///
    /// Reaps leftovers from a previous crash: a `.claimed` file means the
    /// process died between a claim's rename and its read (the record was
    /// already promised to nobody, so dropping it is safe), and a `.tmp`
    /// file is a write that never landed. Neither is visible to `load`,
    /// `expired`, or `count`, so without reaping they would accumulate.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|source| StoreError::Unavailable { op: "open", source })?;

        let mut entries = fs::read_dir(&root)
            .await
            .map_err(|source| StoreError::Unavailable { op: "open", source })?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| StoreError::Unavailable { op: "open", source })?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.ends_with(".claimed") || name.ends_with(".tmp") {
                if let Err(e) = fs::remove_file(entry.path()).await {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!(file = %entry.path().display(), error = %e, "failed to reap stray store file");
                    }
                }
            }
        }
        Ok(Self { root })
    }

    fn record_path(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    fn claimed_path(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{id}.json.claimed"))
    }

    async fn write_record(&self, path: &Path, record: &JobRecord) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(record).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        // Temp file in the same directory so the rename stays on one
        // filesystem and lands atomically.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &body)
            .await
            .map_err(|source| StoreError::Unavailable { op: "write", source })?;
        fs::rename(&tmp, path)
            .await
            .map_err(|source| StoreError::Unavailable { op: "write", source })?;
        Ok(())
    }

    async fn read_record(&self, path: &Path) -> Result<Option<JobRecord>, StoreError> {
        match fs::read(path).await {
            Ok(body) => {
                let record =
                    serde_json::from_slice(&body).map_err(|e| StoreError::Corrupt {
                        path: path.to_path_buf(),
                        detail: e.to_string(),
                    })?;
                Ok(Some(record))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Unavailable { op: "read", source }),
        }
    }
}

#[async_trait]
impl JobStore for FileStore {
    async fn create(&self, record: &JobRecord) -> Result<(), StoreError> {
        let path = self.record_path(record.id);
        match fs::try_exists(&path).await {
            Ok(true) => return Err(StoreError::DuplicateId(record.id)),
            Ok(false) => {}
            Err(source) => return Err(StoreError::Unavailable { op: "create", source }),
        }
        self.write_record(&path, record).await
    }

    async fn load(&self, id: Uuid) -> Result<Option<JobRecord>, StoreError> {
        self.read_record(&self.record_path(id)).await
    }

    // The exists-check and the write are not atomic against a concurrent
    // claim rename: a claim landing in between resurrects the record in
    // its terminal state. The window is a few microseconds, the sweep is
    // the only claimer of non-terminal records, and the next sweep pass
    // reclaims the resurrected record, so this stays a two-step write.
    async fn save(&self, record: &JobRecord) -> Result<(), StoreError> {
        let path = self.record_path(record.id);
        match fs::try_exists(&path).await {
            Ok(true) => self.write_record(&path, record).await,
            Ok(false) => Err(StoreError::Unavailable {
                op: "save",
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("job {} no longer exists", record.id),
                ),
            }),
            Err(source) => Err(StoreError::Unavailable { op: "save", source }),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        match fs::remove_file(self.record_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Unavailable { op: "delete", source }),
        }
    }

    async fn claim(&self, id: Uuid) -> Result<Option<JobRecord>, StoreError> {
        let path = self.record_path(id);
        let claimed = self.claimed_path(id);
        // Rename first: only the caller whose rename succeeds owns the file.
        match fs::rename(&path, &claimed).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Unavailable { op: "claim", source }),
        }
        let record = self.read_record(&claimed).await?;
        if let Err(e) = fs::remove_file(&claimed).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(StoreError::Unavailable { op: "claim", source: e });
            }
        }
        Ok(record)
    }

    async fn expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<Uuid>, StoreError> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|source| StoreError::Unavailable { op: "expired", source })?;
        let mut stale = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| StoreError::Unavailable { op: "expired", source })?
        {
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            let Ok(id) = stem.parse::<Uuid>() else {
                continue;
            };
            // A record deleted between listing and reading is simply skipped.
            if let Some(record) = self.read_record(&entry.path()).await? {
                if record.created_before(cutoff) {
                    stale.push(id);
                }
            }
        }
        Ok(stale)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|source| StoreError::Unavailable { op: "count", source })?;
        let mut n = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| StoreError::Unavailable { op: "count", source })?
        {
            let name = entry.file_name();
            if name.to_str().is_some_and(|n| n.ends_with(".json")) {
                n += 1;
            }
        }
        Ok(n)
    }

    /// Networked filesystems can make a fresh write invisible to an
    /// immediately following read from another task; give readers a few
    /// re-checks before they trust a miss.
    fn staleness_retries(&self) -> u32 {
        3
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use crate::options::ConvertOptions;

    use super::*;

    fn record() -> JobRecord {
        JobRecord::new(
            Uuid::new_v4(),
            PathBuf::from("/tmp/in.pdf"),
            ConvertOptions::default(),
        )
    }

    async fn store() -> (TempDir, FileStore) {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn create_load_save_delete_cycle() {
        let (_dir, store) = store().await;
        let r = record();
        store.create(&r).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        let done = r.clone().complete("# Title".to_string());
        store.save(&done).await.unwrap();
        let loaded = store.load(r.id).await.unwrap().unwrap();
        assert_eq!(loaded.result.as_deref(), Some("# Title"));

        store.delete(r.id).await.unwrap();
        assert!(store.load(r.id).await.unwrap().is_none());
        // second delete is a no-op
        store.delete(r.id).await.unwrap();
    }

    #[tokio::test]
    async fn create_rejects_duplicate_id() {
        let (_dir, store) = store().await;
        let r = record();
        store.create(&r).await.unwrap();
        assert!(matches!(
            store.create(&r).await,
            Err(StoreError::DuplicateId(_))
        ));
    }

    #[tokio::test]
    async fn save_requires_existing_record() {
        let (_dir, store) = store().await;
        assert!(store.save(&record()).await.is_err());
    }

    #[tokio::test]
    async fn claim_is_single_winner() {
        let (_dir, store) = store().await;
        let store = Arc::new(store);
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
        assert!(store.load(r.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_record_surfaces_as_error() {
        let (dir, store) = store().await;
        let id = Uuid::new_v4();
        fs::write(dir.path().join(format!("{id}.json")), b"not json")
            .await
            .unwrap();
        assert!(matches!(
            store.load(id).await,
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn open_reaps_stray_claim_and_temp_files() {
        let dir = TempDir::new().unwrap();
        let id = Uuid::new_v4();
        let claimed = dir.path().join(format!("{id}.json.claimed"));
        let tmp = dir.path().join(format!("{id}.json.tmp"));
        fs::write(&claimed, b"{}").await.unwrap();
        fs::write(&tmp, b"{}").await.unwrap();

        let store = FileStore::open(dir.path()).await.unwrap();

        assert!(!claimed.exists());
        assert!(!tmp.exists());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn open_keeps_intact_records() {
        let dir = TempDir::new().unwrap();
        let r = record();
        {
            let store = FileStore::open(dir.path()).await.unwrap();
            store.create(&r).await.unwrap();
        }

        // Re-opening after a clean shutdown must not touch real records.
        let store = FileStore::open(dir.path()).await.unwrap();
        assert!(store.load(r.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn expired_skips_foreign_files() {
        let (dir, store) = store().await;
        let mut r = record();
        r.created_at = Utc::now() - chrono::Duration::hours(2);
        store.create(&r).await.unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").await.unwrap();

        let stale = store
            .expired(Utc::now() - chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(stale, vec![r.id]);
    }
}
