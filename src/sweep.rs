//! Retention sweep.
//!
//! Any record a client never polls would otherwise live forever, since
//! poll-side cleanup only fires on retrieval. The sweep runs on a fixed
//! interval and reclaims every record older than the retention window,
//! regardless of state — a perpetually `processing` record whose runner
//! died is reclaimed the same way as an unread result.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::store::JobStore;
use crate::workspace::JobWorkspace;

/// Periodic cleanup of expired job records and their artifacts.
pub struct RetentionSweep {
    store: Arc<dyn JobStore>,
    data_dir: PathBuf,
    retention: Duration,
    period: Duration,
}

impl RetentionSweep {
    pub fn new(
        store: Arc<dyn JobStore>,
        data_dir: impl Into<PathBuf>,
        retention: Duration,
        period: Duration,
    ) -> Self {
        Self {
            store,
            data_dir: data_dir.into(),
            retention,
            period,
        }
    }

    /// Loop until `shutdown` fires. Errors are logged and the loop keeps
    /// going; a failed pass just means the next one has more to do.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut tick = interval(self.period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period = ?self.period, retention = ?self.retention, "retention sweep started");

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match self.sweep_once().await {
                        Ok(0) => debug!("retention sweep: nothing expired"),
                        Ok(n) => info!(reclaimed = n, "retention sweep reclaimed expired jobs"),
                        Err(e) => warn!(error = %e, "retention sweep pass failed"),
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("retention sweep stopping");
                    return;
                }
            }
        }
    }

    /// One pass: delete every record older than the retention window and
    /// remove its on-disk artifacts. Returns how many were reclaimed.
    pub async fn sweep_once(&self) -> Result<usize, crate::error::StoreError> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.retention).unwrap_or(chrono::Duration::zero());
        let expired = self.store.expired(cutoff).await?;
        let mut reclaimed = 0;

        for id in expired {
            // Claim, don't delete blindly: a concurrent poll claiming the
            // same record must not double-remove, and we need input_ref
            // for artifact cleanup.
            let Some(record) = self.store.claim(id).await? else {
                continue;
            };
            let ws = JobWorkspace::locate(&self.data_dir, id, &record.input_ref);
            if let Err(e) = ws.remove().await {
                warn!(job = %id, error = %e, "failed to remove expired job artifacts");
            }
            reclaimed += 1;
        }
        Ok(reclaimed)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;
    use uuid::Uuid;

    use crate::job::JobRecord;
    use crate::options::ConvertOptions;
    use crate::store::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn sweep_reclaims_only_expired_records() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());

        let id = Uuid::new_v4();
        let ws = JobWorkspace::stage(dir.path(), id, "old.pdf", b"%PDF")
            .await
            .unwrap();
        let mut old = JobRecord::new(id, ws.input_path().to_path_buf(), ConvertOptions::default());
        old.created_at = Utc::now() - chrono::Duration::hours(2);
        store.create(&old).await.unwrap();

        let fresh = JobRecord::new(
            Uuid::new_v4(),
            dir.path().join("fresh.pdf"),
            ConvertOptions::default(),
        );
        store.create(&fresh).await.unwrap();

        let sweep = RetentionSweep::new(
            store.clone(),
            dir.path(),
            Duration::from_secs(3600),
            Duration::from_secs(60),
        );
        let reclaimed = sweep.sweep_once().await.unwrap();

        assert_eq!(reclaimed, 1);
        assert!(store.load(old.id).await.unwrap().is_none());
        assert!(store.load(fresh.id).await.unwrap().is_some());
        assert!(!ws.input_path().exists());
    }

    #[tokio::test]
    async fn run_stops_on_cancellation() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let sweep = RetentionSweep::new(
            store,
            dir.path(),
            Duration::from_secs(3600),
            Duration::from_millis(10),
        );

        let token = CancellationToken::new();
        let handle = tokio::spawn(sweep.run(token.clone()));
        tokio::time::sleep(Duration::from_millis(30)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
