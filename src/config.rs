//! Coordinator configuration.
//!
//! All runtime behaviour is controlled through [`CoordinatorConfig`]: one
//! struct, well-documented defaults, trivially cloneable and shareable.
//! The CLI binary maps flags/env vars onto it; library users and tests
//! construct it directly.

use std::path::PathBuf;
use std::time::Duration;

/// Which job-store backend to run: durable or in-process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// In-process map. Fast; state is lost on restart, valid only for a
    /// single long-lived coordinator process.
    #[default]
    Memory,
    /// One JSON file per job under `<data_dir>/jobs`. Survives restarts,
    /// which matters when the coordinator is recycled between submit and
    /// poll (serverless / scale-to-zero deployments).
    File,
}

/// Configuration for the job coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Bind address. Default: `0.0.0.0`.
    pub host: String,

    /// Bind port. Default: `8000`.
    pub port: u16,

    /// Root for uploads, outputs, and the file store. Default:
    /// `<system temp dir>/markerd`.
    pub data_dir: PathBuf,

    /// Job-store backend. Default: in-memory.
    pub store: StoreBackend,

    /// Hard upper bound on one conversion. Default: 300 s.
    ///
    /// Malformed or adversarial input can make the collaborator hang
    /// forever; the deadline guarantees every `processing` record resolves.
    pub conversion_deadline: Duration,

    /// How long an unretrieved terminal (or stuck) record and its artifacts
    /// may live before the sweep reclaims them. Default: 1 h.
    pub retention_window: Duration,

    /// How often the retention sweep runs. Default: 60 s.
    pub sweep_interval: Duration,

    /// Maximum accepted upload size in bytes. Default: 200 MiB.
    pub max_upload_bytes: usize,

    /// Allowed CORS origins. Empty means allow any origin (the local
    /// development default of the upstream web client).
    pub cors_origins: Vec<String>,

    /// Conversion collaborator executable. Default: `marker_single`.
    pub marker_program: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            data_dir: std::env::temp_dir().join("markerd"),
            store: StoreBackend::Memory,
            conversion_deadline: Duration::from_secs(300),
            retention_window: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(60),
            max_upload_bytes: 200 * 1024 * 1024,
            cors_origins: Vec::new(),
            marker_program: "marker_single".to_string(),
        }
    }
}

impl CoordinatorConfig {
    /// Directory holding persisted job records (file store backend).
    pub fn jobs_dir(&self) -> PathBuf {
        self.data_dir.join("jobs")
    }
}
