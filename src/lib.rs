//! markerd — an asynchronous job coordinator for slow document conversion.
//!
//! A caller uploads a PDF, immediately receives a job id, and polls for the
//! converted Markdown later. The conversion itself is delegated to an
//! external collaborator (`marker_single` by default) that can take minutes
//! per document, so nothing in the request path ever waits on it.
//!
//! The moving parts:
//!
//! * [`job`] — the job record and its `processing → complete | error`
//!   state machine.
//! * [`store`] — pluggable persistence ([`store::MemoryStore`] for a single
//!   process, [`store::FileStore`] to survive restarts); its atomic `claim`
//!   gives poll at-most-once result delivery.
//! * [`convert`] — the [`convert::Converter`] trait and the subprocess
//!   implementation.
//! * [`runner`] — runs one conversion under a hard deadline and writes the
//!   terminal record.
//! * [`server`] — the axum HTTP surface (`POST /convert`, `GET /status/{id}`).
//! * [`sweep`] — retention loop reclaiming records nobody came back for.
//!
//! Embedding the coordinator:
//!
//! ```no_run
//! use markerd::{server, CoordinatorConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let state = server::AppState::from_config(CoordinatorConfig::default()).await?;
//! let app = server::build_router(state);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod convert;
pub mod error;
pub mod job;
pub mod options;
pub mod runner;
pub mod server;
pub mod store;
pub mod sweep;
pub mod workspace;

pub use config::{CoordinatorConfig, StoreBackend};
pub use error::{ConvertError, StoreError};
pub use job::{JobRecord, JobStatus};
pub use options::{ConvertOptions, EnhancementCredential, OutputFormat};
