//! HTTP coordinator surface.
//!
//! Routes:
//!
//! | method | path           | purpose                          |
//! |--------|----------------|----------------------------------|
//! | POST   | `/convert`     | submit a document, get a job id  |
//! | GET    | `/status/{id}` | poll; terminal payload delivered once |
//! | GET    | `/health`      | liveness + active job count      |
//! | GET    | `/`            | service banner                   |

pub mod error;
mod handlers;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tokio_util::task::TaskTracker;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::{CoordinatorConfig, StoreBackend};
use crate::convert::{Converter, MarkerCommand};
use crate::error::StoreError;
use crate::runner::Runner;
use crate::store::{FileStore, JobStore, MemoryStore};

pub use error::ApiError;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JobStore>,
    pub runner: Runner,
    pub tracker: TaskTracker,
    pub config: Arc<CoordinatorConfig>,
}

impl AppState {
    /// Wire up state from explicit parts (tests inject fake converters).
    pub fn new(
        store: Arc<dyn JobStore>,
        converter: Arc<dyn Converter>,
        config: CoordinatorConfig,
    ) -> Self {
        let runner = Runner::new(Arc::clone(&store), converter, config.conversion_deadline);
        Self {
            store,
            runner,
            tracker: TaskTracker::new(),
            config: Arc::new(config),
        }
    }

    /// Production wiring: backend per config, `marker_single` converter.
    pub async fn from_config(config: CoordinatorConfig) -> Result<Self, StoreError> {
        let store: Arc<dyn JobStore> = match config.store {
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
            StoreBackend::File => Arc::new(FileStore::open(config.jobs_dir()).await?),
        };
        let converter = Arc::new(MarkerCommand::new(config.marker_program.clone()));
        Ok(Self::new(store, converter, config))
    }
}

/// Build the router with the full middleware stack.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    // Headroom over the file limit for multipart framing and text fields.
    let body_limit = state.config.max_upload_bytes + 64 * 1024;

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/convert", post(handlers::submit))
        .route("/status/{id}", get(handlers::poll))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::new())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(config: &CoordinatorConfig) -> CorsLayer {
    if config.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
