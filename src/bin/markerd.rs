//! markerd server binary.
//!
//! ```text
//! markerd --port 8000 --data-dir /var/lib/markerd --store file
//! ```
//!
//! Every flag has a `MARKERD_*` environment variable equivalent; a local
//! `.env` file is loaded first, so development setups need no flags at all.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use markerd::sweep::RetentionSweep;
use markerd::{server, CoordinatorConfig, StoreBackend};

/// How long shutdown waits for in-flight conversions before giving up.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StoreArg {
    /// In-process map; state is lost on restart.
    Memory,
    /// One JSON file per job under the data dir; survives restarts.
    File,
}

#[derive(Parser, Debug)]
#[command(name = "markerd", version, about = "Asynchronous PDF-to-Markdown conversion coordinator")]
struct Cli {
    /// Address to bind.
    #[arg(long, env = "MARKERD_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to bind.
    #[arg(long, env = "MARKERD_PORT", default_value_t = 8000)]
    port: u16,

    /// Root directory for uploads, outputs, and the file store.
    #[arg(long, env = "MARKERD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Job store backend.
    #[arg(long, env = "MARKERD_STORE", value_enum, default_value = "memory")]
    store: StoreArg,

    /// Per-conversion deadline in seconds.
    #[arg(long, env = "MARKERD_DEADLINE_SECS", default_value_t = 300)]
    deadline_secs: u64,

    /// How long unretrieved jobs are kept, in seconds.
    #[arg(long, env = "MARKERD_RETENTION_SECS", default_value_t = 3600)]
    retention_secs: u64,

    /// Seconds between retention sweep passes.
    #[arg(long, env = "MARKERD_SWEEP_INTERVAL_SECS", default_value_t = 60)]
    sweep_interval_secs: u64,

    /// Maximum upload size in MiB.
    #[arg(long, env = "MARKERD_MAX_UPLOAD_MB", default_value_t = 200)]
    max_upload_mb: usize,

    /// Allowed CORS origins (repeatable). Empty allows any origin.
    #[arg(long = "cors-origin", env = "MARKERD_CORS_ORIGINS", value_delimiter = ',')]
    cors_origins: Vec<String>,

    /// Conversion executable to invoke.
    #[arg(long, env = "MARKERD_MARKER_BIN", default_value = "marker_single")]
    marker_bin: String,

    /// Verbose logging (debug level).
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only warnings and errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn into_config(self) -> CoordinatorConfig {
        let defaults = CoordinatorConfig::default();
        CoordinatorConfig {
            host: self.host,
            port: self.port,
            data_dir: self.data_dir.unwrap_or(defaults.data_dir),
            store: match self.store {
                StoreArg::Memory => StoreBackend::Memory,
                StoreArg::File => StoreBackend::File,
            },
            conversion_deadline: Duration::from_secs(self.deadline_secs),
            retention_window: Duration::from_secs(self.retention_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            max_upload_bytes: self.max_upload_mb * 1024 * 1024,
            cors_origins: self.cors_origins,
            marker_program: self.marker_bin,
        }
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "markerd=debug,tower_http=debug"
    } else if quiet {
        "markerd=warn"
    } else {
        "markerd=info,tower_http=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let config = cli.into_config();
    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .with_context(|| format!("failed to create data dir {}", config.data_dir.display()))?;

    let state = server::AppState::from_config(config.clone())
        .await
        .context("failed to initialize job store")?;

    let shutdown = CancellationToken::new();
    let sweep = RetentionSweep::new(
        state.store.clone(),
        config.data_dir.clone(),
        config.retention_window,
        config.sweep_interval,
    );
    let sweep_task = tokio::spawn(sweep.run(shutdown.clone()));

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", config.host, config.port))?;
    info!(
        addr = %listener.local_addr().context("no local address")?,
        store = ?config.store,
        data_dir = %config.data_dir.display(),
        "markerd listening"
    );

    let app = server::build_router(state.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutting down");
    shutdown.cancel();
    state.tracker.close();
    if tokio::time::timeout(SHUTDOWN_GRACE, state.tracker.wait())
        .await
        .is_err()
    {
        warn!(grace = ?SHUTDOWN_GRACE, "in-flight conversions did not finish in time");
    }
    let _ = sweep_task.await;
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
