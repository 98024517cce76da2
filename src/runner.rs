//! Drives one conversion from `processing` to a terminal state.
//!
//! The runner is the only writer of terminal job states. Its contract:
//!
//! * every started job resolves — the deadline converts a hung collaborator
//!   into a terminal `error`;
//! * the enhancement credential never reaches a persisted record, even via
//!   collaborator stderr;
//! * input and output artifacts are removed once the outcome is known, so
//!   only the record (and its in-line result) remains for poll.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::convert::{Conversion, Converter};
use crate::job::JobRecord;
use crate::options::EnhancementCredential;
use crate::store::JobStore;
use crate::workspace::JobWorkspace;

/// Error message recorded when a conversion exceeds its deadline.
pub const TIMEOUT_MESSAGE: &str = "timed out";

/// Executes conversions and writes their outcomes back to the store.
#[derive(Clone)]
pub struct Runner {
    store: Arc<dyn JobStore>,
    converter: Arc<dyn Converter>,
    deadline: Duration,
}

impl Runner {
    pub fn new(store: Arc<dyn JobStore>, converter: Arc<dyn Converter>, deadline: Duration) -> Self {
        Self {
            store,
            converter,
            deadline,
        }
    }

    /// Run `record`'s conversion to completion and persist the outcome.
    ///
    /// Never returns an error: every failure mode becomes a terminal
    /// `error` record, except a store failure, which leaves the
    /// `processing` record in place for the retention sweep rather than
    /// fabricating a state the store never acknowledged.
    pub async fn run(
        &self,
        record: JobRecord,
        workspace: JobWorkspace,
        credential: Option<EnhancementCredential>,
    ) {
        let id = record.id;
        let request = Conversion {
            input: workspace.input_path(),
            output_dir: workspace.output_dir(),
            options: &record.options,
            credential: credential.as_ref(),
        };

        let outcome = match timeout(self.deadline, self.converter.convert(request)).await {
            Ok(Ok(text)) => {
                info!(job = %id, bytes = text.len(), "conversion complete");
                record.complete(text)
            }
            Ok(Err(e)) => {
                let message = scrub(&e.to_string(), credential.as_ref());
                warn!(job = %id, error = %message, "conversion failed");
                record.fail(message)
            }
            Err(_) => {
                warn!(job = %id, deadline = ?self.deadline, "conversion deadline exceeded");
                record.fail(TIMEOUT_MESSAGE.to_string())
            }
        };

        // Persist the outcome before touching artifacts: a crash between
        // the two leaves stale files for the sweep, never a lost result.
        if let Err(e) = self.store.save(&outcome).await {
            error!(job = %id, error = %e, "failed to persist job outcome");
        }
        if let Err(e) = workspace.remove().await {
            warn!(job = %id, error = %e, "failed to remove job artifacts");
        }
    }
}

/// Replace any occurrence of the credential in collaborator output.
fn scrub(message: &str, credential: Option<&EnhancementCredential>) -> String {
    match credential {
        Some(c) if !c.expose().is_empty() => message.replace(c.expose(), "[redacted]"),
        _ => message.to_string(),
    }
}
