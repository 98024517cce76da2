//! Error types for the markerd library.
//!
//! Two distinct error types reflect two distinct failure domains:
//!
//! * [`ConvertError`] — the external conversion collaborator failed for one
//!   job (could not spawn, exited non-zero, produced no usable output).
//!   Recovered locally by the runner and turned into a terminal `error`
//!   job record; never surfaced through Submit.
//!
//! * [`StoreError`] — the job store itself misbehaved. Fatal for the
//!   affected operation: a store failure must never be papered over by
//!   fabricating a terminal job state.
//!
//! HTTP-boundary errors live separately in [`crate::server::error`] because
//! they carry status-code semantics the library core does not care about.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Failures reported by the conversion collaborator for a single job.
///
/// All variants end up summarised into the job record's `error_message`;
/// keep the Display output short and free of anything sensitive.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The collaborator process could not be started at all.
    #[error("failed to spawn '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The collaborator ran but reported failure.
    #[error("conversion failed ({status}): {detail}")]
    Failed { status: String, detail: String },

    /// The collaborator claimed success but produced no readable output
    /// of the requested format.
    #[error("no {format} output produced")]
    MissingOutput { format: String },

    /// An output file exists but could not be read back.
    #[error("failed to read output '{path}': {source}")]
    OutputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of the job store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with this id already exists. Practically unreachable with
    /// random ids; surfaced so callers never silently overwrite a job.
    #[error("job {0} already exists")]
    DuplicateId(Uuid),

    /// The backing store is unreachable or an I/O operation failed.
    #[error("job store unavailable during {op}: {source}")]
    Unavailable {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A persisted record exists but cannot be decoded.
    #[error("corrupt job record at '{path}': {detail}")]
    Corrupt { path: PathBuf, detail: String },
}
