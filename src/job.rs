//! The job record and its state machine.
//!
//! One [`JobRecord`] exists per submitted conversion. The state machine is
//! deliberately tiny:
//!
//! ```text
//! processing ──▶ complete   (terminal)
//!       └──────▶ error      (terminal)
//! ```
//!
//! Terminal states carry exactly one payload — `result` for `complete`,
//! `error_message` for `error` — and no transition ever leaves a terminal
//! state. The transition methods ([`JobRecord::complete`],
//! [`JobRecord::fail`]) are the only way to reach one, which keeps the
//! payload/status pairing impossible to get wrong at call sites.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::options::ConvertOptions;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Submitted; the conversion has not reported back yet.
    Processing,
    /// Conversion succeeded; `result` holds the produced text.
    Complete,
    /// Conversion failed; `error_message` holds a short diagnostic.
    Error,
}

impl JobStatus {
    /// Whether this status admits no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }
}

/// One submitted unit of conversion work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Opaque unique identifier, generated at submission, never reused.
    pub id: Uuid,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Path of the uploaded source document; owned by this job until cleanup.
    pub input_ref: PathBuf,
    /// Immutable snapshot of the caller's options (credential excluded).
    pub options: ConvertOptions,
    /// Produced text; present iff `status == Complete`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Short failure diagnostic; present iff `status == Error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Submission time, used by the retention sweep.
    pub created_at: DateTime<Utc>,
}

impl JobRecord {
    /// Create a fresh `processing` record.
    pub fn new(id: Uuid, input_ref: PathBuf, options: ConvertOptions) -> Self {
        Self {
            id,
            status: JobStatus::Processing,
            input_ref,
            options,
            result: None,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    /// Transition to `complete` with the produced text.
    pub fn complete(mut self, result: String) -> Self {
        self.status = JobStatus::Complete;
        self.result = Some(result);
        self.error_message = None;
        self
    }

    /// Transition to `error` with a short, non-sensitive diagnostic.
    pub fn fail(mut self, error_message: String) -> Self {
        self.status = JobStatus::Error;
        self.error_message = Some(error_message);
        self.result = None;
        self
    }

    /// Whether the record has outlived `cutoff` (retention sweep input).
    pub fn created_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.created_at < cutoff
    }
}

/// The wire shape returned by the poll endpoint.
///
/// `processing` carries nothing; terminal states carry exactly one of
/// `result` or `error`.
#[derive(Debug, Serialize)]
pub struct StatusView {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusView {
    /// View for a still-running job.
    pub fn processing() -> Self {
        Self {
            status: JobStatus::Processing,
            result: None,
            error: None,
        }
    }
}

impl From<JobRecord> for StatusView {
    fn from(record: JobRecord) -> Self {
        Self {
            status: record.status,
            result: record.result,
            error: record.error_message,
        }
    }
}
