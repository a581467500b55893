//! Job records and the request store.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use serde::Serialize;

/// Lifecycle status of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Stored, no stream opened yet
    Created,
    /// A stream is generating styles
    Processing,
    /// All styles done
    Completed,
    /// Ended by an upstream failure
    Error,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Created => write!(f, "created"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Error => write!(f, "error"),
        }
    }
}

/// One create-to-completion unit of rephrase work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Request id
    pub id: String,
    /// Source text
    pub text: String,
    /// Styles in emission order
    pub styles: Vec<String>,
    /// Current status
    pub status: JobStatus,
}

impl Job {
    /// New job in the `created` state
    pub fn new(id: impl Into<String>, text: impl Into<String>, styles: Vec<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            styles,
            status: JobStatus::Created,
        }
    }
}

/// Request id to job mapping.
///
/// Every operation touches a single id. Implementations must keep entries for
/// different ids independent under concurrent access.
pub trait RequestStore: Send + Sync {
    /// Snapshot of the job
    fn get(&self, id: &str) -> Option<Job>;

    /// Insert or replace a job
    fn put(&self, job: Job);

    /// Remove a job, returning it if present
    fn remove(&self, id: &str) -> Option<Job>;

    /// Update the status of an existing job. Returns `false` if absent.
    fn set_status(&self, id: &str, status: JobStatus) -> bool;

    /// Number of stored jobs
    fn len(&self) -> usize;

    /// Whether a job is stored under `id`
    fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Whether the store is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-memory store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl RequestStore for InMemoryStore {
    fn get(&self, id: &str) -> Option<Job> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn put(&self, job: Job) {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job.id.clone(), job);
    }

    fn remove(&self, id: &str) -> Option<Job> {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    fn set_status(&self, id: &str, status: JobStatus) -> bool {
        match self
            .jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(id)
        {
            Some(job) => {
                job.status = status;
                true
            },
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn contains(&self, id: &str) -> bool {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }
}
