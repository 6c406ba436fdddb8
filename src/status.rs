//! Process-wide processing status
//!
//! Single-writer: only the worker mutates (the mutators are crate-private),
//! any thread may take a [`StatusSnapshot`]. Fields are updated independently,
//! so a snapshot can mix values from before and after a transition.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

#[derive(Debug, Clone)]
struct CurrentJob {
    url: String,
    started_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct ProcessingStatus {
    current: RwLock<Option<CurrentJob>>,
    queue_size: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
    worker_alive: AtomicBool,
}

impl ProcessingStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn worker_started(&self) {
        self.worker_alive.store(true, Ordering::Release);
    }

    pub(crate) fn worker_stopped(&self) {
        self.worker_alive.store(false, Ordering::Release);
    }

    /// Publish `url` as the job in flight
    pub(crate) fn begin(&self, url: &str, queue_size: usize) {
        let job = CurrentJob {
            url: url.to_string(),
            started_at: Utc::now(),
        };
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Some(job);
        self.queue_size.store(queue_size, Ordering::Relaxed);
    }

    /// Record the outcome of the job in flight and clear it
    pub(crate) fn finish(&self, success: bool, queue_size: usize) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = None;
        self.queue_size.store(queue_size, Ordering::Relaxed);

        if success {
            self.completed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(counter = "completed", "Status counter incremented");
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(counter = "failed", "Status counter incremented");
        }
    }

    pub fn current(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|job| job.url.clone())
    }

    pub fn worker_alive(&self) -> bool {
        self.worker_alive.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let current = self
            .current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        StatusSnapshot {
            current: current.as_ref().map(|job| job.url.clone()),
            current_since: current.map(|job| job.started_at),
            queue_size: self.queue_size.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ProcessingStatus`]
///
/// `queue_size` is the value cached by the worker at its last transition.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub current: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_since: Option<DateTime<Utc>>,
    pub queue_size: usize,
    pub completed: u64,
    pub failed: u64,
}
