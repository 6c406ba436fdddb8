//! In-process FIFO job queue
//!
//! Architecture:
//! 1. API handlers call `queue.enqueue(url)` on a cloned [`JobQueue`]
//! 2. The job goes onto an unbounded mpsc channel (never blocks the caller)
//! 3. The single worker owns the [`JobReceiver`] and pulls jobs in order
//!
//! Depth is tracked next to the channel so status reporting can read it
//! from any side. Nothing is persisted: pending jobs die with the process.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Job queue is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, QueueError>;

/// One submitted URL
#[derive(Debug, Clone)]
pub struct Job {
    pub url: String,
    pub enqueued_at: DateTime<Utc>,
}

impl Job {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            enqueued_at: Utc::now(),
        }
    }
}

/// Sending half of the queue, cheap to clone
#[derive(Debug, Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<Job>,
    depth: Arc<AtomicUsize>,
}

/// Receiving half of the queue, owned by the worker
#[derive(Debug)]
pub struct JobReceiver {
    rx: mpsc::UnboundedReceiver<Job>,
    depth: Arc<AtomicUsize>,
}

/// Create a connected queue pair
pub fn channel() -> (JobQueue, JobReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));

    (
        JobQueue {
            tx,
            depth: depth.clone(),
        },
        JobReceiver { rx, depth },
    )
}

impl JobQueue {
    /// Append `url` to the tail and return the queue depth after insertion
    pub fn enqueue(&self, url: impl Into<String>) -> Result<usize> {
        let job = Job::new(url);

        // Count before sending so the worker can never decrement below zero
        let depth = self.depth.fetch_add(1, Ordering::AcqRel) + 1;

        if self.tx.send(job).is_err() {
            self.depth.fetch_sub(1, Ordering::AcqRel);
            return Err(QueueError::Closed);
        }

        debug!(depth, "Job appended to queue");
        Ok(depth)
    }

    /// Append every URL in order and return the depth after the last one
    pub fn enqueue_batch<I, S>(&self, urls: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut depth = self.len();
        for url in urls {
            depth = self.enqueue(url)?;
        }
        Ok(depth)
    }

    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl JobReceiver {
    /// Wait for the next job; `None` once every [`JobQueue`] is dropped
    pub async fn recv(&mut self) -> Option<Job> {
        let job = self.rx.recv().await?;
        self.depth.fetch_sub(1, Ordering::AcqRel);
        Some(job)
    }

    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
