//! Core operations shared by the HTTP facade and the CLI

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::pipeline::{Outcome, Pipeline};
use crate::queue::{self, JobQueue, QueueError};
use crate::status::{ProcessingStatus, StatusSnapshot};
use crate::worker::{Worker, WorkerConfig};

/// Acknowledgement of a queued submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Enqueued {
    /// Queue depth right after insertion
    pub queue_position: usize,
    pub currently_processing: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub currently_processing: Option<String>,
    pub queue_size: usize,
    pub total_completed: u64,
    pub total_failed: u64,
    pub worker_alive: bool,
    pub started_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct JobService {
    queue: JobQueue,
    status: Arc<ProcessingStatus>,
    pipeline: Pipeline,
    started_at: DateTime<Utc>,
}

impl JobService {
    /// Create the service and the worker that drains its queue
    ///
    /// The worker is returned unstarted; call [`Worker::spawn`] to run it.
    pub fn new(pipeline: Pipeline, config: WorkerConfig) -> (Self, Worker) {
        let (queue, receiver) = queue::channel();
        let status = Arc::new(ProcessingStatus::new());
        let worker = Worker::new(receiver, pipeline.clone(), status.clone(), config);

        let service = Self {
            queue,
            status,
            pipeline,
            started_at: Utc::now(),
        };
        (service, worker)
    }

    pub fn enqueue(&self, url: &str) -> Result<Enqueued, QueueError> {
        let queue_position = self.queue.enqueue(url)?;
        info!(url, queue_position, "Added to queue");

        Ok(Enqueued {
            queue_position,
            currently_processing: self.status.current(),
        })
    }

    pub fn enqueue_batch(&self, urls: &[String]) -> Result<Enqueued, QueueError> {
        let queue_position = self.queue.enqueue_batch(urls.iter().map(String::as_str))?;
        info!(count = urls.len(), queue_position, "Added batch to queue");

        Ok(Enqueued {
            queue_position,
            currently_processing: self.status.current(),
        })
    }

    pub fn status(&self) -> ServiceStatus {
        let snapshot = self.status.snapshot();

        ServiceStatus {
            currently_processing: snapshot.current,
            queue_size: self.queue.len(),
            total_completed: snapshot.completed,
            total_failed: snapshot.failed,
            worker_alive: self.status.worker_alive(),
            started_at: self.started_at,
        }
    }

    /// Run a pipeline for `url` right away, outside the queue
    ///
    /// Waits for any pipeline already in flight. The downloaded file is
    /// always removed after a successful upload.
    pub async fn process_now(&self, url: &str) -> Outcome {
        self.pipeline.process(url, false).await
    }

    /// Raw status as the worker last published it
    pub fn snapshot(&self) -> StatusSnapshot {
        self.status.snapshot()
    }

    pub fn queue_size(&self) -> usize {
        self.queue.len()
    }

    pub fn worker_alive(&self) -> bool {
        self.status.worker_alive()
    }
}
