//! Background worker
//!
//! A single task drains the [`JobReceiver`] in FIFO order and runs one
//! pipeline at a time. Cancellation is observed only between jobs. Aborting the
//! loop after the shutdown grace period stops it from taking further jobs; the
//! pipeline already in flight still runs to completion and holds the gate.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::pipeline::Pipeline;
use crate::queue::{Job, JobReceiver};
use crate::status::ProcessingStatus;

/// Worker configuration
#[derive(Debug, Clone, Default)]
pub struct WorkerConfig {
    /// Keep downloaded files after a successful upload
    pub keep_local: bool,
}

pub struct Worker {
    receiver: JobReceiver,
    pipeline: Pipeline,
    status: Arc<ProcessingStatus>,
    config: WorkerConfig,
    cancel: CancellationToken,
}

impl Worker {
    pub fn new(
        receiver: JobReceiver,
        pipeline: Pipeline,
        status: Arc<ProcessingStatus>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            receiver,
            pipeline,
            status,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Start the loop on its own task
    pub fn spawn(self) -> WorkerHandle {
        let cancel = self.cancel.clone();
        let status = self.status.clone();

        // Alive from the moment the handle exists, not from the first poll
        status.worker_started();
        let task = tokio::spawn(self.run());

        WorkerHandle {
            cancel,
            status,
            task,
        }
    }

    async fn run(mut self) {
        info!(keep_local = self.config.keep_local, "Worker started");

        loop {
            let job = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("Worker cancelled");
                    break;
                }
                job = self.receiver.recv() => match job {
                    Some(job) => job,
                    None => {
                        info!("Queue closed");
                        break;
                    }
                },
            };

            self.handle(job).await;
        }

        self.status.worker_stopped();
        info!("Worker stopped");
    }

    async fn handle(&self, job: Job) {
        let waited = chrono::Utc::now() - job.enqueued_at;
        self.status.begin(&job.url, self.receiver.len());
        info!(
            url = %job.url,
            queued_ms = waited.num_milliseconds(),
            remaining = self.receiver.len(),
            "Job started"
        );

        let outcome = self.pipeline.process(&job.url, self.config.keep_local).await;

        if outcome.success {
            info!(url = %job.url, message = %outcome.message, "Job completed");
        } else {
            error!(url = %job.url, message = %outcome.message, "Job failed");
        }

        self.status.finish(outcome.success, self.receiver.len());
    }
}

/// Control side of a spawned [`Worker`]
pub struct WorkerHandle {
    cancel: CancellationToken,
    status: Arc<ProcessingStatus>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Ask the worker to stop after the job in flight
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_alive(&self) -> bool {
        !self.task.is_finished() && self.status.worker_alive()
    }

    /// Cancel and wait up to `grace` for the job in flight, then abort the loop
    pub async fn shutdown(mut self, grace: Duration) {
        self.cancel();

        match tokio::time::timeout(grace, &mut self.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Worker task failed"),
            Err(_) => {
                warn!(
                    grace_secs = grace.as_secs_f64(),
                    "Worker did not stop in time, aborting"
                );
                self.task.abort();
                let _ = (&mut self.task).await;
                self.status.worker_stopped();
            }
        }
    }
}
