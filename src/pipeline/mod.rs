//! Fetch → upload → cleanup for one URL
//!
//! [`Pipeline::process`] never fails and never panics past its boundary:
//! every outcome, including a panic inside a collaborator, comes back as an
//! [`Outcome`]. Pipelines are serialized by an internal gate, so at most one
//! runs at any instant no matter how many callers share the pipeline.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::fetcher::{FetchError, VideoFetcher};
use crate::storage::{StorageError, Uploader};

/// Step failures; the messages are what callers see
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Download failed")]
    Download(#[source] FetchError),

    #[error("Upload failed")]
    Upload(#[source] StorageError),
}

/// Result pair of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
}

impl Outcome {
    fn succeeded(elapsed: Duration) -> Self {
        Self {
            success: true,
            message: format!("Success in {:.1}s", elapsed.as_secs_f64()),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Clone)]
pub struct Pipeline {
    fetcher: Arc<dyn VideoFetcher>,
    uploader: Arc<dyn Uploader>,
    gate: Arc<Mutex<()>>,
}

impl Pipeline {
    pub fn new(fetcher: Arc<dyn VideoFetcher>, uploader: Arc<dyn Uploader>) -> Self {
        Self {
            fetcher,
            uploader,
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// Run the full pipeline for `url`
    ///
    /// The steps run on their own task so that a panic in the fetcher or
    /// uploader is contained and reported as a failed outcome. The gate turn
    /// moves into that task: a started pipeline runs to completion and keeps
    /// the gate even if the caller stops waiting for it.
    pub async fn process(&self, url: &str, keep_local: bool) -> Outcome {
        let turn = self.gate.clone().lock_owned().await;

        info!(url, "Processing");

        let fetcher = self.fetcher.clone();
        let uploader = self.uploader.clone();
        let owned_url = url.to_string();
        let run = tokio::spawn(async move {
            let _turn = turn;
            run_steps(fetcher.as_ref(), uploader.as_ref(), &owned_url, keep_local).await
        });

        match run.await {
            Ok(Ok(elapsed)) => {
                info!(
                    url,
                    elapsed_secs = elapsed.as_secs_f64(),
                    "Successfully processed"
                );
                Outcome::succeeded(elapsed)
            }
            Ok(Err(e)) => {
                let cause = std::error::Error::source(&e).map(ToString::to_string);
                error!(url, error = %e, cause = ?cause, "Process failed");
                Outcome::failed(e.to_string())
            }
            Err(join_error) => {
                let message = panic_message(join_error);
                error!(url, error = %message, "Process failed unexpectedly");
                Outcome::failed(message)
            }
        }
    }
}

async fn run_steps(
    fetcher: &dyn VideoFetcher,
    uploader: &dyn Uploader,
    url: &str,
    keep_local: bool,
) -> Result<Duration, PipelineError> {
    let started = Instant::now();

    let path: PathBuf = fetcher
        .fetch(url, true)
        .await
        .map_err(PipelineError::Download)?;

    // On upload failure the local file stays for a later retry
    uploader
        .upload(&path, None)
        .await
        .map_err(PipelineError::Upload)?;

    if keep_local {
        info!(path = %path.display(), "Keeping local file");
    } else {
        cleanup_local_file(&path).await;
    }

    Ok(started.elapsed())
}

/// Delete a local file; failures are logged only
async fn cleanup_local_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => info!(path = %path.display(), "Deleted local file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Could not delete file"),
    }
}

fn panic_message(join_error: tokio::task::JoinError) -> String {
    if !join_error.is_panic() {
        return join_error.to_string();
    }

    let payload = join_error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "pipeline panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{StorageClient, UploadMetadata};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Writes a file into `dir` and returns it
    struct DiskFetcher {
        dir: PathBuf,
    }

    #[async_trait]
    impl VideoFetcher for DiskFetcher {
        async fn fetch(&self, url: &str, _use_cookies: bool) -> crate::fetcher::Result<PathBuf> {
            let name = url.rsplit('/').next().unwrap_or("video");
            let path = self.dir.join(format!("{name}.mp4"));
            tokio::fs::write(&path, b"video").await?;
            Ok(path)
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl VideoFetcher for FailingFetcher {
        async fn fetch(&self, _url: &str, _use_cookies: bool) -> crate::fetcher::Result<PathBuf> {
            Err(FetchError::BotDetected { attempt: 1 })
        }
    }

    struct PanickingFetcher;

    #[async_trait]
    impl VideoFetcher for PanickingFetcher {
        async fn fetch(&self, _url: &str, _use_cookies: bool) -> crate::fetcher::Result<PathBuf> {
            panic!("fetcher exploded")
        }
    }

    #[derive(Default)]
    struct RejectingUploader {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Uploader for RejectingUploader {
        async fn upload(
            &self,
            _path: &Path,
            _remote_name: Option<&str>,
        ) -> crate::storage::Result<UploadMetadata> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::UploadFailed("quota exceeded".to_string()))
        }
    }

    #[tokio::test]
    async fn test_success_removes_local_file() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(StorageClient::in_memory());
        let pipeline = Pipeline::new(
            Arc::new(DiskFetcher {
                dir: temp_dir.path().to_path_buf(),
            }),
            storage.clone(),
        );

        let outcome = pipeline.process("https://youtu.be/abc", false).await;

        assert!(outcome.success, "{outcome:?}");
        assert!(outcome.message.starts_with("Success in "));
        assert!(outcome.message.ends_with('s'));
        assert!(!temp_dir.path().join("abc.mp4").exists());
        assert!(storage.exists("abc.mp4").await.unwrap());
    }

    #[tokio::test]
    async fn test_keep_local_leaves_file() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(
            Arc::new(DiskFetcher {
                dir: temp_dir.path().to_path_buf(),
            }),
            Arc::new(StorageClient::in_memory()),
        );

        let outcome = pipeline.process("https://youtu.be/keep", true).await;

        assert!(outcome.success);
        assert!(temp_dir.path().join("keep.mp4").exists());
    }

    #[tokio::test]
    async fn test_download_failure_skips_upload() {
        let uploader = Arc::new(RejectingUploader::default());
        let pipeline = Pipeline::new(Arc::new(FailingFetcher), uploader.clone());

        let outcome = pipeline.process("https://youtu.be/bot", false).await;

        assert_eq!(outcome, Outcome::failed("Download failed"));
        assert_eq!(uploader.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_upload_failure_keeps_local_file() {
        let temp_dir = TempDir::new().unwrap();
        let uploader = Arc::new(RejectingUploader::default());
        let pipeline = Pipeline::new(
            Arc::new(DiskFetcher {
                dir: temp_dir.path().to_path_buf(),
            }),
            uploader.clone(),
        );

        let outcome = pipeline.process("https://youtu.be/stuck", false).await;

        assert_eq!(outcome, Outcome::failed("Upload failed"));
        assert_eq!(uploader.calls.load(Ordering::SeqCst), 1);
        assert!(temp_dir.path().join("stuck.mp4").exists());
    }

    #[tokio::test]
    async fn test_unconfigured_storage_reports_upload_failure() {
        let temp_dir = TempDir::new().unwrap();
        let storage =
            StorageClient::from_config(&crate::config::StorageConfig::default()).unwrap();
        let pipeline = Pipeline::new(
            Arc::new(DiskFetcher {
                dir: temp_dir.path().to_path_buf(),
            }),
            Arc::new(storage),
        );

        let outcome = pipeline.process("https://youtu.be/nocreds", false).await;

        assert_eq!(outcome, Outcome::failed("Upload failed"));
        assert!(temp_dir.path().join("nocreds.mp4").exists());
    }

    #[tokio::test]
    async fn test_panic_becomes_failed_outcome() {
        let pipeline = Pipeline::new(
            Arc::new(PanickingFetcher),
            Arc::new(StorageClient::in_memory()),
        );

        let outcome = pipeline.process("https://youtu.be/boom", false).await;
        assert_eq!(outcome, Outcome::failed("fetcher exploded"));

        // the gate is released after a panic
        let again = pipeline.process("https://youtu.be/boom", false).await;
        assert!(!again.success);
    }

    /// Sleeps before writing its file, tracks overlapping fetches
    #[derive(Default)]
    struct SlowFetcher {
        dir: PathBuf,
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl VideoFetcher for SlowFetcher {
        async fn fetch(&self, url: &str, _use_cookies: bool) -> crate::fetcher::Result<PathBuf> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let name = url.rsplit('/').next().unwrap_or("video");
            let path = self.dir.join(format!("{name}.mp4"));
            tokio::fs::write(&path, b"video").await?;
            Ok(path)
        }
    }

    #[tokio::test]
    async fn test_abandoned_caller_keeps_the_gate_until_work_ends() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = Arc::new(SlowFetcher {
            dir: temp_dir.path().to_path_buf(),
            delay: Duration::from_millis(300),
            ..Default::default()
        });
        let storage = Arc::new(StorageClient::in_memory());
        let pipeline = Pipeline::new(fetcher.clone(), storage.clone());

        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            pipeline.process("https://youtu.be/first", false),
        )
        .await;
        assert!(abandoned.is_err());

        let outcome = pipeline.process("https://youtu.be/second", false).await;

        assert!(outcome.success, "{outcome:?}");
        assert_eq!(fetcher.max_in_flight.load(Ordering::SeqCst), 1);
        // the abandoned run still finished its upload
        assert!(storage.exists("first.mp4").await.unwrap());
        assert!(storage.exists("second.mp4").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_file_on_cleanup_is_not_an_error() {
        let temp_dir = TempDir::new().unwrap();
        cleanup_local_file(&temp_dir.path().join("already-gone.mp4")).await;
    }
}
