use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use vidferry::config::{FetcherConfig, StorageConfig};
use vidferry::cookies::CookieStore;
use vidferry::fetcher::{Backoff, Fetcher, Invocation, RunError, ToolOutput, ToolRunner};
use vidferry::pipeline::Pipeline;
use vidferry::service::JobService;
use vidferry::storage::{StorageClient, Uploader};
use vidferry::worker::{WorkerConfig, WorkerHandle};

/// Stands in for the downloader binary
///
/// URLs containing "bot" fail with the bot-detection message, URLs
/// containing "flaky" are rate limited on their first run. Everything else
/// lands as `<download_dir>/<last path segment>.mp4`.
#[derive(Default)]
struct FakeDownloader {
    download_dir: PathBuf,
    delay: Duration,
    calls: Mutex<Vec<String>>,
    runs_per_url: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeDownloader {
    fn new(download_dir: &Path) -> Self {
        Self {
            download_dir: download_dir.to_path_buf(),
            ..Default::default()
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn runs_for(&self, url: &str) -> usize {
        self.runs_per_url.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    fn output_path(&self, url: &str) -> PathBuf {
        let name = url.rsplit('/').next().unwrap_or("video");
        self.download_dir.join(format!("{name}.mp4"))
    }
}

#[async_trait]
impl ToolRunner for FakeDownloader {
    async fn run(&self, invocation: &Invocation) -> Result<ToolOutput, RunError> {
        let url = invocation.args.last().cloned().unwrap_or_default();

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(url.clone());
        let run = {
            let mut runs = self.runs_per_url.lock().unwrap();
            let run = runs.entry(url.clone()).or_insert(0);
            *run += 1;
            *run
        };

        tokio::time::sleep(self.delay).await;

        let output = if url.contains("bot") {
            ToolOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: "ERROR: [youtube] abc: Sign in to confirm you're not a bot".to_string(),
            }
        } else if url.contains("flaky") && run == 1 {
            ToolOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: "ERROR: HTTP Error 429: Too Many Requests".to_string(),
            }
        } else {
            let path = self.output_path(&url);
            std::fs::write(&path, b"fake mp4 payload").unwrap();
            ToolOutput {
                exit_code: Some(0),
                stdout: format!("[download] 100%\n{}\n", path.display()),
                stderr: String::new(),
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(output)
    }
}

struct Harness {
    _temp_dir: TempDir,
    downloader: Arc<FakeDownloader>,
    storage: Arc<StorageClient>,
    service: JobService,
    worker: WorkerHandle,
}

fn fetcher_config(temp_dir: &TempDir) -> FetcherConfig {
    FetcherConfig {
        download_dir: temp_dir.path().join("downloads"),
        cookies_path: temp_dir.path().join("cookies.txt"),
        ..FetcherConfig::default()
    }
}

fn harness_with(
    make_downloader: impl FnOnce(&Path) -> FakeDownloader,
    storage: StorageClient,
    worker_config: WorkerConfig,
) -> Harness {
    let temp_dir = TempDir::new().unwrap();
    let config = fetcher_config(&temp_dir);
    let downloader = Arc::new(make_downloader(&config.download_dir));
    let cookies = CookieStore::new(config.cookies_path.clone());

    let fetcher = Fetcher::new(config, cookies, downloader.clone(), Backoff::none());
    let storage = Arc::new(storage);
    let pipeline = Pipeline::new(Arc::new(fetcher), storage.clone());

    let (service, worker) = JobService::new(pipeline, worker_config);
    let worker = worker.spawn();

    Harness {
        _temp_dir: temp_dir,
        downloader,
        storage,
        service,
        worker,
    }
}

fn harness() -> Harness {
    harness_with(
        FakeDownloader::new,
        StorageClient::in_memory(),
        WorkerConfig::default(),
    )
}

async fn wait_until_drained(service: &JobService, total: u64) {
    for _ in 0..500 {
        let status = service.status();
        if status.total_completed + status.total_failed >= total
            && status.currently_processing.is_none()
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("queue did not drain {total} jobs");
}

#[tokio::test]
async fn bot_detection_fails_one_job_and_the_rest_complete() {
    let h = harness();
    let urls = vec![
        "https://youtu.be/first".to_string(),
        "https://youtu.be/bot".to_string(),
        "https://youtu.be/third".to_string(),
    ];

    let ack = h.service.enqueue_batch(&urls).unwrap();
    assert!(ack.queue_position <= 3);
    wait_until_drained(&h.service, 3).await;

    let status = h.service.status();
    assert_eq!(status.total_completed, 2);
    assert_eq!(status.total_failed, 1);
    assert_eq!(status.queue_size, 0);

    // terminal failure, no retries
    assert_eq!(h.downloader.runs_for("https://youtu.be/bot"), 1);

    assert!(h.storage.exists("first.mp4").await.unwrap());
    assert!(h.storage.exists("third.mp4").await.unwrap());
    assert!(!h.storage.exists("bot.mp4").await.unwrap());

    // uploaded files are cleaned up, the failed one never existed
    for name in ["first", "bot", "third"] {
        let local = h.downloader.output_path(&format!("https://youtu.be/{name}"));
        assert!(!local.exists(), "{} should not exist", local.display());
    }

    h.worker.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn jobs_run_in_submission_order_one_at_a_time() {
    let h = harness_with(
        |dir| FakeDownloader::new(dir).with_delay(Duration::from_millis(20)),
        StorageClient::in_memory(),
        WorkerConfig::default(),
    );
    let urls: Vec<String> = (0..5).map(|i| format!("https://youtu.be/v{i}")).collect();

    for url in &urls {
        h.service.enqueue(url).unwrap();
    }
    wait_until_drained(&h.service, 5).await;

    assert_eq!(h.downloader.calls(), urls);
    assert_eq!(h.downloader.max_in_flight.load(Ordering::SeqCst), 1);

    let status = h.service.status();
    assert_eq!(status.total_completed + status.total_failed, 5);

    h.worker.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn synchronous_download_waits_for_the_worker() {
    let h = harness_with(
        |dir| FakeDownloader::new(dir).with_delay(Duration::from_millis(50)),
        StorageClient::in_memory(),
        WorkerConfig::default(),
    );

    h.service
        .enqueue_batch(&["https://youtu.be/q1".to_string(), "https://youtu.be/q2".to_string()])
        .unwrap();
    let outcome = h.service.process_now("https://youtu.be/direct").await;
    wait_until_drained(&h.service, 2).await;

    assert!(outcome.success, "{outcome:?}");
    assert_eq!(h.downloader.max_in_flight.load(Ordering::SeqCst), 1);
    assert!(h.storage.exists("direct.mp4").await.unwrap());

    // the synchronous path does not touch the queue counters
    let status = h.service.status();
    assert_eq!(status.total_completed, 2);

    h.worker.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn rate_limited_attempt_is_retried() {
    let h = harness();

    h.service.enqueue("https://youtu.be/flaky").unwrap();
    wait_until_drained(&h.service, 1).await;

    assert_eq!(h.service.status().total_completed, 1);
    assert_eq!(h.downloader.runs_for("https://youtu.be/flaky"), 2);

    h.worker.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn upload_failure_keeps_the_local_file() {
    let unconfigured = StorageClient::from_config(&StorageConfig::default()).unwrap();
    let h = harness_with(FakeDownloader::new, unconfigured, WorkerConfig::default());

    h.service.enqueue("https://youtu.be/kept").unwrap();
    wait_until_drained(&h.service, 1).await;

    let status = h.service.status();
    assert_eq!(status.total_failed, 1);
    assert_eq!(status.total_completed, 0);
    assert!(h.downloader.output_path("https://youtu.be/kept").exists());

    h.worker.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn keep_local_worker_leaves_files_behind() {
    let h = harness_with(
        FakeDownloader::new,
        StorageClient::in_memory(),
        WorkerConfig { keep_local: true },
    );

    h.service.enqueue("https://youtu.be/archive").unwrap();
    wait_until_drained(&h.service, 1).await;

    assert!(h.downloader.output_path("https://youtu.be/archive").exists());
    assert!(h.storage.exists("archive.mp4").await.unwrap());

    h.worker.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn cancelled_worker_stops_taking_jobs() {
    let h = harness();

    h.worker.cancel();
    for _ in 0..100 {
        if !h.worker.is_alive() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!h.worker.is_alive());
    assert!(!h.service.status().worker_alive);

    // the receiver is gone with the worker
    assert!(h.service.enqueue("https://youtu.be/late").is_err());
    assert!(h.downloader.calls().is_empty());
}

#[tokio::test]
async fn missing_cookies_do_not_block_downloads() {
    let h = harness();

    let outcome = h.service.process_now("https://youtu.be/anon").await;

    assert!(outcome.success, "{outcome:?}");
    h.worker.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn uploads_through_the_uploader_trait_use_the_basename() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("clip.mp4");
    std::fs::write(&path, b"clip").unwrap();

    let storage = StorageClient::in_memory();
    let uploader: &dyn Uploader = &storage;
    let metadata = uploader.upload(&path, None).await.unwrap();

    assert_eq!(metadata.key, "clip.mp4");
    assert_eq!(metadata.size, 4);
}
