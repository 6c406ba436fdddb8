//! Video fetching through the external downloader
//!
//! The downloader is treated as an opaque process: [`Invocation`] describes
//! what to run, a [`ToolRunner`] runs it, and [`classify`] turns its stderr
//! into a retry decision. [`Fetcher`] owns the outer retry loop.

mod backoff;
mod classify;
mod invocation;
mod process;

pub use backoff::Backoff;
pub use classify::{FailureClass, classify};
pub use process::{Invocation, RunError, Subprocess, ToolOutput, ToolRunner};

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{Config, FetcherConfig};
use crate::cookies::CookieStore;

/// Longest stderr excerpt copied into log lines
const STDERR_LOG_LIMIT: usize = 500;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Bot detection triggered on attempt {attempt}, valid cookies required")]
    BotDetected { attempt: u32 },

    #[error("All {attempts} download attempts failed")]
    Exhausted { attempts: u32 },

    #[error("Download directory unavailable: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Something that turns a URL into a local file
#[async_trait]
pub trait VideoFetcher: Send + Sync {
    async fn fetch(&self, url: &str, use_cookies: bool) -> Result<PathBuf>;
}

/// Why a single attempt did not yield a file
#[derive(Debug)]
enum AttemptFailure {
    TimedOut,
    Spawn,
    Exit { class: FailureClass },
    MissingFile,
}

impl AttemptFailure {
    fn class(&self) -> FailureClass {
        match self {
            AttemptFailure::Exit { class } => *class,
            _ => FailureClass::Unknown,
        }
    }
}

/// Whether `binary` resolves to an executable on `PATH` (or is a path to one)
pub fn tool_installed(binary: &str) -> bool {
    which::which(binary).is_ok()
}

/// Outer retry loop around the downloader
pub struct Fetcher {
    config: FetcherConfig,
    cookies: CookieStore,
    runner: Arc<dyn ToolRunner>,
    backoff: Backoff,
    attempt_timeout: Duration,
}

impl Fetcher {
    pub fn new(
        config: FetcherConfig,
        cookies: CookieStore,
        runner: Arc<dyn ToolRunner>,
        backoff: Backoff,
    ) -> Self {
        let attempt_timeout = config.attempt_timeout();
        Self {
            config,
            cookies,
            runner,
            backoff,
            attempt_timeout,
        }
    }

    /// Fetcher running the real downloader with configured pacing
    pub fn from_config(config: &Config, cookies: CookieStore) -> Self {
        Self::new(
            config.fetcher.clone(),
            cookies,
            Arc::new(Subprocess),
            Backoff::from(&config.pacing),
        )
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Whether the downloader binary can be found
    pub fn tool_available(&self) -> bool {
        tool_installed(&self.config.binary)
    }

    /// Download `url`, making up to `max_retries` attempts
    ///
    /// Bot detection ends the loop at once. Any other failure (non-zero exit,
    /// spawn error, timeout, or a reported file that does not exist) waits for
    /// the backoff delay and tries again.
    pub async fn fetch_with_retries(
        &self,
        url: &str,
        use_cookies: bool,
        max_retries: u32,
    ) -> Result<PathBuf> {
        info!(url, "Starting download");

        tokio::fs::create_dir_all(&self.config.download_dir).await?;

        let cookies = if use_cookies && self.cookies.exists() {
            info!(path = %self.cookies.path().display(), "Using cookies for authentication");
            Some(self.cookies.path())
        } else {
            warn!("No cookies found - download may fail for some videos");
            None
        };

        let invocation = Invocation::build(&self.config, url, cookies);

        for attempt in 1..=max_retries {
            info!(url, attempt, max_retries, "Download attempt");

            let failure = match self.attempt(&invocation, attempt).await {
                Ok(path) => return Ok(path),
                Err(failure) => failure,
            };

            if failure.class().is_terminal() {
                error!(url, attempt, "Bot detection triggered - need valid cookies");
                return Err(FetchError::BotDetected { attempt });
            }

            if attempt < max_retries {
                let delay = self.backoff.delay_after(attempt, failure.class());
                info!(
                    url,
                    attempt,
                    delay_secs = delay.as_secs_f64(),
                    "Waiting before next attempt"
                );
                tokio::time::sleep(delay).await;
            }
        }

        error!(url, attempts = max_retries, "All download attempts failed");
        Err(FetchError::Exhausted {
            attempts: max_retries,
        })
    }

    async fn attempt(
        &self,
        invocation: &Invocation,
        attempt: u32,
    ) -> std::result::Result<PathBuf, AttemptFailure> {
        let output = match tokio::time::timeout(self.attempt_timeout, self.runner.run(invocation))
            .await
        {
            Err(_) => {
                error!(
                    attempt,
                    timeout_secs = self.attempt_timeout.as_secs(),
                    "Attempt timed out"
                );
                return Err(AttemptFailure::TimedOut);
            }
            Ok(Err(e)) => {
                error!(attempt, error = %e, "Attempt could not start");
                return Err(AttemptFailure::Spawn);
            }
            Ok(Ok(output)) => output,
        };

        if !output.success() {
            let class = classify(&output.stderr);
            error!(
                attempt,
                exit_code = ?output.exit_code,
                class = ?class,
                stderr = output.stderr_excerpt(STDERR_LOG_LIMIT),
                "Attempt failed"
            );
            if class == FailureClass::Transient {
                error!(attempt, "Tool was rate limited or blocked");
            }
            return Err(AttemptFailure::Exit { class });
        }

        match output.reported_path() {
            Some(path) => {
                let size = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
                info!(path = %path.display(), size, "Downloaded successfully");
                Ok(path)
            }
            None => {
                warn!(attempt, "Download completed but file not found");
                Err(AttemptFailure::MissingFile)
            }
        }
    }
}

#[async_trait]
impl VideoFetcher for Fetcher {
    async fn fetch(&self, url: &str, use_cookies: bool) -> Result<PathBuf> {
        self.fetch_with_retries(url, use_cookies, self.config.max_retries)
            .await
    }
}
