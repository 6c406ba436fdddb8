use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Upper bound for request bodies (cookie uploads are the largest)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// How long shutdown waits for the in-flight job before aborting it
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_body_bytes: default_max_body_bytes(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl ServerConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 10000))
}

fn default_max_body_bytes() -> usize {
    1024 * 1024 // 1 MB
}

fn default_shutdown_grace_secs() -> u64 {
    5
}

/// S3-compatible object storage configuration
///
/// `endpoint`, `bucket`, `access_key` and `secret_key` are all required for
/// uploads. A missing value does not fail startup: the uploader refuses
/// every upload instead, and `/health` reports storage as unconfigured.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
    /// Access key (loaded from environment, not from config file)
    #[serde(skip)]
    pub access_key: Option<String>,
    /// Secret key (loaded from environment, not from config file)
    #[serde(skip)]
    pub secret_key: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    /// Optional prefix prepended to every object key
    pub key_prefix: Option<String>,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default = "default_part_size")]
    pub part_size: usize,
    #[serde(default = "default_upload_timeout_secs")]
    pub upload_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            bucket: None,
            access_key: None,
            secret_key: None,
            region: default_region(),
            key_prefix: None,
            content_type: default_content_type(),
            part_size: default_part_size(),
            upload_timeout_secs: default_upload_timeout_secs(),
        }
    }
}

impl StorageConfig {
    /// Names of the required settings that are absent
    pub fn missing_settings(&self) -> Vec<&'static str> {
        let required = [
            ("endpoint", &self.endpoint),
            ("access_key", &self.access_key),
            ("secret_key", &self.secret_key),
            ("bucket", &self.bucket),
        ];

        required
            .into_iter()
            .filter(|(_, value)| value.as_deref().is_none_or(str::is_empty))
            .map(|(name, _)| name)
            .collect()
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }
}

fn default_region() -> String {
    "auto".to_string()
}

fn default_content_type() -> String {
    "video/mp4".to_string()
}

fn default_part_size() -> usize {
    8 * 1024 * 1024 // 8 MB
}

fn default_upload_timeout_secs() -> u64 {
    30 * 60
}

/// External downloader invocation settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetcherConfig {
    #[serde(default = "default_binary")]
    pub binary: String,
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    #[serde(default = "default_cookies_path")]
    pub cookies_path: PathBuf,
    /// Outer attempts (the tool has its own internal retry counts below)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_merge_format")]
    pub merge_format: String,
    #[serde(default = "default_title_max_len")]
    pub title_max_len: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_referer")]
    pub referer: String,
    #[serde(default = "default_rate_limit")]
    pub rate_limit: String,
    #[serde(default = "default_sleep_interval")]
    pub sleep_interval: u32,
    #[serde(default = "default_max_sleep_interval")]
    pub max_sleep_interval: u32,
    #[serde(default = "default_socket_timeout")]
    pub socket_timeout: u32,
    #[serde(default = "default_tool_retries")]
    pub tool_retries: u32,
    #[serde(default = "default_tool_retries")]
    pub fragment_retries: u32,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            download_dir: default_download_dir(),
            cookies_path: default_cookies_path(),
            max_retries: default_max_retries(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            format: default_format(),
            merge_format: default_merge_format(),
            title_max_len: default_title_max_len(),
            user_agent: default_user_agent(),
            referer: default_referer(),
            rate_limit: default_rate_limit(),
            sleep_interval: default_sleep_interval(),
            max_sleep_interval: default_max_sleep_interval(),
            socket_timeout: default_socket_timeout(),
            tool_retries: default_tool_retries(),
            fragment_retries: default_tool_retries(),
        }
    }
}

impl FetcherConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }
}

fn default_binary() -> String {
    "yt-dlp".to_string()
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_cookies_path() -> PathBuf {
    PathBuf::from("cookies.txt")
}

fn default_max_retries() -> u32 {
    3
}

fn default_attempt_timeout_secs() -> u64 {
    10 * 60
}

fn default_format() -> String {
    "bestvideo[ext=mp4][height<=1080]+bestaudio[ext=m4a]/best[ext=mp4]/best".to_string()
}

fn default_merge_format() -> String {
    "mp4".to_string()
}

fn default_title_max_len() -> usize {
    200
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36".to_string()
}

fn default_referer() -> String {
    "https://www.youtube.com/".to_string()
}

fn default_rate_limit() -> String {
    "2M".to_string()
}

fn default_sleep_interval() -> u32 {
    3
}

fn default_max_sleep_interval() -> u32 {
    7
}

fn default_socket_timeout() -> u32 {
    30
}

fn default_tool_retries() -> u32 {
    10
}

/// Delays between outer fetch attempts
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PacingConfig {
    /// Lower bound of the first retry window; attempt `n` scales it by `n`
    #[serde(default = "default_retry_delay_min_secs")]
    pub retry_delay_min_secs: f64,
    /// Upper bound of the first retry window; attempt `n` scales it by `n`
    #[serde(default = "default_retry_delay_max_secs")]
    pub retry_delay_max_secs: f64,
    /// Extra wait per attempt when the tool reports rate limiting
    #[serde(default = "default_rate_limit_backoff_secs")]
    pub rate_limit_backoff_secs: f64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            retry_delay_min_secs: default_retry_delay_min_secs(),
            retry_delay_max_secs: default_retry_delay_max_secs(),
            rate_limit_backoff_secs: default_rate_limit_backoff_secs(),
        }
    }
}

fn default_retry_delay_min_secs() -> f64 {
    10.0
}

fn default_retry_delay_max_secs() -> f64 {
    20.0
}

fn default_rate_limit_backoff_secs() -> f64 {
    60.0
}

/// Log output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Append-only log file served by `/logs`; `None` logs to stdout only
    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,
    #[serde(default = "default_tail_lines")]
    pub tail_lines: usize,
    /// Fallback filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            tail_lines: default_tail_lines(),
            filter: default_log_filter(),
        }
    }
}

fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("vidferry.log"))
}

fn default_tail_lines() -> usize {
    50
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:10000");
        assert_eq!(config.fetcher.binary, "yt-dlp");
        assert_eq!(config.fetcher.max_retries, 3);
        assert_eq!(config.fetcher.attempt_timeout(), Duration::from_secs(600));
        assert_eq!(config.storage.content_type, "video/mp4");
        assert_eq!(config.storage.region, "auto");
        assert_eq!(config.logging.tail_lines, 50);
    }

    #[test]
    fn test_missing_settings_lists_every_absent_value() {
        let mut storage = StorageConfig::default();
        assert_eq!(
            storage.missing_settings(),
            vec!["endpoint", "access_key", "secret_key", "bucket"]
        );

        storage.endpoint = Some("https://r2.example.com".to_string());
        storage.access_key = Some("key".to_string());
        storage.secret_key = Some(String::new());
        storage.bucket = Some("videos".to_string());
        assert_eq!(storage.missing_settings(), vec!["secret_key"]);

        storage.secret_key = Some("secret".to_string());
        assert!(storage.missing_settings().is_empty());
    }
}
