//! Tracing setup and log file access

use std::fs::OpenOptions;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt};

use crate::config::LoggingConfig;

#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("Failed to open log file {path}: {source}")]
    OpenLogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to install tracing subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Install the global subscriber
///
/// Always logs to stdout. When `logging.file` is set, the same events are
/// appended to that file without ANSI colors. `RUST_LOG` overrides
/// `logging.filter`.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ObservabilityError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let file_layer = match &config.file {
        Some(path) => {
            let file = open_log_file(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()?;

    Ok(())
}

fn open_log_file(path: &Path) -> Result<std::fs::File, ObservabilityError> {
    let open = || -> std::io::Result<std::fs::File> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(path)
    };

    open().map_err(|source| ObservabilityError::OpenLogFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Bytes read per step when scanning the log backwards
const TAIL_CHUNK: u64 = 8 * 1024;

/// Upper bound on how much of the log one tail reads
const MAX_TAIL_BYTES: u64 = 1024 * 1024;

/// Last `lines` lines of the log file
///
/// Reads backwards from the end, at most [`MAX_TAIL_BYTES`]. `None` when the
/// file is missing, unreadable or empty.
pub async fn tail_log(path: &Path, lines: usize) -> Option<String> {
    let mut file = tokio::fs::File::open(path).await.ok()?;
    let len = file.metadata().await.ok()?.len();
    let floor = len.saturating_sub(MAX_TAIL_BYTES);

    let mut start = len;
    let mut tail: Vec<u8> = Vec::new();
    while start > floor && newlines(&tail) <= lines {
        let next = start.saturating_sub(TAIL_CHUNK).max(floor);
        let mut chunk = vec![0u8; (start - next) as usize];
        file.seek(SeekFrom::Start(next)).await.ok()?;
        file.read_exact(&mut chunk).await.ok()?;
        chunk.extend_from_slice(&tail);
        tail = chunk;
        start = next;
    }

    let text = String::from_utf8_lossy(&tail);
    let all: Vec<&str> = text.lines().collect();
    if all.is_empty() {
        return None;
    }

    let first = all.len().saturating_sub(lines);
    Some(all[first..].join("\n"))
}

fn newlines(bytes: &[u8]) -> usize {
    bytes.iter().filter(|&&b| b == b'\n').count()
}
