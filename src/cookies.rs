//! Cookie credential file handed to the downloader
//!
//! The file is written through the HTTP facade and read by every fetch
//! attempt. Writes replace the whole file; there is no merging.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum CookieError {
    #[error("No cookies content provided")]
    Empty,

    #[error("Failed to write cookies file: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CookieError>;

#[derive(Debug, Clone)]
pub struct CookieStore {
    path: PathBuf,
}

impl CookieStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Replace the cookie file with `content`, returning the bytes written
    ///
    /// Content is trimmed first. The new file is written next to the old one
    /// and renamed over it, so a concurrent fetch sees either version whole.
    pub async fn write(&self, content: &str) -> Result<usize> {
        let content = content.trim();
        if content.is_empty() {
            return Err(CookieError::Empty);
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let staging = self.path.with_extension("txt.partial");
        tokio::fs::write(&staging, content).await?;
        tokio::fs::rename(&staging, &self.path).await?;

        info!(
            path = %self.path.display(),
            bytes = content.len(),
            "Cookies file replaced"
        );

        Ok(content.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const COOKIES: &str = "# Netscape HTTP Cookie File\n.youtube.com\tTRUE\t/\tTRUE\t1735689600\tVISITOR_INFO1_LIVE\tabc\n";

    #[tokio::test]
    async fn test_write_creates_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = CookieStore::new(temp_dir.path().join("cookies.txt"));
        assert!(!store.exists());

        let written = store.write(COOKIES).await.unwrap();

        assert!(store.exists());
        assert_eq!(written, COOKIES.trim().len());
        let on_disk = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(on_disk, COOKIES.trim());
    }

    #[tokio::test]
    async fn test_write_overwrites_instead_of_merging() {
        let temp_dir = TempDir::new().unwrap();
        let store = CookieStore::new(temp_dir.path().join("cookies.txt"));

        store.write(COOKIES).await.unwrap();
        store.write("# HTTP Cookie File\nsecond").await.unwrap();

        let on_disk = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(on_disk, "# HTTP Cookie File\nsecond");
        assert!(!temp_dir.path().join("cookies.txt.partial").exists());
    }

    #[tokio::test]
    async fn test_empty_content_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = CookieStore::new(temp_dir.path().join("cookies.txt"));

        assert!(matches!(store.write("  \n\t").await, Err(CookieError::Empty)));
        assert!(!store.exists());
    }

    #[tokio::test]
    async fn test_write_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let store = CookieStore::new(temp_dir.path().join("secrets/yt/cookies.txt"));

        store.write(COOKIES).await.unwrap();
        assert!(store.exists());
    }
}
