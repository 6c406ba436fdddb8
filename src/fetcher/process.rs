//! Typed boundary around the external downloader process

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Program and argument list for one tool run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

/// Everything observable about a finished tool run
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// The produced file, if the tool printed a path that exists on disk
    ///
    /// The path is printed after the merge/move step, so lines are scanned
    /// from the end and the first existing file wins.
    pub fn reported_path(&self) -> Option<PathBuf> {
        self.stdout
            .lines()
            .rev()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(Path::new)
            .find(|path| path.is_file())
            .map(Path::to_path_buf)
    }

    /// First `limit` characters of stderr, for log lines
    pub fn stderr_excerpt(&self, limit: usize) -> &str {
        match self.stderr.char_indices().nth(limit) {
            Some((idx, _)) => &self.stderr[..idx],
            None => &self.stderr,
        }
    }
}

/// Runs an [`Invocation`] to completion
///
/// Implementations must be cancel-safe: dropping the future must stop the
/// underlying work, because the fetcher enforces its timeout by dropping.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<ToolOutput, RunError>;
}

/// [`ToolRunner`] backed by a real child process
#[derive(Debug, Clone, Copy, Default)]
pub struct Subprocess;

#[async_trait]
impl ToolRunner for Subprocess {
    async fn run(&self, invocation: &Invocation) -> Result<ToolOutput, RunError> {
        debug!(program = %invocation.program, args = ?invocation.args, "Spawning tool");

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| RunError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;

        Ok(ToolOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reported_path_prefers_last_existing_line() {
        let temp_dir = TempDir::new().unwrap();
        let first = temp_dir.path().join("first.mp4");
        let merged = temp_dir.path().join("merged.mp4");
        std::fs::write(&first, b"a").unwrap();
        std::fs::write(&merged, b"b").unwrap();

        let output = ToolOutput {
            exit_code: Some(0),
            stdout: format!(
                "{}\n{}\n/no/such/file.mp4\n\n",
                first.display(),
                merged.display()
            ),
            stderr: String::new(),
        };

        assert_eq!(output.reported_path(), Some(merged));
    }

    #[test]
    fn test_reported_path_none_when_nothing_exists() {
        let output = ToolOutput {
            exit_code: Some(0),
            stdout: "[download] 100%\n/tmp/vidferry-missing/video.mp4\n".to_string(),
            stderr: String::new(),
        };

        assert!(output.success());
        assert_eq!(output.reported_path(), None);
    }

    #[test]
    fn test_stderr_excerpt_respects_char_boundaries() {
        let output = ToolOutput {
            exit_code: Some(1),
            stdout: String::new(),
            stderr: "ÉÉÉÉ".to_string(),
        };

        assert_eq!(output.stderr_excerpt(2), "ÉÉ");
        assert_eq!(output.stderr_excerpt(10), "ÉÉÉÉ");
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_subprocess_reports_spawn_failure() {
        let invocation = Invocation {
            program: "vidferry-definitely-not-installed".to_string(),
            args: vec![],
        };

        let result = Subprocess.run(&invocation).await;
        assert!(matches!(result, Err(RunError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_subprocess_captures_output_and_exit_code() {
        let invocation = Invocation {
            program: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                "echo out; echo err >&2; exit 3".to_string(),
            ],
        };

        let output = Subprocess.run(&invocation).await.unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }
}
