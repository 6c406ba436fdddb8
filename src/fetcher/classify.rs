//! Failure classification from the downloader's stderr
//!
//! The tool has no structured error channel, so markers in its stderr are
//! the only signal for deciding whether another attempt can help.

/// Bot detection: retrying without fresh cookies cannot succeed
const TERMINAL_MARKERS: &[&str] = &["Sign in to confirm"];

/// Rate limiting or blocking that may clear up after a longer wait
const TRANSIENT_MARKERS: &[&str] = &["403", "Forbidden", "429", "Too Many Requests"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Stop immediately, no further attempts
    Terminal,
    /// Retry after an extra rate-limit backoff
    Transient,
    /// Retry with the normal pacing delay
    Unknown,
}

impl FailureClass {
    pub fn is_terminal(self) -> bool {
        matches!(self, FailureClass::Terminal)
    }
}

/// Classify a failed run by its stderr; terminal markers win over transient ones
pub fn classify(stderr: &str) -> FailureClass {
    if TERMINAL_MARKERS.iter().any(|marker| stderr.contains(marker)) {
        FailureClass::Terminal
    } else if TRANSIENT_MARKERS.iter().any(|marker| stderr.contains(marker)) {
        FailureClass::Transient
    } else {
        FailureClass::Unknown
    }
}
