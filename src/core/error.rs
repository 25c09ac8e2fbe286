use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the entire launcher backend.
/// Every module returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("Timed out: {0}")]
    Timeout(String),

    // ── Integrity ───────────────────────────────────────
    #[error("Checksum mismatch for {path:?}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    // ── Authentication ──────────────────────────────────
    /// The identity provider refused the sign-in (no Xbox profile,
    /// missing entitlement, revoked consent). Retrying without user
    /// action will not help.
    #[error("Sign-in declined: {0}")]
    AuthDeclined(String),

    #[error("Authentication protocol error: {0}")]
    AuthProtocol(String),

    // ── Java ────────────────────────────────────────────
    #[error("Java runtime error: {0}")]
    JavaRuntime(String),

    // ── Game process ────────────────────────────────────
    #[error("Failed to spawn game process: {0}")]
    GameSpawn(String),

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl LauncherError {
    /// Producer-side default for the registry's `retryable` flag.
    ///
    /// Transient transport conditions (HTTP failures, bad status codes,
    /// timeouts) and corrupt transfers can succeed on a second attempt.
    /// Everything else needs remediation first, so the default is `false`.
    /// Subsystems may override when they know better.
    pub fn retry_hint(&self) -> bool {
        matches!(
            self,
            LauncherError::Http(_)
                | LauncherError::DownloadFailed { .. }
                | LauncherError::Timeout(_)
                | LauncherError::ChecksumMismatch { .. }
        )
    }
}
