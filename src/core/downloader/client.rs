use std::path::{Path, PathBuf};

use futures_util::stream::{self, StreamExt};
use reqwest::Client;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::events::{EventBus, LauncherEvent};

/// Expected digest of a downloaded file.
///
/// Mojang metadata ships SHA-1; the release server's modpack manifest
/// ships SHA-256. Both are lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Checksum {
    Sha1(String),
    Sha256(String),
}

impl Checksum {
    pub fn expected(&self) -> &str {
        match self {
            Checksum::Sha1(hex) => hex,
            Checksum::Sha256(hex) => hex,
        }
    }

    /// Hex digest of `bytes` using this checksum's algorithm.
    pub fn digest_of(&self, bytes: &[u8]) -> String {
        match self {
            Checksum::Sha1(_) => {
                let mut hasher = Sha1::new();
                hasher.update(bytes);
                hex::encode(hasher.finalize())
            }
            Checksum::Sha256(_) => {
                let mut hasher = Sha256::new();
                hasher.update(bytes);
                hex::encode(hasher.finalize())
            }
        }
    }

    pub fn matches(&self, bytes: &[u8]) -> bool {
        self.digest_of(bytes).eq_ignore_ascii_case(self.expected())
    }
}

/// A single file to download with optional digest for validation.
#[derive(Debug, Clone)]
pub struct DownloadEntry {
    pub url: String,
    pub dest: PathBuf,
    pub checksum: Option<Checksum>,
    pub size: Option<u64>,
}

/// Concurrent, checksum-validated downloader.
pub struct Downloader {
    client: Client,
    /// Maximum number of parallel downloads.
    concurrency: usize,
    /// Optional event bus for progress reporting.
    events: Option<EventBus>,
}

impl Downloader {
    pub fn new(client: Client, events: Option<EventBus>) -> Self {
        Self {
            client,
            concurrency: 8,
            events,
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    // ── Single file download ────────────────────────────

    /// Download a single file to `dest`, optionally validating its digest.
    ///
    /// Creates parent directories as needed. Drops the file handle
    /// immediately after writing to avoid Windows OS Error 5.
    pub async fn download_file(
        &self,
        url: &str,
        dest: &Path,
        checksum: Option<&Checksum>,
    ) -> LauncherResult<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let total_bytes = response.content_length();
        let bytes = response.bytes().await?;

        // Validate the digest before anything touches disk.
        if let Some(expected) = checksum {
            let actual = expected.digest_of(&bytes);
            if !actual.eq_ignore_ascii_case(expected.expected()) {
                return Err(LauncherError::ChecksumMismatch {
                    path: dest.to_path_buf(),
                    expected: expected.expected().to_string(),
                    actual,
                });
            }
        }

        // Write inside a block so the handle is dropped immediately.
        {
            let mut file =
                tokio::fs::File::create(dest)
                    .await
                    .map_err(|e| LauncherError::Io {
                        path: dest.to_path_buf(),
                        source: e,
                    })?;
            file.write_all(&bytes).await.map_err(|e| LauncherError::Io {
                path: dest.to_path_buf(),
                source: e,
            })?;
            file.flush().await.map_err(|e| LauncherError::Io {
                path: dest.to_path_buf(),
                source: e,
            })?;
        }

        if let Some(events) = &self.events {
            let file_name = dest
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            events.emit(LauncherEvent::DownloadProgress {
                file_name,
                bytes_downloaded: bytes.len() as u64,
                total_bytes,
            });
        }

        debug!("Downloaded: {} -> {:?}", url, dest);
        Ok(())
    }

    // ── Batch concurrent downloads ──────────────────────

    /// Download many files concurrently using `buffer_unordered`.
    ///
    /// Returns the list of entries that failed (if any).
    pub async fn download_batch(
        &self,
        entries: Vec<DownloadEntry>,
    ) -> Vec<(DownloadEntry, LauncherError)> {
        info!(
            "Starting batch download: {} files, concurrency={}",
            entries.len(),
            self.concurrency
        );

        let results: Vec<_> = stream::iter(entries)
            .map(|entry| async move {
                let result = self
                    .download_file(&entry.url, &entry.dest, entry.checksum.as_ref())
                    .await;
                (entry, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        results
            .into_iter()
            .filter_map(|(entry, result)| match result {
                Ok(()) => None,
                Err(e) => Some((entry, e)),
            })
            .collect()
    }

    /// Whether an existing file already matches the expected digest.
    /// A missing file is simply "no".
    pub async fn file_matches(path: &Path, checksum: &Checksum) -> LauncherResult<bool> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(checksum.matches(&bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(LauncherError::Io {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}
