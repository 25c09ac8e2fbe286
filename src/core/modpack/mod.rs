// ─── Modpack Releases ───
// The release server publishes a manifest describing one modpack version:
// every file the pack needs, each with a SHA-256 digest. Installing a
// release means downloading whatever is missing or stale and stamping the
// version marker afterwards.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::downloader::{Checksum, DownloadEntry, Downloader};
use crate::core::error::{LauncherError, LauncherResult};

/// Marker file recording which release is installed in a game directory.
const VERSION_MARKER: &str = ".wowid3-version";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFile {
    pub path: String,
    pub url: String,
    pub sha256: String,
    pub size: u64,
}

/// One published modpack release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub minecraft_version: String,
    pub fabric_loader: String,
    pub files: Vec<ManifestFile>,
    pub changelog: String,
}

impl Manifest {
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

/// Fetch the current release manifest from the release server.
pub async fn fetch_manifest(
    client: &reqwest::Client,
    manifest_url: &str,
) -> LauncherResult<Manifest> {
    let response = client.get(manifest_url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(LauncherError::DownloadFailed {
            url: manifest_url.to_string(),
            status: status.as_u16(),
        });
    }

    let manifest = response.json::<Manifest>().await?;
    info!(
        "Release manifest {}: {} files, Minecraft {}",
        manifest.version,
        manifest.files.len(),
        manifest.minecraft_version
    );
    Ok(manifest)
}

/// Read the installed release version, if any.
pub async fn installed_version(game_dir: &Path) -> LauncherResult<Option<String>> {
    let marker = game_dir.join(VERSION_MARKER);
    match tokio::fs::read_to_string(&marker).await {
        Ok(content) => Ok(Some(content.trim().to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(LauncherError::Io {
            path: marker,
            source: e,
        }),
    }
}

/// Stamp the game directory with the installed release version.
pub async fn write_version_marker(game_dir: &Path, version: &str) -> LauncherResult<()> {
    let marker = game_dir.join(VERSION_MARKER);
    tokio::fs::write(&marker, version)
        .await
        .map_err(|e| LauncherError::Io {
            path: marker,
            source: e,
        })
}

/// Whether `manifest` is newer than what the marker says is on disk.
/// A missing marker always means an update is due.
pub fn update_available(manifest: &Manifest, installed: Option<&str>) -> bool {
    match installed {
        Some(version) => version != manifest.version,
        None => true,
    }
}

/// Plan which manifest files actually need downloading: anything missing
/// from disk or failing its SHA-256 check.
pub async fn plan_downloads(
    manifest: &Manifest,
    game_dir: &Path,
) -> LauncherResult<Vec<DownloadEntry>> {
    let mut entries = Vec::new();

    for file in &manifest.files {
        let dest: PathBuf = game_dir.join(&file.path);
        let checksum = Checksum::Sha256(file.sha256.clone());

        if Downloader::file_matches(&dest, &checksum).await? {
            continue;
        }

        entries.push(DownloadEntry {
            url: file.url.clone(),
            dest,
            checksum: Some(checksum),
            size: Some(file.size),
        });
    }

    Ok(entries)
}

/// Install or update a release into `game_dir`.
///
/// Files already present with the right digest are skipped. The version
/// marker is only written after every file landed, so an interrupted
/// install is retried in full on the next run.
pub async fn install(
    manifest: &Manifest,
    game_dir: &Path,
    downloader: &Downloader,
) -> LauncherResult<()> {
    let entries = plan_downloads(manifest, game_dir).await?;
    info!(
        "Installing release {}: {} of {} files need downloading",
        manifest.version,
        entries.len(),
        manifest.files.len()
    );

    let failures = downloader.download_batch(entries).await;
    if let Some((entry, error)) = failures.into_iter().next() {
        warn!("Release install failed at {:?}: {}", entry.dest, error);
        return Err(error);
    }

    write_version_marker(game_dir, &manifest.version).await?;
    info!("Release {} installed", manifest.version);
    Ok(())
}
