// ─── Version Metadata ───
// Mojang version manifest v2 plus the per-version metadata needed to put a
// playable client on disk: client jar download, required Java major, main
// class and the flat library list.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::downloader::{Checksum, DownloadEntry};
use crate::core::error::{LauncherError, LauncherResult};

const VERSION_MANIFEST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";

/// Top-level Mojang version manifest.
#[derive(Debug, Deserialize)]
pub struct VersionManifest {
    pub latest: LatestVersions,
    pub versions: Vec<VersionEntry>,
}

#[derive(Debug, Deserialize)]
pub struct LatestVersions {
    pub release: String,
    pub snapshot: String,
}

/// A single entry in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub version_type: String,
    #[serde(rename = "releaseTime")]
    pub release_time: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
}

impl VersionManifest {
    /// Fetch the version manifest from Mojang using a shared HTTP client.
    pub async fn fetch(client: &reqwest::Client) -> LauncherResult<Self> {
        info!("Fetching Minecraft version manifest...");

        let manifest: VersionManifest = client
            .get(VERSION_MANIFEST_URL)
            .send()
            .await?
            .json()
            .await?;

        info!("Loaded {} versions from manifest", manifest.versions.len());
        Ok(manifest)
    }

    /// Find a specific version entry by ID (e.g. "1.20.1").
    pub fn find_version(&self, id: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// The entry behind `latest.release`.
    pub fn latest_release(&self) -> Option<&VersionEntry> {
        self.find_version(&self.latest.release)
    }

    /// List all official stable versions (release only).
    pub fn releases(&self) -> Vec<&VersionEntry> {
        self.versions
            .iter()
            .filter(|v| v.version_type == "release")
            .collect()
    }
}

/// Per-version metadata resolved from a manifest entry's URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionMetadata {
    pub id: String,
    #[serde(rename = "mainClass")]
    pub main_class: String,
    pub downloads: VersionDownloads,
    #[serde(rename = "javaVersion", default)]
    pub java_version: Option<JavaVersionRequirement>,
    #[serde(default)]
    pub libraries: Vec<Library>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionDownloads {
    pub client: DownloadInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadInfo {
    pub url: String,
    pub sha1: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JavaVersionRequirement {
    #[serde(rename = "majorVersion")]
    pub major_version: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    pub name: String,
    #[serde(default)]
    pub downloads: Option<LibraryDownloads>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryDownloads {
    #[serde(default)]
    pub artifact: Option<ArtifactInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub path: String,
    pub url: String,
    pub sha1: String,
    pub size: u64,
}

impl VersionMetadata {
    /// Fetch and parse the metadata a manifest entry points at.
    pub async fn fetch(
        client: &reqwest::Client,
        entry: &VersionEntry,
    ) -> LauncherResult<Self> {
        let response = client.get(&entry.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: entry.url.clone(),
                status: status.as_u16(),
            });
        }

        let metadata = response.json::<VersionMetadata>().await?;
        info!(
            "Resolved version {}: {} libraries, main class {}",
            metadata.id,
            metadata.libraries.len(),
            metadata.main_class
        );
        Ok(metadata)
    }

    /// Java major this version needs. Modern metadata carries it; very old
    /// versions that do not get the Java 8 era default.
    pub fn required_java_major(&self) -> u32 {
        self.java_version
            .as_ref()
            .map(|req| req.major_version)
            .unwrap_or(8)
    }

    /// Plan the library downloads under `libraries_dir`, skipping entries
    /// without a downloadable artifact (natives-only rules we don't apply).
    pub fn library_entries(&self, libraries_dir: &std::path::Path) -> Vec<DownloadEntry> {
        self.libraries
            .iter()
            .filter_map(|lib| lib.downloads.as_ref()?.artifact.as_ref())
            .map(|artifact| DownloadEntry {
                url: artifact.url.clone(),
                dest: libraries_dir.join(&artifact.path),
                checksum: Some(Checksum::Sha1(artifact.sha1.clone())),
                size: Some(artifact.size),
            })
            .collect()
    }
}
