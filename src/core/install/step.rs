use async_trait::async_trait;
use tracing::{info, warn};

use crate::core::downloader::{Checksum, Downloader};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::modpack;

use super::context::InstallContext;
use super::{client_jar_path, version_metadata_path};

#[async_trait]
pub trait InstallStep: Send + Sync {
    /// Stage name surfaced in progress events.
    fn stage(&self) -> &'static str;

    async fn run(&self, ctx: &InstallContext<'_>) -> LauncherResult<()>;
}

// ── Client jar ──────────────────────────────────────────

/// Downloads the SHA-1 verified client jar and persists the resolved
/// version metadata next to it.
pub struct ClientJarStep;

#[async_trait]
impl InstallStep for ClientJarStep {
    fn stage(&self) -> &'static str {
        "client"
    }

    async fn run(&self, ctx: &InstallContext<'_>) -> LauncherResult<()> {
        let jar_path = client_jar_path(ctx.game_dir, &ctx.version.id);
        let client = &ctx.version.downloads.client;
        let checksum = Checksum::Sha1(client.sha1.clone());

        if Downloader::file_matches(&jar_path, &checksum).await? {
            info!("Client jar for {} already present", ctx.version.id);
        } else {
            ctx.downloader
                .download_file(&client.url, &jar_path, Some(&checksum))
                .await?;
        }

        let metadata_path = version_metadata_path(ctx.game_dir, &ctx.version.id);
        let json = serde_json::to_string_pretty(ctx.version)?;
        tokio::fs::write(&metadata_path, json)
            .await
            .map_err(|source| LauncherError::Io {
                path: metadata_path,
                source,
            })?;

        Ok(())
    }
}

// ── Libraries ───────────────────────────────────────────

/// Downloads every library artifact the version metadata lists, in
/// parallel, skipping artifacts already on disk with the right digest.
pub struct LibrariesStep;

#[async_trait]
impl InstallStep for LibrariesStep {
    fn stage(&self) -> &'static str {
        "libraries"
    }

    async fn run(&self, ctx: &InstallContext<'_>) -> LauncherResult<()> {
        let libraries_dir = ctx.game_dir.join("libraries");
        let planned = ctx.version.library_entries(&libraries_dir);

        let mut pending = Vec::new();
        for entry in planned {
            let already_present = match &entry.checksum {
                Some(checksum) => Downloader::file_matches(&entry.dest, checksum).await?,
                None => entry.dest.is_file(),
            };
            if !already_present {
                pending.push(entry);
            }
        }

        info!(
            "Installing {} libraries for {}",
            pending.len(),
            ctx.version.id
        );

        let failures = ctx.downloader.download_batch(pending).await;
        if let Some((entry, error)) = failures.into_iter().next() {
            warn!("Library download failed at {:?}: {}", entry.dest, error);
            return Err(error);
        }

        Ok(())
    }
}

// ── Modpack files ───────────────────────────────────────

/// Applies the release manifest on top of the vanilla install. A no-op
/// when the context carries no manifest.
pub struct ModpackFilesStep;

#[async_trait]
impl InstallStep for ModpackFilesStep {
    fn stage(&self) -> &'static str {
        "modpack"
    }

    async fn run(&self, ctx: &InstallContext<'_>) -> LauncherResult<()> {
        let Some(manifest) = ctx.manifest else {
            return Ok(());
        };

        modpack::install(manifest, ctx.game_dir, ctx.downloader).await
    }
}
