// ─── Game Installation ───
// Staged install of a playable client: jar, libraries, then the modpack
// files the release manifest describes. Steps are idempotent, so a failed
// install is simply run again.

mod context;
mod pipeline;
mod step;

use std::path::{Path, PathBuf};

pub use context::InstallContext;
pub use pipeline::{InstallPipeline, Step};
pub use step::{ClientJarStep, InstallStep, LibrariesStep, ModpackFilesStep};

pub fn client_jar_path(game_dir: &Path, version_id: &str) -> PathBuf {
    game_dir
        .join("versions")
        .join(version_id)
        .join(format!("{}.jar", version_id))
}

pub fn version_metadata_path(game_dir: &Path, version_id: &str) -> PathBuf {
    game_dir
        .join("versions")
        .join(version_id)
        .join(format!("{}.json", version_id))
}

/// Whether a version's jar and metadata are both on disk.
pub async fn is_version_installed(game_dir: &Path, version_id: &str) -> bool {
    let jar = client_jar_path(game_dir, version_id);
    let metadata = version_metadata_path(game_dir, version_id);
    jar.is_file() && metadata.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    use reqwest::Client;

    use crate::core::downloader::Downloader;
    use crate::core::events::{EventBus, LauncherEvent};
    use crate::core::version::VersionMetadata;

    // SHA-1 of the ASCII string "mock".
    const SHA1_MOCK: &str = "475e81e79c7880f9b5caa35bec50279c459ad2f9";

    fn offline_metadata() -> VersionMetadata {
        serde_json::from_str(&format!(
            r#"{{
                "id": "1.20.1",
                "mainClass": "net.minecraft.client.main.Main",
                "downloads": {{
                    "client": {{ "url": "https://example.com/client.jar",
                                 "sha1": "{}", "size": 4 }}
                }},
                "javaVersion": {{ "majorVersion": 17 }}
            }}"#,
            SHA1_MOCK
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn pipeline_runs_steps_and_reports_stages() {
        let dir = tempfile::tempdir().unwrap();
        let game_dir = dir.path().to_path_buf();

        // Pre-seed the client jar so the step verifies instead of fetching.
        let jar = client_jar_path(&game_dir, "1.20.1");
        tokio::fs::create_dir_all(jar.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(&jar, b"mock").await.unwrap();

        let events = EventBus::new();
        let mut rx = events.subscribe();
        let downloader = Downloader::new(Client::new(), None);
        let metadata = offline_metadata();

        let pipeline = InstallPipeline::with_steps(
            vec![
                Step::ClientJar(ClientJarStep),
                Step::ModpackFiles(ModpackFilesStep),
            ],
            events,
        );
        let ctx = InstallContext {
            version: &metadata,
            manifest: None,
            game_dir: &game_dir,
            downloader: &downloader,
        };
        pipeline.run(&ctx).await.unwrap();

        assert!(is_version_installed(&game_dir, "1.20.1").await);

        let mut stages = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let LauncherEvent::InstallStage { stage, .. } = event {
                stages.push(stage);
            }
        }
        assert_eq!(stages, vec!["client", "modpack", "complete"]);
    }

    #[tokio::test]
    async fn version_is_installed_once_jar_and_metadata_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_version_installed(dir.path(), "1.20.1").await);

        let version_dir = dir.path().join("versions").join("1.20.1");
        tokio::fs::create_dir_all(&version_dir).await.unwrap();
        tokio::fs::write(version_dir.join("1.20.1.jar"), b"mock")
            .await
            .unwrap();
        assert!(!is_version_installed(dir.path(), "1.20.1").await);

        tokio::fs::write(version_dir.join("1.20.1.json"), br#"{"id":"1.20.1"}"#)
            .await
            .unwrap();
        assert!(is_version_installed(dir.path(), "1.20.1").await);
    }

    #[test]
    fn client_jar_path_follows_versions_layout() {
        let path = client_jar_path(Path::new("/data/game"), "1.20.1");
        assert!(path.ends_with("versions/1.20.1/1.20.1.jar"));
    }
}
