use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::auth::{self, DeviceCodeInfo, MinecraftProfile};
use crate::core::downloader::Downloader;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::events::EventBus;
use crate::core::http::build_http_client;
use crate::core::install::{InstallContext, InstallPipeline};
use crate::core::java;
use crate::core::launch::{self, LaunchOptions, RunningGame};
use crate::core::net::{self, ConnectivityReport};
use crate::core::registry::{ErrorCode, ErrorRegistry};
use crate::core::version::VersionMetadata;

const APP_DIR_NAME: &str = "wowid3-launcher";
const BOOTSTRAP_FILE: &str = "launcher_bootstrap.json";
const SETTINGS_FILE: &str = "launcher_settings.json";

const DEFAULT_MANIFEST_URL: &str = "https://wowid-launcher.frostdev.io/api/manifest";
const DEFAULT_JAVA_ARCHIVE_URL: &str = "https://wowid-launcher.frostdev.io/api/java";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherSettings {
    pub manifest_url: String,
    pub java_archive_url: String,
    /// Overrides the default `<data>/game` directory when set.
    pub game_dir: Option<PathBuf>,
    pub max_memory_mb: u32,
    /// Uses this Java binary instead of the cached runtime when set.
    #[serde(default)]
    pub java_path: Option<PathBuf>,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            manifest_url: DEFAULT_MANIFEST_URL.into(),
            java_archive_url: DEFAULT_JAVA_ARCHIVE_URL.into(),
            game_dir: None,
            max_memory_mb: 4096,
            java_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BootstrapConfig {
    data_dir: PathBuf,
}

/// One launcher session: owns the shared HTTP client, the event bus, the
/// error registry and the persisted settings. Constructed at startup,
/// dropped at shutdown; nothing here is a global.
pub struct LauncherSession {
    pub data_dir: PathBuf,
    pub http_client: Client,
    pub downloader: Arc<Downloader>,
    pub events: EventBus,
    pub errors: Arc<ErrorRegistry>,
    pub settings: LauncherSettings,
    pub account: Option<MinecraftProfile>,
    pub running_game: Option<RunningGame>,
}

impl LauncherSession {
    /// Session rooted at the platform's default data directory.
    pub fn new() -> LauncherResult<Self> {
        Self::with_data_dir(default_data_dir())
    }

    /// Session rooted at an explicit directory. Tests use this to stay
    /// inside a tempdir.
    pub fn with_data_dir(data_dir: PathBuf) -> LauncherResult<Self> {
        std::fs::create_dir_all(&data_dir).map_err(|source| LauncherError::Io {
            path: data_dir.clone(),
            source,
        })?;

        let http_client = build_http_client()?;
        let events = EventBus::new();
        let errors = Arc::new(ErrorRegistry::with_events(events.clone()));
        let downloader = Arc::new(Downloader::new(http_client.clone(), Some(events.clone())));

        let settings = load_settings_from_disk(&data_dir).unwrap_or_default();
        let account = match auth::load_profile(&data_dir) {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Ignoring unreadable account file: {}", e);
                None
            }
        };

        info!("Launcher session rooted at {:?}", data_dir);
        Ok(Self {
            data_dir,
            http_client,
            downloader,
            events,
            errors,
            settings,
            account,
            running_game: None,
        })
    }

    /// Where the game lives: the settings override or `<data>/game`.
    pub fn game_dir(&self) -> PathBuf {
        self.settings
            .game_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("game"))
    }

    pub fn save_settings(&self) -> LauncherResult<()> {
        let path = self.data_dir.join(SETTINGS_FILE);
        let json = serde_json::to_string_pretty(&self.settings)?;
        std::fs::write(&path, json).map_err(|source| LauncherError::Io { path, source })
    }

    /// Store a successful sign-in: persist the profile and drop any stale
    /// AUTH_FAILED entry.
    pub fn complete_sign_in(&mut self, profile: MinecraftProfile) -> LauncherResult<()> {
        auth::save_profile(&self.data_dir, &profile)?;
        self.errors.clear(ErrorCode::AuthFailed);
        info!("Signed in as {}", profile.username);
        self.account = Some(profile);
        Ok(())
    }

    /// Start a device-code sign-in. The returned info carries the code the
    /// user enters in their browser.
    pub async fn begin_sign_in(&self) -> LauncherResult<DeviceCodeInfo> {
        match auth::request_device_code(&self.http_client).await {
            Ok(device) => Ok(device),
            Err(error) => {
                self.errors.record_failure(ErrorCode::AuthFailed, &error);
                Err(error)
            }
        }
    }

    /// Wait for the user to finish consent, then persist the signed-in
    /// profile. Failures land in the registry as AUTH_FAILED.
    pub async fn finish_sign_in(&mut self, device: &DeviceCodeInfo) -> LauncherResult<()> {
        match auth::sign_in_with_device_code(&self.http_client, device).await {
            Ok(profile) => self.complete_sign_in(profile),
            Err(error) => {
                self.errors.record_failure(ErrorCode::AuthFailed, &error);
                Err(error)
            }
        }
    }

    /// Refresh the stored account's access token if it is about to expire.
    /// A no-op when nobody is signed in.
    pub async fn refresh_account(&mut self) -> LauncherResult<()> {
        let Some(profile) = self.account.clone() else {
            return Ok(());
        };

        match auth::refresh_profile(&self.http_client, &profile).await {
            Ok(refreshed) => {
                auth::save_profile(&self.data_dir, &refreshed)?;
                self.errors.clear(ErrorCode::AuthFailed);
                self.account = Some(refreshed);
                Ok(())
            }
            Err(error) => {
                self.errors.record_failure(ErrorCode::AuthFailed, &error);
                Err(error)
            }
        }
    }

    /// Fetch the current release manifest, reconciling the registry:
    /// success clears any stale update error, failure records one.
    pub async fn check_for_updates(&self) -> LauncherResult<crate::core::modpack::Manifest> {
        match crate::core::modpack::fetch_manifest(&self.http_client, &self.settings.manifest_url)
            .await
        {
            Ok(manifest) => {
                self.errors.clear(ErrorCode::ModpackUpdateFailed);
                Ok(manifest)
            }
            Err(error) => {
                self.errors
                    .record_failure(ErrorCode::ModpackUpdateFailed, &error);
                Err(error)
            }
        }
    }

    /// Install or update a release into the game directory.
    pub async fn install_release(
        &self,
        manifest: &crate::core::modpack::Manifest,
    ) -> LauncherResult<()> {
        let game_dir = self.game_dir();
        tokio::fs::create_dir_all(&game_dir)
            .await
            .map_err(|source| LauncherError::Io {
                path: game_dir.clone(),
                source,
            })?;

        if let Err(error) =
            crate::core::modpack::install(manifest, &game_dir, &self.downloader).await
        {
            self.errors
                .record_failure(ErrorCode::ModpackUpdateFailed, &error);
            return Err(error);
        }

        self.errors.clear(ErrorCode::ModpackUpdateFailed);
        Ok(())
    }

    /// A usable Java binary: the settings override when one is configured,
    /// otherwise the cached runtime (downloaded on first use). Failures
    /// land in the registry as JAVA_RUNTIME_FAILED.
    pub async fn ensure_java(&self) -> LauncherResult<PathBuf> {
        if let Some(configured) = self.settings.java_path.clone() {
            let probe = configured.clone();
            let usable = tokio::task::spawn_blocking(move || java::is_usable_java_binary(&probe))
                .await
                .unwrap_or(false);
            if usable {
                self.errors.clear(ErrorCode::JavaRuntimeFailed);
                return Ok(configured);
            }

            let error = LauncherError::JavaRuntime(format!(
                "configured java at {:?} does not execute",
                configured
            ));
            self.errors.record_failure(ErrorCode::JavaRuntimeFailed, &error);
            return Err(error);
        }

        match java::ensure_runtime(
            &self.data_dir,
            &self.settings.java_archive_url,
            &self.downloader,
        )
        .await
        {
            Ok(java_bin) => {
                self.errors.clear(ErrorCode::JavaRuntimeFailed);
                Ok(java_bin)
            }
            Err(error) => {
                self.errors.record_failure(ErrorCode::JavaRuntimeFailed, &error);
                Err(error)
            }
        }
    }

    /// Run the staged game install (client jar, libraries, modpack files)
    /// into the game directory. Failures land as MC_INSTALL_FAILED.
    pub async fn install_game(
        &self,
        metadata: &VersionMetadata,
        manifest: Option<&crate::core::modpack::Manifest>,
    ) -> LauncherResult<()> {
        let game_dir = self.game_dir();
        tokio::fs::create_dir_all(&game_dir)
            .await
            .map_err(|source| LauncherError::Io {
                path: game_dir.clone(),
                source,
            })?;

        let pipeline = InstallPipeline::standard(self.events.clone());
        let ctx = InstallContext {
            version: metadata,
            manifest,
            game_dir: &game_dir,
            downloader: &self.downloader,
        };

        match pipeline.run(&ctx).await {
            Ok(()) => {
                self.errors.clear(ErrorCode::McInstallFailed);
                Ok(())
            }
            Err(error) => {
                self.errors.record_failure(ErrorCode::McInstallFailed, &error);
                Err(error)
            }
        }
    }

    /// Start the installed game as the signed-in player. Spawn failures
    /// land as MC_LAUNCH_FAILED; abnormal exits are recorded later by the
    /// monitor watching the process.
    pub async fn launch_game(&mut self, metadata: &VersionMetadata) -> LauncherResult<RunningGame> {
        let Some(account) = self.account.clone() else {
            let error = LauncherError::Other("no account is signed in".into());
            self.errors.record_failure(ErrorCode::McLaunchFailed, &error);
            return Err(error);
        };

        let java_bin = self.ensure_java().await?;
        let options = LaunchOptions {
            minecraft_version: metadata.id.clone(),
            game_dir: self.game_dir(),
            max_memory_mb: self.settings.max_memory_mb,
            username: account.username,
            uuid: account.uuid,
            access_token: account.access_token,
        };

        match launch::launch(
            &options,
            metadata,
            &java_bin,
            self.events.clone(),
            self.errors.clone(),
        )
        .await
        {
            Ok(game) => {
                self.errors.clear(ErrorCode::McLaunchFailed);
                self.running_game = Some(game.clone());
                Ok(game)
            }
            Err(error) => {
                self.errors.record_failure(ErrorCode::McLaunchFailed, &error);
                Err(error)
            }
        }
    }

    /// Terminate the running game, if any.
    pub fn stop_game(&mut self) -> LauncherResult<()> {
        let Some(game) = self.running_game.take() else {
            return Ok(());
        };

        if let Err(error) = launch::stop_game(game.pid) {
            self.running_game = Some(game);
            return Err(error);
        }

        info!("Stopped game run {}", game.run_id);
        Ok(())
    }

    /// Probe the game server and reconcile NETWORK_OFFLINE in the registry.
    pub async fn check_connectivity(&self) -> ConnectivityReport {
        net::check_connectivity(net::GAME_SERVER_HOST, net::GAME_SERVER_PORT, &self.errors).await
    }

    /// Session teardown: forget the account and reset the error registry.
    pub fn logout(&mut self) -> LauncherResult<()> {
        auth::clear_profile(&self.data_dir)?;
        self.account = None;
        self.errors.clear_all();
        info!("Logged out");
        Ok(())
    }
}

fn load_settings_from_disk(data_dir: &std::path::Path) -> Option<LauncherSettings> {
    let raw = std::fs::read_to_string(data_dir.join(SETTINGS_FILE)).ok()?;
    serde_json::from_str(&raw).ok()
}

fn default_base_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_data_dir() -> PathBuf {
    let base = default_base_dir();
    let bootstrap_path = base.join(BOOTSTRAP_FILE);

    // A bootstrap file redirects the whole data dir, e.g. to another drive.
    if let Ok(raw) = std::fs::read_to_string(&bootstrap_path) {
        if let Ok(cfg) = serde_json::from_str::<BootstrapConfig>(&raw) {
            if !cfg.data_dir.exists() {
                let _ = std::fs::create_dir_all(&cfg.data_dir);
            }
            return cfg.data_dir;
        }
    }

    base.join(APP_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_profile() -> MinecraftProfile {
        MinecraftProfile {
            uuid: "069a79f4-44e9-4726-a5be-fca90e38aaf5".into(),
            username: "Dev".into(),
            access_token: "tok".into(),
            skin_url: None,
            refresh_token: None,
            expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
        }
    }

    #[test]
    fn fresh_session_starts_with_an_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let session = LauncherSession::with_data_dir(dir.path().to_path_buf()).unwrap();

        assert!(session.errors.is_empty());
        assert!(session.account.is_none());
        assert!(session.running_game.is_none());
    }

    #[test]
    fn settings_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = LauncherSession::with_data_dir(dir.path().to_path_buf()).unwrap();

        session.settings.max_memory_mb = 8192;
        session.settings.game_dir = Some(dir.path().join("custom"));
        session.save_settings().unwrap();

        let reloaded = LauncherSession::with_data_dir(dir.path().to_path_buf()).unwrap();
        assert_eq!(reloaded.settings.max_memory_mb, 8192);
        assert_eq!(reloaded.game_dir(), dir.path().join("custom"));
    }

    #[test]
    fn game_dir_defaults_under_the_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let session = LauncherSession::with_data_dir(dir.path().to_path_buf()).unwrap();
        assert_eq!(session.game_dir(), dir.path().join("game"));
    }

    #[test]
    fn sign_in_persists_and_clears_stale_auth_errors() {
        use crate::core::registry::ErrorReport;

        let dir = tempfile::tempdir().unwrap();
        let mut session = LauncherSession::with_data_dir(dir.path().to_path_buf()).unwrap();

        session
            .errors
            .record(ErrorReport::new(ErrorCode::AuthFailed, "Login failed"));
        session.complete_sign_in(test_profile()).unwrap();

        assert!(session.errors.is_empty());
        assert_eq!(session.account.as_ref().unwrap().username, "Dev");

        let reloaded = LauncherSession::with_data_dir(dir.path().to_path_buf()).unwrap();
        assert_eq!(reloaded.account.unwrap().username, "Dev");
    }

    #[tokio::test]
    async fn failed_update_check_lands_in_the_registry() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = LauncherSession::with_data_dir(dir.path().to_path_buf()).unwrap();

        // Reserve a port, then close it so the fetch is refused locally.
        let closed_port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        session.settings.manifest_url = format!("http://127.0.0.1:{}/manifest", closed_port);

        assert!(session.check_for_updates().await.is_err());

        let active = session.errors.snapshot();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].code, ErrorCode::ModpackUpdateFailed);
        assert!(active[0].retryable);
    }

    #[tokio::test]
    async fn installing_an_already_complete_release_clears_update_errors() {
        use crate::core::modpack::{installed_version, Manifest, ManifestFile};
        use crate::core::registry::ErrorReport;

        let dir = tempfile::tempdir().unwrap();
        let session = LauncherSession::with_data_dir(dir.path().to_path_buf()).unwrap();
        session.errors.record(ErrorReport::new(
            ErrorCode::ModpackUpdateFailed,
            "previous attempt failed",
        ));

        // Every manifest file already on disk with the right digest, so the
        // install completes without touching the network.
        let game_dir = session.game_dir();
        tokio::fs::create_dir_all(game_dir.join("mods")).await.unwrap();
        tokio::fs::write(game_dir.join("mods/present.jar"), b"mock")
            .await
            .unwrap();

        let manifest = Manifest {
            version: "3.2.0".into(),
            minecraft_version: "1.20.1".into(),
            fabric_loader: "0.15.11".into(),
            files: vec![ManifestFile {
                path: "mods/present.jar".into(),
                url: "https://releases.example.com/present.jar".into(),
                sha256: "ec864fe99b539704b8872ac591067ef22d836a8d942087f2dba274b301ebe6e5"
                    .into(),
                size: 4,
            }],
            changelog: "Initial".into(),
        };

        session.install_release(&manifest).await.unwrap();
        assert!(session.errors.is_empty());
        assert_eq!(
            installed_version(&game_dir).await.unwrap().as_deref(),
            Some("3.2.0")
        );
    }

    // SHA-1 of the ASCII string "mock".
    const SHA1_MOCK: &str = "475e81e79c7880f9b5caa35bec50279c459ad2f9";

    fn offline_metadata(client_url: &str, sha1: &str) -> VersionMetadata {
        serde_json::from_str(&format!(
            r#"{{
                "id": "1.20.1",
                "mainClass": "net.minecraft.client.main.Main",
                "downloads": {{
                    "client": {{ "url": "{}", "sha1": "{}", "size": 4 }}
                }}
            }}"#,
            client_url, sha1
        ))
        .unwrap()
    }

    fn closed_port() -> u16 {
        // Reserve a port, then close it so connects are refused.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn launch_without_an_account_records_a_launch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = LauncherSession::with_data_dir(dir.path().to_path_buf()).unwrap();
        let metadata = offline_metadata("https://example.com/client.jar", "aa");

        assert!(session.launch_game(&metadata).await.is_err());
        assert!(session.running_game.is_none());

        let active = session.errors.snapshot();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].code, ErrorCode::McLaunchFailed);
        assert!(!active[0].retryable);
    }

    #[tokio::test]
    async fn failed_runtime_download_lands_in_the_registry() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = LauncherSession::with_data_dir(dir.path().to_path_buf()).unwrap();
        session.settings.java_archive_url = format!("http://127.0.0.1:{}/java", closed_port());

        assert!(session.ensure_java().await.is_err());

        let active = session.errors.snapshot();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].code, ErrorCode::JavaRuntimeFailed);
        assert!(active[0].retryable);
    }

    #[tokio::test]
    async fn configured_java_that_does_not_execute_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = LauncherSession::with_data_dir(dir.path().to_path_buf()).unwrap();

        let fake = dir.path().join("java");
        std::fs::write(&fake, b"not a jvm").unwrap();
        session.settings.java_path = Some(fake);

        assert!(session.ensure_java().await.is_err());

        let active = session.errors.snapshot();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].code, ErrorCode::JavaRuntimeFailed);
        assert!(!active[0].retryable);
    }

    #[tokio::test]
    async fn refresh_without_a_stored_token_records_auth_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = LauncherSession::with_data_dir(dir.path().to_path_buf()).unwrap();

        let mut profile = test_profile();
        profile.expires_at = Some(Utc::now() - chrono::Duration::minutes(1));
        profile.refresh_token = None;
        session.complete_sign_in(profile).unwrap();

        assert!(session.refresh_account().await.is_err());

        let active = session.errors.snapshot();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].code, ErrorCode::AuthFailed);
    }

    #[tokio::test]
    async fn refresh_with_nobody_signed_in_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = LauncherSession::with_data_dir(dir.path().to_path_buf()).unwrap();

        session.refresh_account().await.unwrap();
        assert!(session.errors.is_empty());
    }

    #[tokio::test]
    async fn failed_game_install_lands_in_the_registry() {
        let dir = tempfile::tempdir().unwrap();
        let session = LauncherSession::with_data_dir(dir.path().to_path_buf()).unwrap();
        let metadata = offline_metadata(
            &format!("http://127.0.0.1:{}/client.jar", closed_port()),
            "aa",
        );

        assert!(session.install_game(&metadata, None).await.is_err());

        let active = session.errors.snapshot();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].code, ErrorCode::McInstallFailed);
        assert!(active[0].retryable);
    }

    #[tokio::test]
    async fn completed_game_install_clears_stale_install_errors() {
        use crate::core::install::{client_jar_path, is_version_installed};
        use crate::core::registry::ErrorReport;

        let dir = tempfile::tempdir().unwrap();
        let session = LauncherSession::with_data_dir(dir.path().to_path_buf()).unwrap();
        session.errors.record(ErrorReport::new(
            ErrorCode::McInstallFailed,
            "previous attempt failed",
        ));

        // Client jar already on disk with the right digest; no libraries
        // and no manifest, so the whole pipeline completes offline.
        let game_dir = session.game_dir();
        let jar = client_jar_path(&game_dir, "1.20.1");
        tokio::fs::create_dir_all(jar.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(&jar, b"mock").await.unwrap();

        let metadata = offline_metadata("https://example.com/client.jar", SHA1_MOCK);
        session.install_game(&metadata, None).await.unwrap();

        assert!(session.errors.is_empty());
        assert!(is_version_installed(&game_dir, "1.20.1").await);
    }

    #[test]
    fn stopping_with_nothing_running_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = LauncherSession::with_data_dir(dir.path().to_path_buf()).unwrap();

        session.stop_game().unwrap();
        assert!(session.running_game.is_none());
    }

    #[test]
    fn logout_resets_account_and_registry() {
        use crate::core::registry::ErrorReport;

        let dir = tempfile::tempdir().unwrap();
        let mut session = LauncherSession::with_data_dir(dir.path().to_path_buf()).unwrap();

        session.complete_sign_in(test_profile()).unwrap();
        session
            .errors
            .record(ErrorReport::new(ErrorCode::NetworkOffline, "offline"));
        session
            .errors
            .record(ErrorReport::new(ErrorCode::McLaunchFailed, "crash"));

        session.logout().unwrap();

        assert!(session.account.is_none());
        assert!(session.errors.is_empty());

        let reloaded = LauncherSession::with_data_dir(dir.path().to_path_buf()).unwrap();
        assert!(reloaded.account.is_none());
    }
}
