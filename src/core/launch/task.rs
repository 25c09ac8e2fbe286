// ─── Launch Task ───
// Spawns the game process with the correct arguments.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use sysinfo::System;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::events::EventBus;
use crate::core::registry::ErrorRegistry;
use crate::core::version::VersionMetadata;

use super::monitor;

/// Everything needed to start the game once it is installed.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub minecraft_version: String,
    pub game_dir: PathBuf,
    pub max_memory_mb: u32,
    pub username: String,
    pub uuid: String,
    pub access_token: String,
}

/// Handle to a spawned game process.
#[derive(Debug, Clone)]
pub struct RunningGame {
    /// Identifies this run in logs; a fresh value per launch.
    pub run_id: Uuid,
    pub pid: u32,
}

pub(super) fn classpath_separator() -> &'static str {
    if cfg!(target_os = "windows") {
        ";"
    } else {
        ":"
    }
}

/// Classpath for a version: every library artifact plus the client jar,
/// in metadata order.
pub fn build_classpath(metadata: &VersionMetadata, game_dir: &Path) -> String {
    let libraries_dir = game_dir.join("libraries");
    let mut parts: Vec<String> = metadata
        .libraries
        .iter()
        .filter_map(|lib| lib.downloads.as_ref()?.artifact.as_ref())
        .map(|artifact| {
            libraries_dir
                .join(&artifact.path)
                .to_string_lossy()
                .to_string()
        })
        .collect();

    parts.push(
        crate::core::install::client_jar_path(game_dir, &metadata.id)
            .to_string_lossy()
            .to_string(),
    );

    parts.join(classpath_separator())
}

/// JVM arguments, main class and game arguments, in spawn order.
pub fn build_launch_args(
    options: &LaunchOptions,
    metadata: &VersionMetadata,
    classpath: &str,
) -> Vec<String> {
    let natives_dir = options.game_dir.join("natives");
    let assets_dir = options.game_dir.join("assets");

    let mut args = vec![
        format!("-Xmx{}M", options.max_memory_mb),
        "-Xms512M".to_string(),
        format!("-Djava.library.path={}", natives_dir.to_string_lossy()),
        "-Dminecraft.launcher.brand=Wowid3Launcher".to_string(),
        "-cp".to_string(),
        classpath.to_string(),
        metadata.main_class.clone(),
    ];

    args.extend([
        "--username".to_string(),
        options.username.clone(),
        "--uuid".to_string(),
        options.uuid.clone(),
        "--accessToken".to_string(),
        options.access_token.clone(),
        "--version".to_string(),
        options.minecraft_version.clone(),
        "--gameDir".to_string(),
        options.game_dir.to_string_lossy().to_string(),
        "--assetsDir".to_string(),
        assets_dir.to_string_lossy().to_string(),
    ]);

    args
}

/// Refuse a heap request the machine cannot back with physical memory.
pub fn preflight_memory(max_memory_mb: u32) -> LauncherResult<()> {
    let mut system = System::new();
    system.refresh_memory();
    let total_mb = system.total_memory() / (1024 * 1024);

    if u64::from(max_memory_mb) > total_mb {
        return Err(LauncherError::Other(format!(
            "Requested {} MB of heap but this machine only has {} MB of RAM",
            max_memory_mb, total_mb
        )));
    }

    Ok(())
}

/// Launch the game as a child process.
///
/// Returns as soon as the process is up. Output streaming, exit watching
/// and crash classification continue on background tasks; an abnormal exit
/// lands in the error registry as `MC_LAUNCH_FAILED`.
pub async fn launch(
    options: &LaunchOptions,
    metadata: &VersionMetadata,
    java_bin: &Path,
    events: EventBus,
    errors: Arc<ErrorRegistry>,
) -> LauncherResult<RunningGame> {
    preflight_memory(options.max_memory_mb)?;

    let classpath = build_classpath(metadata, &options.game_dir);
    if classpath.trim().is_empty() {
        return Err(LauncherError::Other(
            "Empty classpath, refusing to start an invalid JVM".into(),
        ));
    }

    let args = build_launch_args(options, metadata, &classpath);
    debug!("Launch arguments: {:?}", args);

    let mut child = tokio::process::Command::new(java_bin)
        .args(&args)
        .current_dir(&options.game_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| LauncherError::GameSpawn(e.to_string()))?;

    let pid = child
        .id()
        .ok_or_else(|| LauncherError::GameSpawn("process exited before reporting a PID".into()))?;

    let run_id = Uuid::new_v4();
    info!("Launched Minecraft {} (run {}, PID {})", options.minecraft_version, run_id, pid);

    monitor::stream_output(&mut child, events.clone());
    monitor::watch_exit(child, options.game_dir.clone(), events, errors);

    Ok(RunningGame { run_id, pid })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_metadata() -> VersionMetadata {
        serde_json::from_str(
            r#"{
                "id": "1.20.1",
                "mainClass": "net.fabricmc.loader.impl.launch.knot.KnotClient",
                "downloads": {
                    "client": { "url": "https://example.com/client.jar", "sha1": "aa", "size": 1 }
                },
                "libraries": [
                    { "name": "com.example:lib:1.0",
                      "downloads": { "artifact": {
                          "path": "com/example/lib/1.0/lib-1.0.jar",
                          "url": "https://example.com/lib.jar",
                          "sha1": "bb", "size": 1 } } }
                ]
            }"#,
        )
        .unwrap()
    }

    fn test_options() -> LaunchOptions {
        LaunchOptions {
            minecraft_version: "1.20.1".into(),
            game_dir: PathBuf::from("/data/game"),
            max_memory_mb: 4096,
            username: "Dev".into(),
            uuid: "069a79f4-44e9-4726-a5be-fca90e38aaf5".into(),
            access_token: "token".into(),
        }
    }

    #[test]
    fn classpath_lists_libraries_then_client_jar() {
        let classpath = build_classpath(&test_metadata(), Path::new("/data/game"));
        let parts: Vec<&str> = classpath.split(classpath_separator()).collect();

        assert_eq!(parts.len(), 2);
        assert!(parts[0].ends_with("com/example/lib/1.0/lib-1.0.jar"));
        assert!(parts[1].ends_with("versions/1.20.1/1.20.1.jar"));
    }

    #[test]
    fn launch_args_carry_memory_account_and_paths() {
        let metadata = test_metadata();
        let options = test_options();
        let args = build_launch_args(&options, &metadata, "cp");

        assert_eq!(args[0], "-Xmx4096M");
        let main_class_at = args
            .iter()
            .position(|a| a == &metadata.main_class)
            .expect("main class present");
        let cp_at = args.iter().position(|a| a == "-cp").unwrap();
        assert!(cp_at < main_class_at, "classpath must precede main class");

        let username_at = args.iter().position(|a| a == "--username").unwrap();
        assert!(username_at > main_class_at, "game args follow main class");
        assert_eq!(args[username_at + 1], "Dev");
        assert!(args.contains(&"--accessToken".to_string()));
        assert!(args.contains(&"token".to_string()));
    }

    #[test]
    fn preflight_accepts_modest_requests_and_rejects_absurd_ones() {
        preflight_memory(1).unwrap();
        // ~4 petabytes; no machine this test runs on has that.
        assert!(preflight_memory(u32::MAX).is_err());
    }
}
