// ─── Process Monitor ───
// Streams game output as events, watches for exit and classifies crashes.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Child;
use tracing::{error, info, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::events::{EventBus, LauncherEvent};
use crate::core::registry::{ErrorCode, ErrorRegistry, ErrorReport};

fn stderr_level(line: &str) -> &'static str {
    if line.contains("ERROR") || line.contains("Exception") || line.contains("FATAL") {
        "error"
    } else {
        "warn"
    }
}

/// Forward the child's stdout and stderr as `GameLog` events.
pub fn stream_output(child: &mut Child, events: EventBus) {
    if let Some(stdout) = child.stdout.take() {
        let events = events.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                events.emit(LauncherEvent::GameLog {
                    level: "info".into(),
                    message: line,
                });
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                events.emit(LauncherEvent::GameLog {
                    level: stderr_level(&line).into(),
                    message: line,
                });
            }
        });
    }
}

/// Wait for the game to exit on a background task.
///
/// Emits `GameExited`; an abnormal exit additionally records
/// `MC_LAUNCH_FAILED` with whatever the crash report says.
pub fn watch_exit(
    mut child: Child,
    game_dir: PathBuf,
    events: EventBus,
    errors: Arc<ErrorRegistry>,
) {
    tokio::spawn(async move {
        let status = match child.wait().await {
            Ok(status) => status,
            Err(e) => {
                error!("Failed waiting for the game process: {}", e);
                return;
            }
        };

        let exit_code = status.code();
        let crashed = !status.success();
        events.emit(LauncherEvent::GameExited { exit_code, crashed });

        if !crashed {
            info!("Game exited normally");
            return;
        }

        warn!("Game exited abnormally with status {:?}", exit_code);
        let message = match analyze_crash(&game_dir).await {
            Some(description) => description,
            None => match exit_code {
                Some(code) => format!("The game exited with code {}", code),
                None => "The game was terminated externally".to_string(),
            },
        };
        errors.record(ErrorReport::new(ErrorCode::McLaunchFailed, message));
    });
}

/// Pull a human-readable description out of the newest crash report.
pub async fn analyze_crash(game_dir: &Path) -> Option<String> {
    let crash_dir = game_dir.join("crash-reports");
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;

    let mut entries = tokio::fs::read_dir(&crash_dir).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "txt") {
            if let Ok(modified) = entry.metadata().await.and_then(|m| m.modified()) {
                if newest.as_ref().map_or(true, |(ts, _)| modified > *ts) {
                    newest = Some((modified, path));
                }
            }
        }
    }

    let (_, report_path) = newest?;
    let content = tokio::fs::read_to_string(&report_path).await.ok()?;

    let description = content
        .lines()
        .find_map(|line| line.trim().strip_prefix("Description:"))
        .map(str::trim)
        .filter(|desc| !desc.is_empty())
        .unwrap_or("See the crash report for details");

    let file_name = report_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    Some(format!("Game crashed: {} ({})", description, file_name))
}

/// Stop a running game: polite termination first, then force.
pub fn stop_game(pid: u32) -> LauncherResult<()> {
    #[cfg(target_os = "windows")]
    {
        let status = Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/T", "/F"])
            .status()
            .map_err(|e| LauncherError::Other(format!("cannot terminate process {pid}: {e}")))?;

        if !status.success() {
            return Err(LauncherError::Other(format!(
                "taskkill for process {pid} returned {:?}",
                status.code()
            )));
        }

        Ok(())
    }

    #[cfg(not(target_os = "windows"))]
    {
        let graceful = Command::new("kill")
            .args(["-15", &pid.to_string()])
            .status()
            .map_err(|e| LauncherError::Other(format!("cannot signal process {pid}: {e}")))?;

        if graceful.success() {
            std::thread::sleep(std::time::Duration::from_millis(300));
            let check = Command::new("kill").args(["-0", &pid.to_string()]).status();
            if matches!(check, Ok(status) if !status.success()) {
                return Ok(());
            }
        }

        let force = Command::new("kill")
            .args(["-9", &pid.to_string()])
            .status()
            .map_err(|e| LauncherError::Other(format!("cannot terminate process {pid}: {e}")))?;

        if !force.success() {
            return Err(LauncherError::Other(format!(
                "kill -9 for process {pid} returned {:?}",
                force.code()
            )));
        }

        Ok(())
    }
}
