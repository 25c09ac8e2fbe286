// ─── Java Runtime Cache ───
// The release server ships a known-good JRE as a zip archive. We keep one
// extracted copy under `<data>/runtime` and reuse it for every launch
// instead of trusting whatever Java the host happens to have.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{info, warn};

use crate::core::downloader::Downloader;
use crate::core::error::{LauncherError, LauncherResult};

const RUNTIME_DIR: &str = "runtime";
const RUNTIME_ARCHIVE: &str = "runtime.zip";

fn java_binary_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "java.exe"
    } else {
        "java"
    }
}

/// Locate the `java` binary inside an extracted runtime directory.
///
/// Archives differ in whether `bin/` sits at the root or under a single
/// vendor directory, so both layouts are accepted.
fn find_java_binary(runtime_root: &Path) -> Option<PathBuf> {
    let direct = runtime_root.join("bin").join(java_binary_name());
    if direct.is_file() {
        return Some(direct);
    }

    let entries = std::fs::read_dir(runtime_root).ok()?;
    for entry in entries.flatten() {
        let nested = entry.path().join("bin").join(java_binary_name());
        if nested.is_file() {
            return Some(nested);
        }
    }

    None
}

/// Spot-check that a binary actually runs as a JVM.
pub fn is_usable_java_binary(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }

    Command::new(path)
        .arg("-version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// The cached runtime's `java` binary, if a usable one is present.
pub async fn cached_java(data_dir: &Path) -> Option<PathBuf> {
    let runtime_root = data_dir.join(RUNTIME_DIR);
    let candidate = find_java_binary(&runtime_root)?;

    let probe = candidate.clone();
    let usable = tokio::task::spawn_blocking(move || is_usable_java_binary(&probe))
        .await
        .unwrap_or(false);

    usable.then_some(candidate)
}

/// Return the cached runtime, downloading and extracting the release
/// server's archive first when the cache is empty or broken.
pub async fn ensure_runtime(
    data_dir: &Path,
    archive_url: &str,
    downloader: &Downloader,
) -> LauncherResult<PathBuf> {
    if let Some(java) = cached_java(data_dir).await {
        return Ok(java);
    }

    let runtime_root = data_dir.join(RUNTIME_DIR);
    let archive_path = data_dir.join(RUNTIME_ARCHIVE);

    info!("Java runtime not cached, downloading from {}", archive_url);
    downloader
        .download_file(archive_url, &archive_path, None)
        .await?;

    // Extract on a blocking thread; the zip crate is synchronous.
    let extract_archive = archive_path.clone();
    let extract_target = runtime_root.clone();
    tokio::task::spawn_blocking(move || extract_zip(&extract_archive, &extract_target))
        .await
        .map_err(|e| LauncherError::JavaRuntime(format!("extraction task failed: {e}")))??;

    if let Err(e) = tokio::fs::remove_file(&archive_path).await {
        warn!("Could not remove runtime archive {:?}: {}", archive_path, e);
    }

    let java = find_java_binary(&runtime_root).ok_or_else(|| {
        LauncherError::JavaRuntime(format!(
            "extracted runtime at {:?} contains no java binary",
            runtime_root
        ))
    })?;

    let probe = java.clone();
    let usable = tokio::task::spawn_blocking(move || is_usable_java_binary(&probe))
        .await
        .unwrap_or(false);
    if !usable {
        return Err(LauncherError::JavaRuntime(format!(
            "downloaded runtime at {:?} does not execute",
            java
        )));
    }

    info!("Java runtime ready at {:?}", java);
    Ok(java)
}

fn extract_zip(archive: &Path, target: &Path) -> LauncherResult<()> {
    let file = std::fs::File::open(archive).map_err(|source| LauncherError::Io {
        path: archive.to_path_buf(),
        source,
    })?;
    let mut zip = zip::ZipArchive::new(file)?;

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;

        // Reject entries that would escape the target directory.
        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping unsafe zip entry: {}", entry.name());
            continue;
        };
        let dest = target.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&dest).map_err(|source| LauncherError::Io {
                path: dest.clone(),
                source,
            })?;
            continue;
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|source| LauncherError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut out = std::fs::File::create(&dest).map_err(|source| LauncherError::Io {
            path: dest.clone(),
            source,
        })?;
        std::io::copy(&mut entry, &mut out).map_err(|source| LauncherError::Io {
            path: dest.clone(),
            source,
        })?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&dest, std::fs::Permissions::from_mode(mode));
        }
    }

    Ok(())
}
