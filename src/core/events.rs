// ─── Event Bus ───
// Progress, log and state-change notifications for whatever shell embeds
// this crate. Emission is fire-and-forget: events published while nobody
// is subscribed are dropped, never buffered.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::core::registry::ErrorReport;

const CHANNEL_CAPACITY: usize = 256;

/// Everything the backend reports to the UI while it works.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LauncherEvent {
    DownloadProgress {
        file_name: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },
    InstallStage {
        stage: String,
        current: u64,
        total: u64,
        message: String,
    },
    GameLog {
        level: String,
        message: String,
    },
    GameExited {
        exit_code: Option<i32>,
        crashed: bool,
    },
    /// Snapshot of the error registry after every mutation.
    ActiveErrorsChanged {
        active: Vec<ErrorReport>,
    },
}

/// Broadcast channel shared by every subsystem.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LauncherEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LauncherEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. A send error only means there are no
    /// subscribers right now, which is fine.
    pub fn emit(&self, event: LauncherEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
