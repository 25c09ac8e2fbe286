// ─── Error Registry ───
// Session-wide store of the errors currently shown to the user. Subsystems
// classify their failures into an `ErrorCode`, attach a human message and a
// retry flag, and record them here; the UI renders the snapshot and offers
// a retry affordance when `retryable` is set. This is the terminal sink for
// already-classified failures — nothing propagates past it.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::LauncherError;
use crate::core::events::{EventBus, LauncherEvent};

/// Closed set of failure categories the launcher surfaces to the user.
/// The serialized form is what the companion web UI matches on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NetworkOffline,
    AuthFailed,
    McInstallFailed,
    McLaunchFailed,
    ModpackUpdateFailed,
    JavaRuntimeFailed,
    Unknown,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCode::NetworkOffline => "NETWORK_OFFLINE",
            ErrorCode::AuthFailed => "AUTH_FAILED",
            ErrorCode::McInstallFailed => "MC_INSTALL_FAILED",
            ErrorCode::McLaunchFailed => "MC_LAUNCH_FAILED",
            ErrorCode::ModpackUpdateFailed => "MODPACK_UPDATE_FAILED",
            ErrorCode::JavaRuntimeFailed => "JAVA_RUNTIME_FAILED",
            ErrorCode::Unknown => "UNKNOWN",
        };
        write!(f, "{}", name)
    }
}

/// Construction options for [`ErrorReport`].
///
/// `retryable` marks the failed operation as safe to attempt again without
/// further remediation. Defaults to `false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOptions {
    pub retryable: bool,
}

/// One active error as shown to the user. Immutable once constructed;
/// `code` and `message` are preserved verbatim (localization and layout
/// are presentation concerns, not ours).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
    pub retryable: bool,
    pub recorded_at: DateTime<Utc>,
}

impl ErrorReport {
    /// Build a report with default options (`retryable: false`).
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::with_options(code, message, ReportOptions::default())
    }

    pub fn with_options(
        code: ErrorCode,
        message: impl Into<String>,
        options: ReportOptions,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            retryable: options.retryable,
            recorded_at: Utc::now(),
        }
    }

    /// Classify an internal failure under `code`, carrying its display
    /// message and the error's own retry hint.
    pub fn from_failure(code: ErrorCode, error: &LauncherError) -> Self {
        Self::with_options(
            code,
            error.to_string(),
            ReportOptions {
                retryable: error.retry_hint(),
            },
        )
    }
}

/// Ordered collection of the errors currently active in this session.
///
/// Insertion order is significant: oldest first, most recent last. At most
/// one entry exists per `ErrorCode` — recording a code that is already
/// present replaces the stale entry and moves the code to the back. That
/// keeps the UI list stable and makes "dismiss this error" unambiguous.
///
/// All operations are synchronous and non-blocking. The registry is shared
/// across tokio tasks, so mutation goes through a `std::sync::Mutex`; no
/// lock is held across an await point anywhere in this crate.
#[derive(Debug)]
pub struct ErrorRegistry {
    entries: Mutex<Vec<ErrorReport>>,
    events: Option<EventBus>,
}

impl ErrorRegistry {
    /// A detached registry, useful for tests and tools without a UI.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            events: None,
        }
    }

    /// A registry that publishes `ActiveErrorsChanged` after every mutation.
    pub fn with_events(events: EventBus) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            events: Some(events),
        }
    }

    /// Record an error. Replaces any existing entry with the same code.
    pub fn record(&self, report: ErrorReport) {
        debug!("Recording launcher error {}: {}", report.code, report.message);
        let snapshot = {
            let mut entries = self.entries.lock().expect("error registry poisoned");
            entries.retain(|existing| existing.code != report.code);
            entries.push(report);
            entries.clone()
        };
        self.publish(snapshot);
    }

    /// Classify `error` under `code` and record it in one step.
    pub fn record_failure(&self, code: ErrorCode, error: &LauncherError) {
        self.record(ErrorReport::from_failure(code, error));
    }

    /// Remove every entry with the given code. No-op when none match.
    pub fn clear(&self, code: ErrorCode) {
        let snapshot = {
            let mut entries = self.entries.lock().expect("error registry poisoned");
            let before = entries.len();
            entries.retain(|existing| existing.code != code);
            if entries.len() == before {
                return;
            }
            entries.clone()
        };
        self.publish(snapshot);
    }

    /// Empty the registry unconditionally.
    pub fn clear_all(&self) {
        let changed = {
            let mut entries = self.entries.lock().expect("error registry poisoned");
            let had_entries = !entries.is_empty();
            entries.clear();
            had_entries
        };
        if changed {
            self.publish(Vec::new());
        }
    }

    /// Exact, ordered copy of the current error list.
    pub fn snapshot(&self) -> Vec<ErrorReport> {
        self.entries.lock().expect("error registry poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("error registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn publish(&self, active: Vec<ErrorReport>) {
        if let Some(events) = &self.events {
            events.emit(LauncherEvent::ActiveErrorsChanged { active });
        }
    }
}

impl Default for ErrorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_preserves_code_and_message_verbatim() {
        let report = ErrorReport::new(ErrorCode::AuthFailed, "Login failed");
        assert_eq!(report.code, ErrorCode::AuthFailed);
        assert_eq!(report.message, "Login failed");
    }

    #[test]
    fn retryable_defaults_to_false_and_honors_options() {
        let report = ErrorReport::new(ErrorCode::NetworkOffline, "offline");
        assert!(!report.retryable);

        let report = ErrorReport::with_options(
            ErrorCode::NetworkOffline,
            "offline",
            ReportOptions { retryable: true },
        );
        assert!(report.retryable);
    }

    #[test]
    fn record_appends_to_an_empty_registry() {
        let registry = ErrorRegistry::new();
        registry.record(ErrorReport::new(ErrorCode::McInstallFailed, "disk full"));

        let active = registry.snapshot();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].code, ErrorCode::McInstallFailed);
        assert_eq!(active[0].message, "disk full");
    }

    #[test]
    fn clear_removes_all_entries_for_a_code() {
        let registry = ErrorRegistry::new();
        registry.record(ErrorReport::new(ErrorCode::AuthFailed, "token expired"));
        assert_eq!(registry.len(), 1);

        registry.clear(ErrorCode::AuthFailed);
        assert!(registry.is_empty());
    }

    #[test]
    fn clear_on_absent_code_is_a_no_op() {
        let registry = ErrorRegistry::new();
        registry.record(ErrorReport::new(ErrorCode::Unknown, "something"));

        registry.clear(ErrorCode::NetworkOffline);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn clear_all_empties_regardless_of_contents() {
        let registry = ErrorRegistry::new();
        registry.record(ErrorReport::new(ErrorCode::NetworkOffline, "offline"));
        registry.record(ErrorReport::new(ErrorCode::AuthFailed, "bad token"));
        registry.record(ErrorReport::new(ErrorCode::McLaunchFailed, "crash"));

        registry.clear_all();
        assert!(registry.is_empty());
    }

    #[test]
    fn recording_a_duplicate_code_replaces_and_moves_to_back() {
        let registry = ErrorRegistry::new();
        registry.record(ErrorReport::new(ErrorCode::NetworkOffline, "first probe"));
        registry.record(ErrorReport::new(ErrorCode::AuthFailed, "bad token"));
        registry.record(ErrorReport::new(ErrorCode::NetworkOffline, "second probe"));

        let active = registry.snapshot();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].code, ErrorCode::AuthFailed);
        assert_eq!(active[1].code, ErrorCode::NetworkOffline);
        assert_eq!(active[1].message, "second probe");
    }

    #[test]
    fn snapshot_reflects_the_full_add_clear_sequence() {
        let registry = ErrorRegistry::new();

        registry.record(ErrorReport::with_options(
            ErrorCode::AuthFailed,
            "Login failed",
            ReportOptions { retryable: true },
        ));
        assert_eq!(registry.len(), 1);

        registry.clear(ErrorCode::AuthFailed);
        assert_eq!(registry.len(), 0);

        registry.record(ErrorReport::new(ErrorCode::McLaunchFailed, "Crash"));
        registry.clear_all();
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn from_failure_carries_the_retry_hint() {
        let transient = LauncherError::DownloadFailed {
            url: "https://example.com/mods.zip".into(),
            status: 502,
        };
        let report = ErrorReport::from_failure(ErrorCode::ModpackUpdateFailed, &transient);
        assert!(report.retryable);
        assert!(report.message.contains("502"));

        let permanent = LauncherError::AuthDeclined("no entitlement".into());
        let report = ErrorReport::from_failure(ErrorCode::AuthFailed, &permanent);
        assert!(!report.retryable);
    }

    #[tokio::test]
    async fn mutations_publish_the_post_mutation_snapshot() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let registry = ErrorRegistry::with_events(bus);

        registry.record(ErrorReport::new(ErrorCode::NetworkOffline, "offline"));
        match rx.recv().await.unwrap() {
            LauncherEvent::ActiveErrorsChanged { active } => {
                assert_eq!(active.len(), 1);
                assert_eq!(active[0].code, ErrorCode::NetworkOffline);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        registry.clear_all();
        match rx.recv().await.unwrap() {
            LauncherEvent::ActiveErrorsChanged { active } => assert!(active.is_empty()),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn error_code_serializes_in_wire_form() {
        let json = serde_json::to_string(&ErrorCode::McLaunchFailed).unwrap();
        assert_eq!(json, "\"MC_LAUNCH_FAILED\"");
        let code: ErrorCode = serde_json::from_str("\"NETWORK_OFFLINE\"").unwrap();
        assert_eq!(code, ErrorCode::NetworkOffline);
    }
}
