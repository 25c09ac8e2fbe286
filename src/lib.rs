pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::auth::{DeviceCodeInfo, MinecraftProfile};
pub use crate::core::error::{LauncherError, LauncherResult};
pub use crate::core::events::{EventBus, LauncherEvent};
pub use crate::core::registry::{ErrorCode, ErrorRegistry, ErrorReport, ReportOptions};
pub use crate::core::state::{LauncherSession, LauncherSettings};

/// Initialize structured logging for whatever binary embeds the crate.
///
/// Honors `RUST_LOG` when set; otherwise keeps the backend at debug and
/// everything else at info.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,wowid3_core=debug")),
        )
        .init();

    tracing::info!("WOWID3 launcher core starting...");
}
