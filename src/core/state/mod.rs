mod session;

pub use session::{LauncherSession, LauncherSettings};
