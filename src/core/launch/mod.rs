// ─── Launch ───
// Argument assembly, preflight checks, process spawn and monitoring for
// the game itself.

mod monitor;
mod task;

pub use monitor::{analyze_crash, stop_game};
pub use task::{launch, LaunchOptions, RunningGame};
