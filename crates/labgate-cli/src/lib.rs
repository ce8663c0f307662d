//! labgate CLI: configuration, command handlers and logging setup
pub mod cli;
pub mod config;

pub use cli::{cmd_check, cmd_purge, cmd_run, render_report, write_report, RunOptions};
pub use config::GateConfig;

use labgate_core::CancelToken;
use tracing_subscriber::EnvFilter;

/// Exit status after a second Ctrl-C
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// Let the running stage finish; skip the rest
    Cancel,
    /// Stop now
    Abort,
}

/// The first interrupt cancels the run; any later one aborts the process.
pub fn on_interrupt(count: usize, cancel: &CancelToken) -> InterruptAction {
    if count <= 1 && !cancel.is_cancelled() {
        cancel.cancel();
        InterruptAction::Cancel
    } else {
        InterruptAction::Abort
    }
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `--verbose`.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A second init (tests) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
