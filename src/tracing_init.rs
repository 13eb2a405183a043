//! Tracing initialization for embedders and the CLI harness.
//!
//! The library itself only emits events; whoever owns the process installs
//! a subscriber once, through one of these helpers or their own.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

/// Default log location: `{data_local_dir}/warp-agent/agent.log`.
pub fn default_log_path() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".local")
            .join("share")
    });
    base.join("warp-agent").join("agent.log")
}

/// Initialize tracing to `log_path` (append mode).
///
/// Filter comes from `RUST_LOG`, defaulting to `info`. Returns an error if the
/// file cannot be opened; a subscriber already installed is left in place.
pub fn init_file_tracing(log_path: &Path) -> std::io::Result<()> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Append: the host may restart the agent many times per session.
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(default_filter())
        .with_writer(Mutex::new(log_file))
        .with_target(true)
        .with_ansi(false)
        .try_init();
    Ok(())
}

/// Initialize tracing to stderr, used by the CLI harness.
pub fn init_stderr_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(default_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
