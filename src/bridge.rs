//! Main-Thread Execution Bridge.
//!
//! Hands script actions to the host's main thread. Dispatch is at-most-once
//! and unacknowledged: nothing flows back to the caller, and a failed action
//! is only logged. Waiting out the host's init phase happens here, on the
//! calling (background) thread, never on the main thread.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use crate::host::Host;

/// A script operation to run on the host's main thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostAction {
    WarpToLine { file: String, line: u32 },
    /// Turn autoreload on and reload, unless it is already on.
    EnableAutoreload,
    Reload,
}

impl HostAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::WarpToLine { .. } => "warp_to_line",
            Self::EnableAutoreload => "set_autoreload",
            Self::Reload => "reload",
        }
    }

    /// Apply the action. Main thread only.
    pub fn apply(&self, host: &dyn Host) {
        match self {
            Self::WarpToLine { file, line } => host.warp_to_line(file, *line),
            Self::EnableAutoreload => {
                if !host.autoreload() {
                    host.set_autoreload(true);
                    host.reload_script();
                }
            }
            Self::Reload => host.reload_script(),
        }
    }
}

#[derive(Clone)]
pub struct ExecutionBridge {
    host: Arc<dyn Host>,
    poll_interval: Duration,
}

impl ExecutionBridge {
    pub fn new(host: Arc<dyn Host>, poll_interval: Duration) -> Self {
        Self {
            host,
            poll_interval,
        }
    }

    /// Schedule `action` on the main thread and return without waiting for it.
    ///
    /// Blocks the caller only while the host is in its init phase.
    pub fn execute(&self, action: HostAction) {
        let mut waited = false;
        while self.host.is_init_phase() {
            if !waited {
                tracing::info!(action = action.name(), "Host in init phase, waiting...");
                waited = true;
            }
            std::thread::sleep(self.poll_interval);
        }

        tracing::debug!(action = ?action, "Scheduling on main thread");
        let host = self.host.clone();
        self.host.invoke_in_main_thread(Box::new(move || {
            // A panic here would unwind through the host's main loop
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| action.apply(&*host)));
            if outcome.is_err() {
                tracing::error!(action = action.name(), "Host action panicked, ignored");
            }
        }));
    }
}
