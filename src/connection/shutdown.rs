//! Shutdown hook — lets the host's quit path end the session deliberately.
//!
//! Triggering is terminal for the process lifetime: the active session closes
//! with `SHUTDOWN_CLOSE_CODE` and the connection manager stops retrying.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Default)]
struct State {
    triggered: bool,
    session_active: bool,
}

#[derive(Default)]
pub struct ShutdownHandle {
    state: Mutex<State>,
    changed: Condvar,
}

impl ShutdownHandle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Request shutdown and wait up to `wait` for an active session to close.
    /// Returns false if a session was still open when the wait ran out.
    pub fn trigger(&self, wait: Duration) -> bool {
        let mut state = self.lock();
        state.triggered = true;
        self.changed.notify_all();

        if state.session_active {
            tracing::info!("Shutdown requested, closing connection");
        }
        let (state, _) = self
            .changed
            .wait_timeout_while(state, wait, |s| s.session_active)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        !state.session_active
    }

    pub fn is_triggered(&self) -> bool {
        self.lock().triggered
    }

    /// Sleep for `timeout` unless shutdown is triggered first.
    /// Returns true if shutdown was triggered.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let state = self.lock();
        let (state, _) = self
            .changed
            .wait_timeout_while(state, timeout, |s| !s.triggered)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.triggered
    }

    pub(crate) fn arm(&self) {
        self.lock().session_active = true;
    }

    pub(crate) fn disarm(&self) {
        self.lock().session_active = false;
        self.changed.notify_all();
    }
}
