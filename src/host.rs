//! Host collaborator interface.
//!
//! The host is the script-driven application the agent lives in. It owns a
//! single main thread with all script state; everything here is called either
//! from that thread (interaction callbacks, scheduled tasks) or from the
//! agent's background worker (lifecycle checks, scheduling, subscriptions).

use std::path::PathBuf;
use std::sync::Arc;

/// Work handed to the host's main thread.
pub type MainThreadTask = Box<dyn FnOnce() + Send + 'static>;

/// Invoked synchronously on the main thread for every interaction event.
pub type InteractCallback = Arc<dyn Fn(&InteractEvent) + Send + Sync + 'static>;

/// Invoked on the main thread when the application quits.
pub type QuitCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// Handle for removing an interaction callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Kind of interaction event reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Display of a new statement begins — the location has settled.
    Begin,
    Show,
    ShowDone,
    SlowDone,
    End,
    Other(String),
}

/// One host interaction event with its positional context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractEvent {
    pub kind: EventKind,
    /// False for events that do not pause for the user.
    pub interact: bool,
    /// Text being displayed, when the host provides it.
    pub what: Option<String>,
    pub start: Option<u32>,
    pub end: Option<u32>,
}

impl InteractEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            interact: true,
            what: None,
            start: None,
            end: None,
        }
    }

    pub fn begin() -> Self {
        Self::new(EventKind::Begin)
    }

    pub fn non_interactive(mut self) -> Self {
        self.interact = false;
        self
    }

    pub fn with_text(mut self, what: &str, start: Option<u32>, end: Option<u32>) -> Self {
        self.what = Some(what.to_string());
        self.start = start;
        self.end = end;
        self
    }
}

/// Current script position as the host reports it (path relative to the
/// project, e.g. `game/script.rpy`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLocation {
    pub filename: String,
    pub line: u32,
}

/// Everything the agent needs from its host application.
///
/// Implementations must tolerate `unsubscribe` being called from inside an
/// interaction callback, and repeated `unsubscribe` of the same id.
pub trait Host: Send + Sync {
    // --- lifecycle ---
    fn is_developer_mode(&self) -> bool;
    /// True while the host is still starting up and main-thread hand-off is unsafe.
    fn is_init_phase(&self) -> bool;
    /// Absolute path of the game content directory.
    fn game_dir(&self) -> PathBuf;

    // --- main thread ---
    /// Queue `task` on the main thread. Must not block the caller.
    fn invoke_in_main_thread(&self, task: MainThreadTask);

    // --- script operations (main thread only) ---
    fn warp_to_line(&self, file: &str, line: u32);
    fn autoreload(&self) -> bool;
    fn set_autoreload(&self, enabled: bool);
    fn reload_script(&self);
    fn current_location(&self) -> Option<ScriptLocation>;

    // --- events ---
    fn subscribe(&self, callback: InteractCallback) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId);
    fn on_quit(&self, callback: QuitCallback);

    // --- build ---
    /// Exclude files matching `pattern` from distributable builds.
    fn exclude_from_build(&self, pattern: &str);
}
