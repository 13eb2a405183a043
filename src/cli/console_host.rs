//! Headless host for the `run` subcommand.
//!
//! The thread that calls [`ConsoleHost::run_main_loop`] is the host main
//! thread. Scheduled tasks, stdin location lines and quit requests are all
//! delivered to it through one channel.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use warp_agent::host::{
    Host, InteractCallback, InteractEvent, MainThreadTask, QuitCallback, ScriptLocation,
    SubscriptionId,
};

const SIGNAL_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Unit of work for the main thread.
pub enum MainWork {
    Task(MainThreadTask),
    /// Player reached `filename:line`.
    Reached(ScriptLocation),
}

pub struct ConsoleHost {
    game_dir: PathBuf,
    work: Mutex<Sender<MainWork>>,
    init_phase: AtomicBool,
    autoreload: AtomicBool,
    location: Mutex<Option<ScriptLocation>>,
    subscribers: Mutex<Vec<(SubscriptionId, InteractCallback)>>,
    quit_callbacks: Mutex<Vec<QuitCallback>>,
    next_id: AtomicU64,
}

impl ConsoleHost {
    pub fn new(game_dir: PathBuf) -> (Arc<Self>, Receiver<MainWork>) {
        let (tx, rx) = channel();
        let host = Arc::new(Self {
            game_dir,
            work: Mutex::new(tx),
            init_phase: AtomicBool::new(true),
            autoreload: AtomicBool::new(false),
            location: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
            quit_callbacks: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        });
        (host, rx)
    }

    pub fn sender(&self) -> Sender<MainWork> {
        lock(&self.work).clone()
    }

    /// Serve main-thread work until `quit` is raised, then run the quit callbacks.
    pub fn run_main_loop(&self, work: Receiver<MainWork>, quit: &AtomicBool) {
        self.init_phase.store(false, Ordering::SeqCst);
        tracing::info!("Console host ready");

        while !quit.load(Ordering::SeqCst) {
            match work.recv_timeout(SIGNAL_CHECK_INTERVAL) {
                Ok(MainWork::Task(task)) => task(),
                Ok(MainWork::Reached(location)) => self.reach(location),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        tracing::info!("Console host quitting");
        let callbacks = std::mem::take(&mut *lock(&self.quit_callbacks));
        for callback in callbacks {
            callback();
        }
    }

    fn reach(&self, location: ScriptLocation) {
        tracing::debug!(file = %location.filename, line = location.line, "Reached");
        *lock(&self.location) = Some(location);

        let event = InteractEvent::begin();
        let subscribers: Vec<InteractCallback> =
            lock(&self.subscribers).iter().map(|(_, cb)| cb.clone()).collect();
        for callback in subscribers {
            callback(&event);
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Parse a stdin line of the form `<path>:<line>`.
pub fn parse_location(line: &str) -> Option<ScriptLocation> {
    let (filename, number) = line.trim().rsplit_once(':')?;
    if filename.is_empty() {
        return None;
    }
    let line = number.trim().parse::<u32>().ok()?;
    Some(ScriptLocation {
        filename: filename.to_string(),
        line,
    })
}

impl Host for ConsoleHost {
    fn is_developer_mode(&self) -> bool {
        true
    }

    fn is_init_phase(&self) -> bool {
        self.init_phase.load(Ordering::SeqCst)
    }

    fn game_dir(&self) -> PathBuf {
        self.game_dir.clone()
    }

    fn invoke_in_main_thread(&self, task: MainThreadTask) {
        if lock(&self.work).send(MainWork::Task(task)).is_err() {
            tracing::debug!("Main loop gone, task dropped");
        }
    }

    fn warp_to_line(&self, file: &str, line: u32) {
        tracing::info!(file, line, "Warp to line");
        *lock(&self.location) = Some(ScriptLocation {
            filename: file.to_string(),
            line,
        });
    }

    fn autoreload(&self) -> bool {
        self.autoreload.load(Ordering::SeqCst)
    }

    fn set_autoreload(&self, enabled: bool) {
        self.autoreload.store(enabled, Ordering::SeqCst);
        tracing::info!(enabled, "Autoreload set");
    }

    fn reload_script(&self) {
        tracing::info!("Script reload requested");
    }

    fn current_location(&self) -> Option<ScriptLocation> {
        lock(&self.location).clone()
    }

    fn subscribe(&self, callback: InteractCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        lock(&self.subscribers).push((id, callback));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        lock(&self.subscribers).retain(|(sid, _)| *sid != id);
    }

    fn on_quit(&self, callback: QuitCallback) {
        lock(&self.quit_callbacks).push(callback);
    }

    fn exclude_from_build(&self, pattern: &str) {
        tracing::debug!(pattern, "Build exclusion registered");
    }
}
