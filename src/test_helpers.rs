//! Shared test utilities — recording host, scripted link and connector, log capture.
//!
//! Available only under `#[cfg(test)]`.

use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::connection::shutdown::ShutdownHandle;
use crate::host::{
    Host, InteractCallback, InteractEvent, MainThreadTask, QuitCallback, ScriptLocation,
    SubscriptionId,
};
use crate::transport::{Connector, Incoming, Link};
use crate::{WarpError, WarpResult};
use tracing_subscriber::fmt::MakeWriter;

// ============================================================================
// FakeHost
// ============================================================================

/// Script operations observed on the host, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Warp(String, u32),
    SetAutoreload(bool),
    Reload,
    Exclude(String),
}

/// In-memory host. The "main thread" is whoever calls `run_main_thread`.
pub struct FakeHost {
    pub developer: AtomicBool,
    pub init_phase: AtomicBool,
    pub autoreload: AtomicBool,
    pub panic_on_warp: AtomicBool,
    pub location: Mutex<Option<ScriptLocation>>,
    game_dir: PathBuf,
    tasks: Mutex<VecDeque<MainThreadTask>>,
    calls: Mutex<Vec<HostCall>>,
    subscribers: Mutex<Vec<(SubscriptionId, InteractCallback)>>,
    quit_callbacks: Mutex<Vec<QuitCallback>>,
    next_id: AtomicU64,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            developer: AtomicBool::new(true),
            init_phase: AtomicBool::new(false),
            autoreload: AtomicBool::new(false),
            panic_on_warp: AtomicBool::new(false),
            location: Mutex::new(None),
            game_dir: PathBuf::from("/projects/novel/game"),
            tasks: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
            quit_callbacks: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn set_location(&self, filename: &str, line: u32) {
        *self.location.lock().unwrap() = Some(ScriptLocation {
            filename: filename.to_string(),
            line,
        });
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    /// Run queued main-thread tasks in FIFO order.
    pub fn run_main_thread(&self) {
        loop {
            let task = self.tasks.lock().unwrap().pop_front();
            match task {
                Some(task) => task(),
                None => break,
            }
        }
    }

    /// Deliver an event to every subscriber. Subscribers may unsubscribe
    /// themselves during delivery.
    pub fn emit(&self, event: &InteractEvent) {
        let subscribers: Vec<InteractCallback> = self
            .subscribers
            .lock()
            .unwrap()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in subscribers {
            callback(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    pub fn quit_callback_count(&self) -> usize {
        self.quit_callbacks.lock().unwrap().len()
    }

    /// Run the quit callbacks, as the host does on application exit.
    pub fn quit(&self) {
        let callbacks = std::mem::take(&mut *self.quit_callbacks.lock().unwrap());
        for callback in callbacks {
            callback();
        }
    }

    fn record(&self, call: HostCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Host for FakeHost {
    fn is_developer_mode(&self) -> bool {
        self.developer.load(Ordering::SeqCst)
    }

    fn is_init_phase(&self) -> bool {
        self.init_phase.load(Ordering::SeqCst)
    }

    fn game_dir(&self) -> PathBuf {
        self.game_dir.clone()
    }

    fn invoke_in_main_thread(&self, task: MainThreadTask) {
        self.tasks.lock().unwrap().push_back(task);
    }

    fn warp_to_line(&self, file: &str, line: u32) {
        if self.panic_on_warp.load(Ordering::SeqCst) {
            panic!("warp failed");
        }
        self.record(HostCall::Warp(file.to_string(), line));
    }

    fn autoreload(&self) -> bool {
        self.autoreload.load(Ordering::SeqCst)
    }

    fn set_autoreload(&self, enabled: bool) {
        self.autoreload.store(enabled, Ordering::SeqCst);
        self.record(HostCall::SetAutoreload(enabled));
    }

    fn reload_script(&self) {
        self.record(HostCall::Reload);
    }

    fn current_location(&self) -> Option<ScriptLocation> {
        self.location.lock().unwrap().clone()
    }

    fn subscribe(&self, callback: InteractCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.subscribers.lock().unwrap().push((id, callback));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.lock().unwrap().retain(|(sid, _)| *sid != id);
    }

    fn on_quit(&self, callback: QuitCallback) {
        self.quit_callbacks.lock().unwrap().push(callback);
    }

    fn exclude_from_build(&self, pattern: &str) {
        self.record(HostCall::Exclude(pattern.to_string()));
    }
}

// ============================================================================
// FakeLink
// ============================================================================

/// What a `FakeLink` observed; shared so tests can inspect it after the link moves.
#[derive(Debug, Default)]
pub struct LinkRecord {
    pub sent: Vec<String>,
    pub closed_with: Option<u16>,
    /// Scripted reads not yet consumed.
    pub remaining: usize,
}

type PollStep = WarpResult<Option<Incoming>>;

/// Link that replays a script of reads. An exhausted script behaves like an
/// idle connection.
pub struct FakeLink {
    script: VecDeque<PollStep>,
    record: Arc<Mutex<LinkRecord>>,
    fail_sends: bool,
    on_poll: Option<Box<dyn FnMut() + Send>>,
}

impl FakeLink {
    pub fn new(script: Vec<PollStep>) -> Self {
        let record = LinkRecord {
            remaining: script.len(),
            ..LinkRecord::default()
        };
        Self {
            script: script.into(),
            record: Arc::new(Mutex::new(record)),
            fail_sends: false,
            on_poll: None,
        }
    }

    pub fn text(s: &str) -> PollStep {
        Ok(Some(Incoming::Text(s.to_string())))
    }

    pub fn closed(code: Option<u16>) -> PollStep {
        Ok(Some(Incoming::Closed { code }))
    }

    pub fn error(msg: &str) -> PollStep {
        Err(WarpError::Io(io::Error::new(io::ErrorKind::ConnectionReset, msg.to_string())))
    }

    pub fn failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    /// Run `f` at the start of every poll.
    pub fn on_poll(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.on_poll = Some(Box::new(f));
        self
    }

    pub fn record(&self) -> Arc<Mutex<LinkRecord>> {
        self.record.clone()
    }
}

impl Link for FakeLink {
    fn send_text(&mut self, text: &str) -> WarpResult<()> {
        if self.fail_sends {
            return Err(WarpError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "send failed")));
        }
        self.record.lock().unwrap().sent.push(text.to_string());
        Ok(())
    }

    fn poll(&mut self) -> WarpResult<Option<Incoming>> {
        if let Some(f) = self.on_poll.as_mut() {
            f();
        }
        let step = self.script.pop_front();
        self.record.lock().unwrap().remaining = self.script.len();
        match step {
            Some(step) => step,
            None => {
                std::thread::sleep(Duration::from_millis(1));
                Ok(None)
            }
        }
    }

    fn close(&mut self, code: u16, _reason: &str) -> WarpResult<()> {
        self.record.lock().unwrap().closed_with = Some(code);
        Ok(())
    }
}

// ============================================================================
// FakeConnector
// ============================================================================

pub enum ConnectStep {
    Refuse,
    Fail,
    Accept(FakeLink),
}

/// Replays one step per connection attempt; refuses once the script runs out.
pub struct FakeConnector {
    steps: VecDeque<ConnectStep>,
    attempts: Arc<Mutex<Vec<u16>>>,
    stop_after: Option<(usize, Arc<ShutdownHandle>)>,
}

impl FakeConnector {
    pub fn new(steps: Vec<ConnectStep>) -> Self {
        Self {
            steps: steps.into(),
            attempts: Arc::new(Mutex::new(Vec::new())),
            stop_after: None,
        }
    }

    /// Trigger `shutdown` on the `n`th attempt.
    pub fn stop_after(mut self, n: usize, shutdown: Arc<ShutdownHandle>) -> Self {
        self.stop_after = Some((n, shutdown));
        self
    }

    pub fn attempts(&self) -> Arc<Mutex<Vec<u16>>> {
        self.attempts.clone()
    }
}

impl Connector for FakeConnector {
    type Conn = FakeLink;

    fn connect(&mut self, port: u16) -> WarpResult<FakeLink> {
        let count = {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push(port);
            attempts.len()
        };
        if let Some((n, shutdown)) = &self.stop_after {
            if count >= *n {
                shutdown.trigger(Duration::ZERO);
            }
        }

        match self.steps.pop_front() {
            Some(ConnectStep::Accept(link)) => Ok(link),
            Some(ConnectStep::Fail) => Err(WarpError::Handshake("HTTP error: 403 Forbidden".into())),
            Some(ConnectStep::Refuse) | None => Err(WarpError::ConnectionRefused { port }),
        }
    }
}

// ============================================================================
// CapturedLogs
// ============================================================================

/// Collects formatted tracing output for assertions.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    buf: Arc<Mutex<Vec<u8>>>,
}

pub struct CapturedWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for CapturedWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CapturedWriter {
            buf: self.buf.clone(),
        }
    }
}

impl CapturedLogs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with a subscriber writing into this buffer on the current thread.
    pub fn capture<R>(&self, f: impl FnOnce() -> R) -> R {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();
        tracing::subscriber::with_default(subscriber, f)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock().unwrap()).into_owned()
    }
}
