//! Location Reporter — turns host interaction events into `current_line`
//! messages for the peer.
//!
//! Runs on the host's main thread (inside the interaction callback), so it
//! never touches the socket: serialized messages go into the session's bounded
//! outbound queue and the background worker writes them. One reporter exists
//! per connection; its first-event suppression and last-sent cache die with it.

use std::panic::AssertUnwindSafe;
use std::sync::mpsc::{SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::host::{EventKind, Host, InteractEvent, SubscriptionId};
use crate::path_utils;
use crate::protocol::OutboundMessage;

/// What happened to a single event. Mostly useful for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Not an interactive "location settled" event.
    Ignored,
    /// First qualifying event on this connection.
    SkippedFirst,
    /// Host had no current script location.
    NoLocation,
    /// Byte-identical to the last message sent on this connection.
    Duplicate,
    Sent,
    /// Outbound queue full; message dropped.
    Dropped,
    /// Connection is gone; the reporter has unsubscribed itself.
    Detached,
}

#[derive(Default)]
struct ReporterState {
    seen_first: bool,
    last_sent: Option<String>,
}

enum Subscription {
    Pending,
    Active(SubscriptionId),
    Detached,
}

pub struct LocationReporter {
    host: Arc<dyn Host>,
    outbound: SyncSender<String>,
    state: Mutex<ReporterState>,
    subscription: Mutex<Subscription>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl LocationReporter {
    /// Create an unattached reporter. Events must be fed through `handle_event`.
    pub fn new(host: Arc<dyn Host>, outbound: SyncSender<String>) -> Arc<Self> {
        Arc::new(Self {
            host,
            outbound,
            state: Mutex::new(ReporterState::default()),
            subscription: Mutex::new(Subscription::Pending),
        })
    }

    /// Create a reporter and subscribe it to the host's interaction events.
    ///
    /// The host only holds a weak reference; the caller keeps the reporter
    /// alive for the lifetime of the connection.
    pub fn attach(host: Arc<dyn Host>, outbound: SyncSender<String>) -> Arc<Self> {
        let reporter = Self::new(host.clone(), outbound);
        let weak: Weak<Self> = Arc::downgrade(&reporter);

        let id = host.subscribe(Arc::new(move |event: &InteractEvent| {
            let Some(reporter) = weak.upgrade() else {
                return;
            };
            // Never unwind into the host's event dispatch
            if std::panic::catch_unwind(AssertUnwindSafe(|| reporter.handle_event(event))).is_err() {
                tracing::error!("Location reporter panicked, event ignored");
            }
        }));

        let mut slot = lock(&reporter.subscription);
        match *slot {
            // Torn down before subscribe returned
            Subscription::Detached => host.unsubscribe(id),
            _ => *slot = Subscription::Active(id),
        }
        drop(slot);

        tracing::debug!(subscription = id.0, "Location reporter attached");
        reporter
    }

    /// Remove the host callback. Idempotent.
    pub fn detach(&self) {
        let previous = std::mem::replace(&mut *lock(&self.subscription), Subscription::Detached);
        if let Subscription::Active(id) = previous {
            self.host.unsubscribe(id);
            tracing::debug!(subscription = id.0, "Location reporter detached");
        }
    }

    pub fn is_attached(&self) -> bool {
        matches!(*lock(&self.subscription), Subscription::Active(_))
    }

    /// Process one interaction event.
    pub fn handle_event(&self, event: &InteractEvent) -> ReportOutcome {
        if !event.interact || event.kind != EventKind::Begin {
            return ReportOutcome::Ignored;
        }

        let mut state = lock(&self.state);
        if !state.seen_first {
            // Reflects startup state from before the peer connected
            state.seen_first = true;
            return ReportOutcome::SkippedFirst;
        }

        let Some(location) = self.host.current_location() else {
            tracing::debug!("No current script location, nothing to report");
            return ReportOutcome::NoLocation;
        };

        let relative = path_utils::game_relative(&location.filename);
        let absolute = self.host.game_dir().join(&relative);
        let message = OutboundMessage::CurrentLine {
            line: location.line,
            path: path_utils::to_posix(&absolute),
            relative_path: path_utils::to_posix(&relative),
            what: event.what.clone(),
            start: event.start,
            end: event.end,
        };

        let body = match message.to_json() {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize location");
                return ReportOutcome::Dropped;
            }
        };

        if state.last_sent.as_deref() == Some(body.as_str()) {
            return ReportOutcome::Duplicate;
        }

        match self.outbound.try_send(body.clone()) {
            Ok(()) => {
                state.last_sent = Some(body);
                ReportOutcome::Sent
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(line = location.line, "Outbound queue full, location dropped");
                ReportOutcome::Dropped
            }
            Err(TrySendError::Disconnected(_)) => {
                drop(state);
                tracing::info!("Connection closed, removing location callback");
                self.detach();
                ReportOutcome::Detached
            }
        }
    }
}
