//! Connection Manager — the scan / connect / serve / back off state machine.
//!
//! ```text
//! Disconnected ─► Connecting ─► Connected ─► Closing ─► Closed
//!      ▲              │ refused / error                  │
//!      └──────────────┴──────────────────────────────────┘
//! ```
//!
//! Ports are tried in ascending order. A refusal or transport error moves on
//! to the next port immediately, as does a peer close with an error code. A
//! session that ends normally (1000/1001 close or `reload`) restarts the scan
//! from the first port. A full pass without a
//! session waits out the backoff. A shutdown close ends the loop for good.

pub mod session;
pub mod shutdown;

use std::sync::mpsc::sync_channel;
use std::sync::Arc;
use std::time::Duration;

use crate::bridge::ExecutionBridge;
use crate::config::AgentConfig;
use crate::dispatcher::CommandDispatcher;
use crate::host::Host;
use crate::reporter::LocationReporter;
use crate::transport::Connector;
use crate::WarpError;

use session::SessionEnd;
use shutdown::ShutdownHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
    Closed,
}

pub struct ConnectionManager<C: Connector> {
    connector: C,
    host: Arc<dyn Host>,
    dispatcher: CommandDispatcher,
    shutdown: Arc<ShutdownHandle>,
    ports: Vec<u16>,
    backoff: Duration,
    queue_capacity: usize,
    state: ConnectionState,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(
        connector: C,
        host: Arc<dyn Host>,
        config: &AgentConfig,
        shutdown: Arc<ShutdownHandle>,
    ) -> Self {
        let bridge = ExecutionBridge::new(host.clone(), config.init_poll_interval());
        Self {
            connector,
            host,
            dispatcher: CommandDispatcher::new(bridge),
            shutdown,
            ports: config.port_range(),
            backoff: config.retry_backoff(),
            queue_capacity: config.outbound_queue_capacity.max(1),
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn set_state(&mut self, next: ConnectionState) {
        tracing::trace!(from = ?self.state, to = ?next, "Connection state");
        self.state = next;
    }

    /// Run until a shutdown close. Blocks the calling thread.
    pub fn run(&mut self) {
        tracing::info!(ports = ?self.ports, "Warp connection manager started");

        loop {
            let mut restart = false;

            for idx in 0..self.ports.len() {
                if self.shutdown.is_triggered() {
                    tracing::info!("Shutdown requested, service closing");
                    return;
                }

                let port = self.ports[idx];
                match self.attempt(port) {
                    None => continue,
                    Some(SessionEnd::Shutdown) => {
                        tracing::info!(port, "Got shutdown close, service closing");
                        return;
                    }
                    Some(SessionEnd::PeerClosed { code }) => {
                        tracing::info!(port, code = ?code, "Socket closed by peer");
                        restart = true;
                        break;
                    }
                    Some(SessionEnd::Superseded) => {
                        tracing::info!(port, "Session superseded by reload");
                        restart = true;
                        break;
                    }
                    Some(SessionEnd::ErrorClosed { code }) => {
                        tracing::warn!(port, code, "Socket closed with error code");
                    }
                    Some(SessionEnd::Dropped(e)) => {
                        tracing::warn!(port, error = %e, "Connection lost");
                    }
                }
            }

            if restart {
                continue;
            }

            tracing::info!(
                backoff_ms = self.backoff.as_millis() as u64,
                "Exhausted all ports, waiting before retrying"
            );
            if self.shutdown.wait_timeout(self.backoff) {
                tracing::info!("Shutdown requested, service closing");
                return;
            }
        }
    }

    /// One connection attempt. `None` when no session was established.
    fn attempt(&mut self, port: u16) -> Option<SessionEnd> {
        self.set_state(ConnectionState::Connecting);

        let link = match self.connector.connect(port) {
            Ok(link) => link,
            Err(WarpError::ConnectionRefused { .. }) => {
                tracing::debug!(port, "Socket connection refused");
                self.set_state(ConnectionState::Disconnected);
                return None;
            }
            Err(e) => {
                tracing::warn!(port, error = %e, "Unexpected connection error");
                self.set_state(ConnectionState::Disconnected);
                return None;
            }
        };

        self.set_state(ConnectionState::Connected);
        tracing::info!(port, "Connected to warp socket server");

        let end = self.serve(link);

        self.set_state(ConnectionState::Closed);
        Some(end)
    }

    fn serve(&mut self, mut link: C::Conn) -> SessionEnd {
        // Fresh queue and reporter per connection: no cross-connection de-duplication
        let (outbound_tx, outbound_rx) = sync_channel(self.queue_capacity);
        let reporter = LocationReporter::attach(self.host.clone(), outbound_tx);
        self.shutdown.arm();

        let end = session::run(&mut link, &outbound_rx, &self.dispatcher, &self.shutdown);

        self.set_state(ConnectionState::Closing);
        drop(link);
        self.shutdown.disarm();
        reporter.detach();
        end
    }
}
