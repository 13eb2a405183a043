//! Per-connection loop on the background worker.
//!
//! Each turn: honour a pending shutdown, flush queued location reports, then
//! wait one bounded read for a peer command. The link is only ever touched
//! from this loop.

use std::sync::mpsc::Receiver;

use super::shutdown::ShutdownHandle;
use crate::constants::{GOING_AWAY_CLOSE_CODE, NORMAL_CLOSE_CODE, SHUTDOWN_CLOSE_CODE};
use crate::dispatcher::{CommandDispatcher, Flow};
use crate::transport::{Incoming, Link};
use crate::WarpError;

/// How a connected session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// Peer closed normally; scan again from the first port.
    PeerClosed { code: Option<u16> },
    /// Peer closed with an error code (policy violation, internal error, ...).
    /// Treated like a transport error: move on to the next port.
    ErrorClosed { code: u16 },
    /// Closed with the shutdown code, by either side. Terminal.
    Shutdown,
    /// A `reload` was dispatched; we hung up.
    Superseded,
    /// Transport failure mid-session.
    Dropped(WarpError),
}

pub fn run<L: Link>(
    link: &mut L,
    outbound: &Receiver<String>,
    dispatcher: &CommandDispatcher,
    shutdown: &ShutdownHandle,
) -> SessionEnd {
    loop {
        if shutdown.is_triggered() {
            if let Err(e) = link.close(SHUTDOWN_CLOSE_CODE, "host quit") {
                tracing::debug!(error = %e, "Close handshake incomplete");
            }
            return SessionEnd::Shutdown;
        }

        while let Ok(text) = outbound.try_recv() {
            if let Err(e) = link.send_text(&text) {
                return SessionEnd::Dropped(e);
            }
            tracing::debug!(message = %text, "socket >");
        }

        match link.poll() {
            Ok(None) => {}
            Ok(Some(Incoming::Text(text))) => {
                if dispatcher.dispatch(&text) == Flow::Stop {
                    if let Err(e) = link.close(NORMAL_CLOSE_CODE, "reload") {
                        tracing::debug!(error = %e, "Close handshake incomplete");
                    }
                    return SessionEnd::Superseded;
                }
            }
            Ok(Some(Incoming::Closed { code: Some(SHUTDOWN_CLOSE_CODE) })) => {
                return SessionEnd::Shutdown;
            }
            Ok(Some(Incoming::Closed { code })) => return closed_with(code),
            Err(e) => return SessionEnd::Dropped(e),
        }
    }
}

/// Only a missing code, normal closure or going-away count as graceful.
fn closed_with(code: Option<u16>) -> SessionEnd {
    match code {
        None | Some(NORMAL_CLOSE_CODE) | Some(GOING_AWAY_CLOSE_CODE) => {
            SessionEnd::PeerClosed { code }
        }
        Some(code) => SessionEnd::ErrorClosed { code },
    }
}
