//! Transport seam between the connection state machine and the socket.
//!
//! `Connector` opens one `Link` per attempt; the session loop drives the link
//! from the background worker only. `ws` is the production implementation.

pub mod ws;

use crate::WarpResult;

/// Something read from an open link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Text(String),
    /// Peer closed the connection; `code` is absent when no close frame was sent.
    Closed { code: Option<u16> },
}

/// One open, message-framed connection to the peer.
pub trait Link {
    fn send_text(&mut self, text: &str) -> WarpResult<()>;

    /// Wait at most one read-poll interval. `Ok(None)` when nothing arrived.
    fn poll(&mut self) -> WarpResult<Option<Incoming>>;

    /// Send a close frame and wait, bounded, for the close handshake.
    fn close(&mut self, code: u16, reason: &str) -> WarpResult<()>;
}

/// Opens links to `localhost:<port>`.
pub trait Connector {
    type Conn: Link;

    /// Fails with `WarpError::ConnectionRefused` when nothing listens on `port`.
    fn connect(&mut self, port: u16) -> WarpResult<Self::Conn>;
}
