//! WebSocket transport over a blocking `TcpStream` (tungstenite).
//!
//! Reads use a short socket timeout so the session loop can interleave
//! outbound writes and shutdown checks between them; a timed-out read leaves
//! partial frames buffered inside tungstenite, so retrying is safe.

use std::borrow::Cow;
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use tungstenite::client::IntoClientRequest;
use tungstenite::http::{HeaderName, HeaderValue};
use tungstenite::protocol::frame::coding::CloseCode;
use tungstenite::protocol::CloseFrame;
use tungstenite::{HandshakeError, Message, WebSocket};

use super::{Connector, Incoming, Link};
use crate::config::AgentConfig;
use crate::identity::Identity;
use crate::{WarpError, WarpResult};

/// Header values must be visible ASCII on the wire. Anything else (non-ASCII
/// project roots, control characters) and any value containing `%` is
/// percent-encoded as UTF-8, so the peer can always percent-decode: plain
/// values decode to themselves.
pub fn encode_header_value(raw: &str) -> Cow<'_, str> {
    let plain = raw.bytes().all(|b| b == b' ' || b.is_ascii_graphic()) && !raw.contains('%');
    if plain {
        Cow::Borrowed(raw)
    } else {
        urlencoding::encode(raw)
    }
}

fn would_block(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

pub struct WsConnector {
    headers: Vec<(&'static str, String)>,
    open_timeout: Duration,
    close_timeout: Duration,
    read_poll: Duration,
}

impl WsConnector {
    pub fn new(identity: &Identity, config: &AgentConfig) -> Self {
        Self {
            headers: identity.handshake_headers(),
            open_timeout: config.open_timeout(),
            close_timeout: config.close_timeout(),
            read_poll: config.read_poll_interval(),
        }
    }

    /// `localhost` may resolve to several addresses (`::1`, `127.0.0.1`);
    /// the peer listens on one of them.
    fn open_stream(&self, port: u16) -> WarpResult<TcpStream> {
        let mut last_err = None;
        let mut refused = false;
        for addr in ("localhost", port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.open_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    refused |= e.kind() == io::ErrorKind::ConnectionRefused;
                    last_err = Some(e);
                }
            }
        }

        if refused {
            return Err(WarpError::ConnectionRefused { port });
        }
        Err(match last_err {
            Some(e) if would_block(&e) => WarpError::Timeout(format!("connect to :{}", port)),
            Some(e) => WarpError::Io(e),
            None => WarpError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "localhost did not resolve",
            )),
        })
    }
}

impl Connector for WsConnector {
    type Conn = WsLink;

    fn connect(&mut self, port: u16) -> WarpResult<WsLink> {
        let stream = self.open_stream(port)?;
        // Bounds the opening handshake
        stream.set_read_timeout(Some(self.open_timeout))?;
        stream.set_write_timeout(Some(self.open_timeout))?;
        stream.set_nodelay(true)?;

        let mut request = format!("ws://localhost:{}", port).into_client_request()?;
        for (name, value) in &self.headers {
            let encoded = encode_header_value(value);
            let value = HeaderValue::from_str(&encoded).map_err(|e| WarpError::InvalidHeader {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
            request
                .headers_mut()
                .insert(HeaderName::from_static(*name), value);
        }

        let (socket, _response) = tungstenite::client(request, stream).map_err(|e| match e {
            HandshakeError::Failure(err) => WarpError::Handshake(err.to_string()),
            HandshakeError::Interrupted(_) => {
                WarpError::Timeout(format!("opening handshake on :{}", port))
            }
        })?;

        socket.get_ref().set_read_timeout(Some(self.read_poll))?;
        socket.get_ref().set_write_timeout(Some(self.close_timeout))?;

        Ok(WsLink {
            socket,
            port,
            close_timeout: self.close_timeout,
        })
    }
}

pub struct WsLink {
    socket: WebSocket<TcpStream>,
    port: u16,
    close_timeout: Duration,
}

impl Link for WsLink {
    fn send_text(&mut self, text: &str) -> WarpResult<()> {
        self.socket.send(Message::Text(text.to_string()))?;
        Ok(())
    }

    fn poll(&mut self) -> WarpResult<Option<Incoming>> {
        match self.socket.read() {
            Ok(Message::Text(text)) => Ok(Some(Incoming::Text(text))),
            Ok(Message::Close(frame)) => {
                // Push out the queued close reply
                let _ = self.socket.flush();
                Ok(Some(Incoming::Closed {
                    code: frame.map(|f| u16::from(f.code)),
                }))
            }
            Ok(Message::Binary(bytes)) => {
                tracing::debug!(len = bytes.len(), "Ignoring binary frame");
                Ok(None)
            }
            Ok(_) => {
                // Ping: the pong is queued, flush it
                let _ = self.socket.flush();
                Ok(None)
            }
            Err(tungstenite::Error::Io(e)) if would_block(&e) => Ok(None),
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                Ok(Some(Incoming::Closed { code: None }))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn close(&mut self, code: u16, reason: &str) -> WarpResult<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: Cow::Owned(reason.to_string()),
        };
        match self.socket.close(Some(frame)) {
            Ok(()) => {}
            Err(tungstenite::Error::Io(e)) if would_block(&e) => {}
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                return Ok(())
            }
            Err(e) => return Err(e.into()),
        }

        // Drain until the peer acknowledges or drops the socket
        let deadline = Instant::now() + self.close_timeout;
        while Instant::now() < deadline {
            match self.socket.read() {
                Ok(_) => {}
                Err(tungstenite::Error::Io(e)) if would_block(&e) => {
                    let _ = self.socket.flush();
                }
                Err(_) => return Ok(()),
            }
        }
        Err(WarpError::Timeout(format!("close handshake on :{}", self.port)))
    }
}
