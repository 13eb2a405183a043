//! Command Dispatcher — routes peer commands to the Execution Bridge.
//!
//! One call per received frame, in receive order. Nothing a single frame
//! contains can end the session except a well-formed `reload`.

use crate::bridge::ExecutionBridge;
use crate::error::ProtocolError;
use crate::protocol::InboundMessage;

/// Whether the session should keep reading after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The connection is superseded (after `reload`).
    Stop,
}

pub struct CommandDispatcher {
    bridge: ExecutionBridge,
}

impl CommandDispatcher {
    pub fn new(bridge: ExecutionBridge) -> Self {
        Self { bridge }
    }

    pub fn dispatch(&self, text: &str) -> Flow {
        tracing::debug!(message = %text, "socket <");

        let message = match InboundMessage::parse(text) {
            Ok(message) => message,
            Err(ProtocolError::UnknownType(kind)) => {
                tracing::warn!(kind = %kind, "Unhandled message type");
                return Flow::Continue;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring bad message");
                return Flow::Continue;
            }
        };

        let stop = matches!(message, InboundMessage::Reload {});
        self.bridge.execute(message.into_action());

        if stop {
            tracing::info!("Reload scheduled, connection superseded");
            Flow::Stop
        } else {
            Flow::Continue
        }
    }
}
