//! Wire protocol — one JSON object per text frame, discriminated by `type`.
//!
//! Inbound (peer → agent):
//!   warp_to_line   {file, line}
//!   set_autoreload {}
//!   reload         {}
//!
//! Outbound (agent → peer):
//!   current_line   {line, path, relative_path, what, start, end}

use serde::{Deserialize, Serialize};

use crate::bridge::HostAction;
use crate::error::ProtocolError;

/// Commands the peer may send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    WarpToLine { file: String, line: u32 },
    SetAutoreload {},
    Reload {},
}

impl InboundMessage {
    const KNOWN_TYPES: [&'static str; 3] = ["warp_to_line", "set_autoreload", "reload"];

    /// Parse one frame. Unknown `type` values are reported separately from
    /// malformed input so the caller can keep the session alive for both.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(ProtocolError::Malformed)?;

        let kind = value
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or(ProtocolError::MissingType)?
            .to_string();

        if !Self::KNOWN_TYPES.contains(&kind.as_str()) {
            return Err(ProtocolError::UnknownType(kind));
        }

        serde_json::from_value(value)
            .map_err(|source| ProtocolError::InvalidPayload { kind, source })
    }

    pub fn into_action(self) -> HostAction {
        match self {
            Self::WarpToLine { file, line } => HostAction::WarpToLine { file, line },
            Self::SetAutoreload {} => HostAction::EnableAutoreload,
            Self::Reload {} => HostAction::Reload,
        }
    }
}

/// Messages the agent emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    CurrentLine {
        line: u32,
        /// Absolute, `/`-separated.
        path: String,
        /// Relative to the game directory, `/`-separated.
        relative_path: String,
        what: Option<String>,
        start: Option<u32>,
        end: Option<u32>,
    },
}

impl OutboundMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
