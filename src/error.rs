use thiserror::Error;

#[derive(Error, Debug)]
pub enum WarpError {
    /// The deployed artifact name cannot be versioned; the agent must not start.
    #[error("Could not parse artifact name '{name}' with pattern '{pattern}'")]
    MalformedArtifactName { name: String, pattern: String },

    #[error("Connection refused on :{port}")]
    ConnectionRefused { port: u16 },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Transport error: {0}")]
    Transport(Box<tungstenite::Error>),

    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tungstenite::Error> for WarpError {
    fn from(e: tungstenite::Error) -> Self {
        WarpError::Transport(Box::new(e))
    }
}

pub type WarpResult<T> = Result<T, WarpError>;

/// Why a single inbound message could not be turned into a command.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Message has no 'type' field")]
    MissingType,

    #[error("Unhandled message type '{0}'")]
    UnknownType(String),

    #[error("Invalid '{kind}' payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}
