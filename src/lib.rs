//! Warp Agent — in-process editor link for a script-driven host.
//!
//! Runs inside the host application, finds the editor's local WebSocket
//! server, reports the script location the player reaches and executes
//! editor commands (warp to line, autoreload, reload) on the host's main
//! thread.

// Foundation
pub mod constants;
pub mod error;
pub mod config;
pub mod path_utils;
pub mod tracing_init;

// Host boundary
pub mod host;
pub mod identity;
pub mod bridge;

// Wire
pub mod protocol;
pub mod transport;

// Runtime
pub mod agent;
pub mod connection;
pub mod dispatcher;
pub mod reporter;

#[cfg(test)]
mod test_helpers;

// Re-exports for convenience
pub use agent::{Agent, StartOutcome};
pub use error::{WarpError, WarpResult};
