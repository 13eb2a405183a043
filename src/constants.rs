// === Port Block ===
pub const DEFAULT_PORT_START: u16 = 40111;
pub const DEFAULT_PORT_END: u16 = 40120; // inclusive

// === Connection Timeouts ===
pub const OPEN_TIMEOUT_MS: u64 = 5_000;
pub const CLOSE_TIMEOUT_MS: u64 = 5_000;
pub const RETRY_BACKOFF_MS: u64 = 5_000; // after a full pass with no session

// === Polling ===
pub const INIT_PHASE_POLL_MS: u64 = 200;
pub const READ_POLL_MS: u64 = 50;

// === Outbound Queue ===
pub const OUTBOUND_QUEUE_CAPACITY: usize = 64;

// === Close Codes ===
pub const NORMAL_CLOSE_CODE: u16 = 1000;
pub const GOING_AWAY_CLOSE_CODE: u16 = 1001;
/// Session deliberately ended by the local side; never retried.
pub const SHUTDOWN_CLOSE_CODE: u16 = 4000;

// === Environment ===
pub const ENV_PORT: &str = "WARP_WS_PORT";
pub const ENV_ENABLED: &str = "WARP_ENABLED";
pub const ENV_NONCE: &str = "WARP_WS_NONCE";
pub const ENV_IS_MANAGED: &str = "WARP_IS_MANAGED";

// === Handshake Headers ===
pub const HEADER_PID: &str = "pid";
pub const HEADER_PROJECT_ROOT: &str = "warp-project-root";
pub const HEADER_VERSION: &str = "warp-version";
pub const HEADER_CHECKSUM: &str = "warp-checksum";
pub const HEADER_NONCE: &str = "warp-nonce";
pub const HEADER_IS_MANAGED: &str = "warp-is-managed";

// === Host Layout ===
pub const GAME_DIR_NAME: &str = "game";
