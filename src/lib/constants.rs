//! Application constants
//!
//! Single source of truth for paths, limits and fixed protocol values.

use std::time::Duration;

/// Default configuration file path
pub const CONFIG_PATH: &str = "config/agent.toml";

/// Environment file loaded before reading provider settings
pub const ENV_PATH: &str = ".env";

/// MCP protocol revision announced during the handshake
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Upper bound for a single tool server handshake
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound for a single `tools/call` round trip
pub const TOOL_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Grace period between closing a server's stdin and killing it
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Maximum completion cycles per run
pub const MAX_ITERATIONS: usize = 8;

/// Tool names starting with this prefix end the conversation once dispatched
pub const TERMINAL_TOOL_PREFIX: &str = "send";

/// Default model when `OPENAI_MODEL` is not set
pub const DEFAULT_MODEL: &str = "gpt-5.2";

/// Endpoint used for the Responses protocol when no alternate endpoint is set
pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1";

/// Wall-clock budget for a run launched from the REST front-end
pub const RUN_TIMEOUT: Duration = Duration::from_secs(90);

/// Finished runs kept addressable by id before the oldest is dropped
pub const FINISHED_RUN_HISTORY: usize = 16;

/// Longest command accepted by the REST front-end
pub const MAX_COMMAND_LEN: usize = 500;
