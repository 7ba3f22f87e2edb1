// ABOUTME: Environment variable name constants
// ABOUTME: Centralized definitions of all environment variable names used across evald

// Server
pub const PORT: &str = "PORT";
pub const HOST: &str = "HOST";
pub const EVALD_PUBLIC_URL: &str = "EVALD_PUBLIC_URL";

// CORS Configuration
pub const CORS_ORIGIN: &str = "CORS_ORIGIN";

// Staging Store
pub const REDIS_URL: &str = "REDIS_URL";
pub const EVALD_SCRIPT_TTL_SECS: &str = "EVALD_SCRIPT_TTL_SECS";

// Sandbox
pub const EVALD_DENO_PATH: &str = "EVALD_DENO_PATH";
pub const EVALD_EXECUTION_TIMEOUT_MS: &str = "EVALD_EXECUTION_TIMEOUT_MS";
pub const EVALD_MAX_HEAP_MB: &str = "EVALD_MAX_HEAP_MB";
pub const EVALD_MAX_MESSAGE_BYTES: &str = "EVALD_MAX_MESSAGE_BYTES";
pub const EVALD_DENY_NET: &str = "EVALD_DENY_NET";

// Request limits
pub const EVALD_MAX_CODE_BYTES: &str = "EVALD_MAX_CODE_BYTES";

// Logging
pub const RUST_LOG: &str = "RUST_LOG";

// Passed through to sandbox workers. Nothing else from the host environment
// reaches a worker; DENO_DIR is always set to a private per-worker directory.
pub const HOME: &str = "HOME";
pub const TMPDIR: &str = "TMPDIR";
pub const DENO_DIR: &str = "DENO_DIR";

pub const WORKER_ENV_PASSTHROUGH: &[&str] = &[HOME, TMPDIR];
