// ABOUTME: Default values for optional configuration
// ABOUTME: Kept next to the variable names so docs and code agree

pub const PORT: u16 = 8000;
pub const HOST: &str = "0.0.0.0";

pub const SCRIPT_TTL_SECS: u64 = 30;

pub const DENO_PATH: &str = "deno";
pub const EXECUTION_TIMEOUT_MS: u64 = 10_000;
pub const MAX_HEAP_MB: u32 = 128;
pub const MAX_MESSAGE_BYTES: usize = 8 * 1024 * 1024;

pub const MAX_CODE_BYTES: usize = 1024 * 1024;

pub const LOG_FILTER: &str = "info";

/// Preflight responses may be cached for a day.
pub const CORS_MAX_AGE_SECS: u64 = 86_400;
