// ABOUTME: Staging store trait shared by the Redis and in-memory backends
// ABOUTME: put() stages content under a fresh id; get() returns it until the TTL lapses

use async_trait::async_trait;
use std::time::Duration;

use crate::{Result, ScriptId};

/// Key namespace for staged scripts
pub const SCRIPTS_KEY: &str = "scripts";

/// Default lifetime of a staged script
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Backend key for a script id, `scripts:{id}`
pub fn script_key(id: &ScriptId) -> String {
    format!("{}:{}", SCRIPTS_KEY, id)
}

/// Ephemeral store for generated wrapper scripts.
///
/// There is no update or delete: entries are immutable once staged and expire
/// on their own, so a request that fails midway leaves nothing permanent behind.
#[async_trait]
pub trait ScriptStore: Send + Sync {
    /// Stage `content` under a freshly generated id.
    async fn put(&self, content: String) -> Result<ScriptId>;

    /// Fetch staged content. `Ok(None)` for unknown or expired ids.
    async fn get(&self, id: &ScriptId) -> Result<Option<String>>;

    /// How long staged content stays retrievable.
    fn ttl(&self) -> Duration;
}
