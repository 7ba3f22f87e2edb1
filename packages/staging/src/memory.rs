// ABOUTME: In-process staging store with per-entry deadlines
// ABOUTME: Used by tests and single-process embedding; mirrors Redis expiry semantics

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::store::{ScriptStore, DEFAULT_TTL};
use crate::{Result, ScriptId};

struct Entry {
    content: String,
    expires_at: Instant,
}

/// Map-backed store. Expired entries are invisible to `get` and dropped on
/// the next `put`.
pub struct MemoryScriptStore {
    entries: RwLock<HashMap<ScriptId, Entry>>,
    ttl: Duration,
}

impl MemoryScriptStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Number of live (unexpired) entries
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryScriptStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[async_trait]
impl ScriptStore for MemoryScriptStore {
    async fn put(&self, content: String) -> Result<ScriptId> {
        let id = ScriptId::new();
        let now = Instant::now();

        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            id,
            Entry {
                content,
                expires_at: now + self.ttl,
            },
        );

        debug!(script_id = %id, ttl_secs = self.ttl.as_secs(), "Staged script in memory");
        Ok(id)
    }

    async fn get(&self, id: &ScriptId) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        let content = entries
            .get(id)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.content.clone());

        if content.is_none() {
            debug!(script_id = %id, "Staged script not found or expired");
        }
        Ok(content)
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}
