// ABOUTME: Redis-backed staging store
// ABOUTME: One ConnectionManager is opened at startup and cloned per command

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tracing::{debug, info};

use crate::store::{script_key, ScriptStore};
use crate::{Result, ScriptId, StagingError};

/// Staging store on top of Redis `SET .. EX` / `GET`.
///
/// The connection manager reconnects on its own, so the handle is created once
/// and shared by every request through an `Arc<dyn ScriptStore>`.
#[derive(Clone)]
pub struct RedisScriptStore {
    connection: ConnectionManager,
    ttl: Duration,
}

impl RedisScriptStore {
    /// Connect to `url` and verify the server answers.
    pub async fn connect(url: &str, ttl: Duration) -> Result<Self> {
        if ttl.as_secs() == 0 {
            return Err(StagingError::Command(
                "TTL must be at least one second".to_string(),
            ));
        }

        let client =
            redis::Client::open(url).map_err(|e| StagingError::Connection(e.to_string()))?;
        let mut connection = ConnectionManager::new(client)
            .await
            .map_err(|e| StagingError::Connection(e.to_string()))?;

        let _: String = redis::cmd("PING").query_async(&mut connection).await?;
        info!(ttl_secs = ttl.as_secs(), "Connected to staging store");

        Ok(Self { connection, ttl })
    }
}

#[async_trait]
impl ScriptStore for RedisScriptStore {
    async fn put(&self, content: String) -> Result<ScriptId> {
        let id = ScriptId::new();
        let key = script_key(&id);
        let mut connection = self.connection.clone();

        let _: () = redis::cmd("SET")
            .arg(&key)
            .arg(content)
            .arg("EX")
            .arg(self.ttl.as_secs())
            .query_async(&mut connection)
            .await?;

        debug!(script_id = %id, ttl_secs = self.ttl.as_secs(), "Staged script");
        Ok(id)
    }

    async fn get(&self, id: &ScriptId) -> Result<Option<String>> {
        let key = script_key(id);
        let mut connection = self.connection.clone();

        let content: Option<String> = redis::cmd("GET")
            .arg(&key)
            .query_async(&mut connection)
            .await?;

        if content.is_none() {
            debug!(script_id = %id, "Staged script not found or expired");
        }
        Ok(content)
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}
