// ABOUTME: Ephemeral staging store for generated sandbox scripts
// ABOUTME: Scripts live under `scripts:{id}` until their TTL expires; nothing deletes them early

pub mod error;
pub mod id;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use error::{Result, StagingError};
pub use id::ScriptId;
pub use memory::MemoryScriptStore;
pub use redis_store::RedisScriptStore;
pub use store::{script_key, ScriptStore, DEFAULT_TTL, SCRIPTS_KEY};
