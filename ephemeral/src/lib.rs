use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

pub mod keys;
mod mem;
mod redis_store;

pub use mem::MemKv;
pub use redis_store::RedisKv;

#[derive(Debug, Clone)]
pub struct StoreError(pub String);

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ephemeral store error: {}", self.0)
    }
}

impl std::error::Error for StoreError {}

/// Short-lived keyed state: pay-confirm slots, hidden messages, attempt
/// logs, group-game member sets, the pending-admission table and the
/// paid-stream checkpoint. Values are strings; structured values go through
/// serde_json at the call site.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn del(&self, key: &str) -> Result<(), StoreError>;

    async fn hset(&self, map: &str, field: &str, value: &str) -> Result<(), StoreError>;

    async fn hdel(&self, map: &str, field: &str) -> Result<(), StoreError>;

    async fn hgetall(&self, map: &str) -> Result<Vec<(String, String)>, StoreError>;

    async fn sadd(&self, set: &str, member: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    async fn smembers(&self, set: &str) -> Result<Vec<String>, StoreError>;
}
