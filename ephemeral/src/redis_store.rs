use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::{KvStore, StoreError};

#[derive(Clone)]
pub struct RedisKv {
    manager: ConnectionManager,
}

impl RedisKv {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(|e| StoreError(e.to_string()))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError(e.to_string()))?;
        Ok(Self { manager })
    }
}

fn store_err(e: redis::RedisError) -> StoreError {
    StoreError(e.to_string())
}

#[async_trait]
impl KvStore for RedisKv {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        match ttl {
            Some(ttl) => conn
                .set_ex::<_, _, ()>(key, value, ttl.as_secs() as usize)
                .await
                .map_err(store_err),
            None => conn.set::<_, _, ()>(key, value).await.map_err(store_err),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.manager.clone();
        conn.get(key).await.map_err(store_err)
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(key).await.map_err(store_err)
    }

    async fn hset(&self, map: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        conn.hset::<_, _, _, ()>(map, field, value).await.map_err(store_err)
    }

    async fn hdel(&self, map: &str, field: &str) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        conn.hdel::<_, _, ()>(map, field).await.map_err(store_err)
    }

    async fn hgetall(&self, map: &str) -> Result<Vec<(String, String)>, StoreError> {
        let mut conn = self.manager.clone();
        conn.hgetall(map).await.map_err(store_err)
    }

    async fn sadd(&self, set: &str, member: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        conn.sadd::<_, _, ()>(set, member).await.map_err(store_err)?;
        if let Some(ttl) = ttl {
            conn.expire::<_, ()>(set, ttl.as_secs() as usize)
                .await
                .map_err(store_err)?;
        }
        Ok(())
    }

    async fn smembers(&self, set: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.manager.clone();
        conn.smembers(set).await.map_err(store_err)
    }
}
