use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::{KvStore, StoreError};

/// In-memory stand-in used by tests and by environments without an
/// ephemeral DSN. TTLs are accepted but not enforced.
#[derive(Default)]
pub struct MemKv {
    kv: Mutex<HashMap<String, String>>,
    maps: Mutex<HashMap<String, HashMap<String, String>>>,
    sets: Mutex<HashMap<String, HashSet<String>>>,
}

impl MemKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemKv {
    async fn set(&self, key: &str, value: &str, _ttl: Option<Duration>) -> Result<(), StoreError> {
        self.kv.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.kv.lock().unwrap().get(key).cloned())
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.kv.lock().unwrap().remove(key);
        Ok(())
    }

    async fn hset(&self, map: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.maps
            .lock()
            .unwrap()
            .entry(map.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hdel(&self, map: &str, field: &str) -> Result<(), StoreError> {
        if let Some(entries) = self.maps.lock().unwrap().get_mut(map) {
            entries.remove(field);
        }
        Ok(())
    }

    async fn hgetall(&self, map: &str) -> Result<Vec<(String, String)>, StoreError> {
        Ok(self
            .maps
            .lock()
            .unwrap()
            .get(map)
            .map(|entries| entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    async fn sadd(&self, set: &str, member: &str, _ttl: Option<Duration>) -> Result<(), StoreError> {
        self.sets
            .lock()
            .unwrap()
            .entry(set.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn smembers(&self, set: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .sets
            .lock()
            .unwrap()
            .get(set)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn kv_round_trip() {
        let kv = MemKv::new();
        kv.set("a", "1", None).await.unwrap();
        assert_eq!(kv.get("a").await.unwrap(), Some("1".to_string()));
        kv.del("a").await.unwrap();
        assert_eq!(kv.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn hash_ops() {
        let kv = MemKv::new();
        kv.hset("m", "f1", "v1").await.unwrap();
        kv.hset("m", "f2", "v2").await.unwrap();
        let mut all = kv.hgetall("m").await.unwrap();
        all.sort();
        assert_eq!(
            all,
            vec![
                ("f1".to_string(), "v1".to_string()),
                ("f2".to_string(), "v2".to_string())
            ]
        );
        kv.hdel("m", "f1").await.unwrap();
        assert_eq!(kv.hgetall("m").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn set_ops_deduplicate() {
        let kv = MemKv::new();
        kv.sadd("s", "x", None).await.unwrap();
        kv.sadd("s", "x", None).await.unwrap();
        assert_eq!(kv.smembers("s").await.unwrap(), vec!["x".to_string()]);
    }
}
