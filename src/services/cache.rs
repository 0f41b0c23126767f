//! Analysis result cache
//!
//! Keyed by a SHA-256 fingerprint of `(user_id, normalized_text)`. The
//! remote backend is Redis with `SETEX` semantics; when the client cannot be
//! constructed the cache degrades to an in-process map with the same
//! interface (TTL ignored). Every operation is total: transport errors are
//! logged and treated as a miss or no-op.

use dashmap::DashMap;
use redis::AsyncCommands;
use sha2::{Digest, Sha256};

const KEY_PREFIX: &str = "nlp:analysis:";

enum CacheBackend {
    Redis(redis::aio::ConnectionManager),
    Memory(DashMap<String, String>),
}

/// Fingerprint -> serialized-result store with TTL
pub struct ResultCache {
    backend: CacheBackend,
    default_ttl: u64,
}

impl ResultCache {
    /// Connect to Redis, falling back to the in-process map when either the
    /// URL is invalid or the server is unreachable.
    pub async fn connect(redis_url: &str, default_ttl: u64) -> Self {
        match redis::Client::open(redis_url) {
            Ok(client) => match redis::aio::ConnectionManager::new(client).await {
                Ok(manager) => {
                    tracing::info!("Result cache connected to Redis");
                    Self { backend: CacheBackend::Redis(manager), default_ttl }
                },
                Err(e) => {
                    tracing::warn!("Redis unavailable, using in-process cache: {}", e);
                    Self::in_memory(default_ttl)
                },
            },
            Err(e) => {
                tracing::warn!("Invalid Redis URL, using in-process cache: {}", e);
                Self::in_memory(default_ttl)
            },
        }
    }

    pub fn in_memory(default_ttl: u64) -> Self {
        Self { backend: CacheBackend::Memory(DashMap::new()), default_ttl }
    }

    /// Stable cache key for one `(user_id, normalized_text)` pair
    pub fn fingerprint(user_id: i64, normalized_text: &str) -> String {
        let digest = Sha256::digest(format!("{user_id}:{normalized_text}").as_bytes());
        format!("{KEY_PREFIX}{}", hex::encode(digest))
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        match &self.backend {
            CacheBackend::Redis(manager) => {
                let mut conn = manager.clone();
                match conn.get::<_, Option<String>>(key).await {
                    Ok(value) => value,
                    Err(e) => {
                        tracing::warn!("Cache get failed for {}: {}", key, e);
                        None
                    },
                }
            },
            CacheBackend::Memory(map) => map.get(key).map(|v| v.value().clone()),
        }
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Option<u64>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        match &self.backend {
            CacheBackend::Redis(manager) => {
                let mut conn = manager.clone();
                if let Err(e) = conn.set_ex::<_, _, ()>(key, value, ttl).await {
                    tracing::warn!("Cache set failed for {}: {}", key, e);
                }
            },
            // the in-process fallback does not expire entries
            CacheBackend::Memory(map) => {
                map.insert(key.to_string(), value.to_string());
            },
        }
    }

    pub async fn delete(&self, key: &str) {
        match &self.backend {
            CacheBackend::Redis(manager) => {
                let mut conn = manager.clone();
                if let Err(e) = conn.del::<_, ()>(key).await {
                    tracing::warn!("Cache delete failed for {}: {}", key, e);
                }
            },
            CacheBackend::Memory(map) => {
                map.remove(key);
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_and_prefixed() {
        let a = ResultCache::fingerprint(1, "сходил в зал");
        let b = ResultCache::fingerprint(1, "сходил в зал");
        assert_eq!(a, b);
        assert!(a.starts_with("nlp:analysis:"));
        // sha256 hex digest after the prefix
        assert_eq!(a.len(), "nlp:analysis:".len() + 64);
    }

    #[test]
    fn fingerprint_differs_by_user_and_text() {
        let base = ResultCache::fingerprint(1, "сходил в зал");
        assert_ne!(base, ResultCache::fingerprint(2, "сходил в зал"));
        assert_ne!(base, ResultCache::fingerprint(1, "читал книгу"));
    }

    #[tokio::test]
    async fn memory_backend_round_trips() {
        let cache = ResultCache::in_memory(60);
        let key = ResultCache::fingerprint(1, "текст");

        assert_eq!(cache.get(&key).await, None);
        cache.set(&key, r#"{"actions":[]}"#, None).await;
        assert_eq!(cache.get(&key).await.as_deref(), Some(r#"{"actions":[]}"#));

        cache.delete(&key).await;
        assert_eq!(cache.get(&key).await, None);
    }

    #[tokio::test]
    async fn memory_backend_ignores_ttl() {
        let cache = ResultCache::in_memory(1);
        cache.set("key", "value", Some(0)).await;
        assert_eq!(cache.get("key").await.as_deref(), Some("value"));
    }

    #[tokio::test]
    async fn unreachable_redis_falls_back_to_memory() {
        // nothing listens on this port; construction must not fail
        let cache = ResultCache::connect("redis://127.0.0.1:1/", 60).await;
        cache.set("key", "value", None).await;
        assert_eq!(cache.get("key").await.as_deref(), Some("value"));
    }
}
