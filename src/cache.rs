//!
//! # Cache-Aside Listing Layer
//!
//! Task listings are served from a short-lived cache entry per user, keyed
//! `tasks:<user_id>`. Reads populate the entry on miss; every successful
//! mutation deletes it synchronously before the response is returned, so a
//! user's next read is never older than their last committed write.
//!
//! A read that raced an invalidation may still have populated the entry
//! from pre-write data; such an entry is served until the store's TTL
//! evicts it. That staleness window is bounded by the cache TTL and is an
//! accepted part of the contract, as is a stale entry left behind by a
//! crash between the database commit and the cache delete.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient};

use crate::error::AppError;
use crate::models::Task;

/// How long a populated listing lives before the store evicts it.
pub const TASK_CACHE_TTL_SECS: u64 = 30;

fn tasks_key(user_id: i32) -> String {
    format!("tasks:{}", user_id)
}

/// Raw string-valued key-value store with per-entry TTL.
///
/// [`RedisCacheStore`] is the production adapter; [`InMemoryCacheStore`]
/// backs the tests with the same get/set-with-expiry/delete semantics.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), AppError>;
    async fn del(&self, key: &str) -> Result<(), AppError>;
}

pub struct RedisCacheStore {
    redis: Arc<RedisClient>,
}

impl RedisCacheStore {
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), AppError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), AppError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }
}

/// In-memory store honoring TTLs, for tests.
#[derive(Default)]
pub struct InMemoryCacheStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut entries = self.entries.lock().expect("cache map poisoned");
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), AppError> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_secs);
        self.entries
            .lock()
            .expect("cache map poisoned")
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), AppError> {
        self.entries.lock().expect("cache map poisoned").remove(key);
        Ok(())
    }
}

/// Per-user task-listing cache.
///
/// The listing is stored as a JSON array, newest first, exactly as the
/// list endpoint returns it.
pub struct TaskCache {
    store: Arc<dyn CacheStore>,
    ttl_secs: u64,
}

impl TaskCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl_secs: u64) -> Self {
        Self { store, ttl_secs }
    }

    /// Returns the cached listing for a user, or `None` on a miss.
    /// An entry that fails to decode is treated as a miss; the next
    /// populate overwrites it.
    pub async fn get(&self, user_id: i32) -> Result<Option<Vec<Task>>, AppError> {
        match self.store.get(&tasks_key(user_id)).await? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(tasks) => Ok(Some(tasks)),
                Err(e) => {
                    log::warn!("discarding undecodable cached listing for user {}: {}", user_id, e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Stores a freshly fetched listing with the configured TTL.
    pub async fn put(&self, user_id: i32, tasks: &[Task]) -> Result<(), AppError> {
        let raw = serde_json::to_string(tasks)
            .map_err(|e| AppError::InternalServerError(format!("serialize listing: {}", e)))?;
        self.store.set_ex(&tasks_key(user_id), &raw, self.ttl_secs).await
    }

    /// Deletes the user's listing. Called after every confirmed mutation,
    /// before the mutating request returns.
    pub async fn invalidate(&self, user_id: i32) -> Result<(), AppError> {
        self.store.del(&tasks_key(user_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;
    use chrono::Utc;

    fn task(id: i32, user_id: i32, title: &str) -> Task {
        let now = Utc::now();
        Task {
            id,
            user_id,
            title: title.to_string(),
            status: TaskStatus::Open,
            created_at: now,
            updated_at: now,
        }
    }

    fn cache_with_ttl(ttl_secs: u64) -> TaskCache {
        TaskCache::new(Arc::new(InMemoryCacheStore::new()), ttl_secs)
    }

    #[actix_rt::test]
    async fn test_miss_then_populate_then_hit() {
        let cache = cache_with_ttl(TASK_CACHE_TTL_SECS);
        assert!(cache.get(1).await.unwrap().is_none());

        let tasks = vec![task(2, 1, "newer"), task(1, 1, "older")];
        cache.put(1, &tasks).await.unwrap();

        let cached = cache.get(1).await.unwrap().expect("populated entry");
        assert_eq!(cached, tasks);
    }

    #[actix_rt::test]
    async fn test_invalidate_forces_next_read_to_miss() {
        let cache = cache_with_ttl(TASK_CACHE_TTL_SECS);
        cache.put(1, &[task(1, 1, "stale soon")]).await.unwrap();
        assert!(cache.get(1).await.unwrap().is_some());

        cache.invalidate(1).await.unwrap();

        // Read-your-write: the next read must go back to the task store.
        assert!(cache.get(1).await.unwrap().is_none());
    }

    #[actix_rt::test]
    async fn test_listings_are_namespaced_per_user() {
        let cache = cache_with_ttl(TASK_CACHE_TTL_SECS);
        cache.put(1, &[task(1, 1, "mine")]).await.unwrap();

        assert!(cache.get(2).await.unwrap().is_none());

        // Invalidating one user leaves another's entry alone.
        cache.put(2, &[task(2, 2, "theirs")]).await.unwrap();
        cache.invalidate(1).await.unwrap();
        assert!(cache.get(1).await.unwrap().is_none());
        assert!(cache.get(2).await.unwrap().is_some());
    }

    #[actix_rt::test]
    async fn test_staleness_is_bounded_by_ttl() {
        // An entry populated just before a concurrent write can be served
        // stale, but only until the TTL evicts it.
        let cache = cache_with_ttl(1);
        cache.put(1, &[task(1, 1, "pre-write listing")]).await.unwrap();
        assert!(cache.get(1).await.unwrap().is_some());

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

        assert!(cache.get(1).await.unwrap().is_none());
    }

    #[actix_rt::test]
    async fn test_corrupt_entry_is_a_miss() {
        let store = Arc::new(InMemoryCacheStore::new());
        store.set_ex("tasks:1", "not json", 30).await.unwrap();

        let cache = TaskCache::new(store, 30);
        assert!(cache.get(1).await.unwrap().is_none());
    }
}
