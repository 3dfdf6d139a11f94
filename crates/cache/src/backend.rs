use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::entry::{now_unix, CacheEntry};

/// Storage backend for cached LLM responses. A Redis-backed implementation
/// can sit behind the same trait; only the in-memory backend ships here.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Option<CacheEntry>;
    async fn set(&self, key: &str, entry: CacheEntry, ttl_seconds: u64) -> bool;
    async fn delete(&self, key: &str) -> bool;
    async fn clear(&self);
    async fn size(&self) -> usize;
}

/// In-process cache backend. Evicts the least-recently-accessed 10% of
/// entries (minimum one) when `max_size` is reached.
pub struct MemoryCacheBackend {
    max_size: usize,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCacheBackend {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn evict_lru(entries: &mut HashMap<String, CacheEntry>) {
        let evict_count = (entries.len() / 10).max(1);
        let mut by_access: Vec<(String, u64)> = entries
            .iter()
            .map(|(k, v)| (k.clone(), v.last_accessed_unix))
            .collect();
        by_access.sort_by_key(|(_, accessed)| *accessed);
        for (key, _) in by_access.into_iter().take(evict_count) {
            entries.remove(&key);
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn get(&self, key: &str) -> Option<CacheEntry> {
        let mut entries = self.entries.lock();
        let expired = entries.get(key).map(|e| e.is_expired()).unwrap_or(false);
        if expired {
            entries.remove(key);
            return None;
        }
        if let Some(entry) = entries.get_mut(key) {
            entry.hit_count += 1;
            entry.last_accessed_unix = now_unix();
            Some(entry.clone())
        } else {
            None
        }
    }

    async fn set(&self, key: &str, mut entry: CacheEntry, ttl_seconds: u64) -> bool {
        let mut entries = self.entries.lock();
        if entries.len() >= self.max_size && !entries.contains_key(key) {
            Self::evict_lru(&mut entries);
        }
        entry.expires_at_unix = now_unix() + ttl_seconds;
        entries.insert(key.to_string(), entry);
        true
    }

    async fn delete(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    async fn clear(&self) {
        self.entries.lock().clear();
    }

    async fn size(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str) -> CacheEntry {
        CacheEntry {
            key: key.to_string(),
            response: "hi".into(),
            model: "m".into(),
            created_at_unix: now_unix(),
            expires_at_unix: 0,
            hit_count: 0,
            last_accessed_unix: now_unix(),
            tokens_saved: 0,
            latency_saved_ms: 0.0,
        }
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let backend = MemoryCacheBackend::new(10);
        backend.set("a", entry("a"), 60).await;
        let got = backend.get("a").await.unwrap();
        assert_eq!(got.response, "hi");
        assert_eq!(got.hit_count, 1);
    }

    #[tokio::test]
    async fn expired_entries_are_not_returned() {
        let backend = MemoryCacheBackend::new(10);
        backend.set("a", entry("a"), 0).await;
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        assert!(backend.get("a").await.is_none());
        assert_eq!(backend.size().await, 0);
    }

    #[tokio::test]
    async fn eviction_removes_oldest_tenth_at_capacity() {
        let backend = MemoryCacheBackend::new(10);
        for i in 0..10 {
            backend.set(&format!("k{i}"), entry(&format!("k{i}")), 600).await;
        }
        assert_eq!(backend.size().await, 10);
        backend.set("k10", entry("k10"), 600).await;
        assert_eq!(backend.size().await, 10);
    }
}
