pub mod backend;
pub mod entry;

pub use backend::{CacheBackend, MemoryCacheBackend};
pub use entry::CacheEntry;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use sha2::{Digest, Sha256};

/// Normalizes, hashes, and fronts a `CacheBackend`; tracks hit/miss counts
/// the way the original implementation's `LLMCache` wrapper does.
pub struct LlmCache {
    backend: Arc<dyn CacheBackend>,
    default_ttl_seconds: u64,
    enable_normalization: bool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LlmCache {
    pub fn new(backend: Arc<dyn CacheBackend>, default_ttl_seconds: u64, enable_normalization: bool) -> Self {
        Self {
            backend,
            default_ttl_seconds,
            enable_normalization,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    fn normalize_prompt(&self, prompt: &str) -> String {
        if !self.enable_normalization {
            return prompt.to_string();
        }
        let collapsed = prompt.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed
            .to_lowercase()
            .trim_end_matches(['.', ',', '!', '?'])
            .to_string()
    }

    fn cache_key(&self, prompt: &str, model: &str, system_prompt: Option<&str>) -> String {
        let normalized = self.normalize_prompt(prompt);
        let key_data = match system_prompt {
            Some(sys) => format!("{model}:{}:{normalized}", self.normalize_prompt(sys)),
            None => format!("{model}:{normalized}"),
        };
        let digest = Sha256::digest(key_data.as_bytes());
        hex::encode(digest)[..32].to_string()
    }

    pub async fn get(&self, prompt: &str, model: &str, system_prompt: Option<&str>) -> Option<CacheEntry> {
        let key = self.cache_key(prompt, model, system_prompt);
        match self.backend.get(&key).await {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn set(
        &self,
        prompt: &str,
        response: &str,
        model: &str,
        system_prompt: Option<&str>,
        ttl_seconds: Option<u64>,
        tokens_used: u32,
        latency_ms: f64,
    ) -> bool {
        let key = self.cache_key(prompt, model, system_prompt);
        let entry = CacheEntry {
            key: key.clone(),
            response: response.to_string(),
            model: model.to_string(),
            created_at_unix: entry::now_unix(),
            expires_at_unix: 0,
            hit_count: 0,
            last_accessed_unix: entry::now_unix(),
            tokens_saved: tokens_used,
            latency_saved_ms: latency_ms,
        };
        self.backend
            .set(&key, entry, ttl_seconds.unwrap_or(self.default_ttl_seconds))
            .await
    }

    pub async fn invalidate(&self, prompt: &str, model: &str, system_prompt: Option<&str>) -> bool {
        let key = self.cache_key(prompt, model, system_prompt);
        self.backend.delete(&key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> LlmCache {
        LlmCache::new(Arc::new(MemoryCacheBackend::new(100)), 3600, true)
    }

    #[tokio::test]
    async fn miss_then_hit() {
        let cache = cache();
        assert!(cache.get("Hello world!", "gpt-4", None).await.is_none());
        assert_eq!(cache.misses(), 1);

        cache.set("Hello world!", "Hi there", "gpt-4", None, None, 12, 50.0).await;
        let hit = cache.get("hello   world", "gpt-4", None).await;
        assert!(hit.is_some());
        assert_eq!(cache.hits(), 1);
    }

    #[tokio::test]
    async fn normalization_collapses_whitespace_case_and_punctuation() {
        let cache = cache();
        cache.set("Hello, World?", "response", "gpt-4", None, None, 0, 0.0).await;
        let hit = cache.get("  hello,   world", "gpt-4", None).await;
        assert!(hit.is_some());
    }

    #[tokio::test]
    async fn system_prompt_changes_the_key() {
        let cache = cache();
        cache.set("hi", "r1", "gpt-4", Some("sys-a"), None, 0, 0.0).await;
        assert!(cache.get("hi", "gpt-4", Some("sys-b")).await.is_none());
        assert!(cache.get("hi", "gpt-4", Some("sys-a")).await.is_some());
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = cache();
        cache.set("hi", "r1", "gpt-4", None, None, 0, 0.0).await;
        assert!(cache.invalidate("hi", "gpt-4", None).await);
        assert!(cache.get("hi", "gpt-4", None).await.is_none());
    }
}
