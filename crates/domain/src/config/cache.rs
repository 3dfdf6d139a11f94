use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM response cache
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "d_ttl")]
    pub llm_cache_ttl_seconds: u64,
    #[serde(default = "d_max_size")]
    pub llm_cache_max_size: usize,
    #[serde(default = "d_backend")]
    pub llm_cache_backend: String,
    #[serde(default = "d_normalize")]
    pub enable_normalization: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            llm_cache_ttl_seconds: d_ttl(),
            llm_cache_max_size: d_max_size(),
            llm_cache_backend: d_backend(),
            enable_normalization: d_normalize(),
        }
    }
}

fn d_ttl() -> u64 {
    3600
}
fn d_max_size() -> usize {
    1000
}
fn d_backend() -> String {
    "memory".into()
}
fn d_normalize() -> bool {
    true
}
