use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM routing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "d_timeout_ms")]
    pub default_timeout_ms: u64,
    /// role name (e.g. "planner") -> primary model + fallbacks.
    #[serde(default)]
    pub roles: HashMap<String, RoleConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: d_timeout_ms(),
            roles: HashMap::new(),
        }
    }
}

fn d_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleConfig {
    /// `"provider_id/model_name"`.
    pub primary: String,
    #[serde(default)]
    pub fallbacks: Vec<String>,
}
